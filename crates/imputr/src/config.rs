//! Configuration for an imputation run.

use crate::error::{ImputationError, Result};
use crate::strategy::{RandomForestStrategy, StrategyParams};
use crate::types::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Strategy used for included columns without an explicit assignment.
pub const DEFAULT_STRATEGY: &str = RandomForestStrategy::IDENTIFIER;

/// A strategy assignment: registry identifier plus parameters.
///
/// Deserializes from either `"rf"` or `{"strategy": "rf", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StrategySpecRepr")]
pub struct StrategySpec {
    pub strategy: String,
    #[serde(default, skip_serializing_if = "StrategyParams::is_empty")]
    pub params: StrategyParams,
}

impl StrategySpec {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            params: StrategyParams::new(),
        }
    }

    pub fn with_params(strategy: impl Into<String>, params: StrategyParams) -> Self {
        Self {
            strategy: strategy.into(),
            params,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrategySpecRepr {
    Identifier(String),
    Full {
        strategy: String,
        #[serde(default)]
        params: StrategyParams,
    },
}

impl From<StrategySpecRepr> for StrategySpec {
    fn from(repr: StrategySpecRepr) -> Self {
        match repr {
            StrategySpecRepr::Identifier(strategy) => StrategySpec::new(strategy),
            StrategySpecRepr::Full { strategy, params } => {
                StrategySpec::with_params(strategy, params)
            }
        }
    }
}

/// What to impute, how, and in which order.
///
/// # Example
///
/// ```rust
/// use imputr::{ColumnType, ImputerConfig};
///
/// let config = ImputerConfig::builder()
///     .order("Lv50 Atk", 0)
///     .strategy("Attribute", "mean")
///     .datatype("Number", ColumnType::Categorical)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_strategy, "rf");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputerConfig {
    /// Column name to rank. Ranked columns are imputed first, lowest rank first.
    pub predefined_order: BTreeMap<String, i64>,

    /// Column name to strategy, overriding `default_strategy`.
    pub predefined_strategies: BTreeMap<String, StrategySpec>,

    /// Column name to type, overriding inference.
    pub predefined_datatypes: BTreeMap<String, ColumnType>,

    /// Impute every column, not only those with missing values.
    /// Default: false
    pub include_non_missing: bool,

    /// Strategy identifier for columns without an explicit one.
    /// Default: "rf"
    pub default_strategy: String,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            predefined_order: BTreeMap::new(),
            predefined_strategies: BTreeMap::new(),
            predefined_datatypes: BTreeMap::new(),
            include_non_missing: false,
            default_strategy: DEFAULT_STRATEGY.to_string(),
        }
    }
}

impl ImputerConfig {
    pub fn builder() -> ImputerConfigBuilder {
        ImputerConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ImputationError::Io(e).with_context(format!("Reading config '{}'", path.display()))
        })?;
        Self::from_json_str(&json)
            .map_err(|e| e.with_context(format!("Parsing config '{}'", path.display())))
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.default_strategy.trim().is_empty() {
            return Err(ConfigValidationError::EmptyDefaultStrategy);
        }

        for (column, spec) in &self.predefined_strategies {
            if spec.strategy.trim().is_empty() {
                return Err(ConfigValidationError::EmptyStrategyIdentifier {
                    column: column.clone(),
                });
            }
        }

        let mut ranks: HashMap<i64, &str> = HashMap::new();
        for (column, &rank) in &self.predefined_order {
            if let Some(first) = ranks.insert(rank, column) {
                return Err(ConfigValidationError::DuplicateRank {
                    first: first.to_string(),
                    second: column.clone(),
                    rank,
                });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Columns '{first}' and '{second}' share imputation rank {rank}")]
    DuplicateRank {
        first: String,
        second: String,
        rank: i64,
    },

    #[error("Strategy identifier for column '{column}' is empty")]
    EmptyStrategyIdentifier { column: String },

    #[error("Default strategy identifier is empty")]
    EmptyDefaultStrategy,
}

/// Builder for [`ImputerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ImputerConfigBuilder {
    predefined_order: BTreeMap<String, i64>,
    predefined_strategies: BTreeMap<String, StrategySpec>,
    predefined_datatypes: BTreeMap<String, ColumnType>,
    include_non_missing: Option<bool>,
    default_strategy: Option<String>,
}

impl ImputerConfigBuilder {
    /// Give `column` an explicit imputation rank.
    pub fn order(mut self, column: impl Into<String>, rank: i64) -> Self {
        self.predefined_order.insert(column.into(), rank);
        self
    }

    /// Impute `column` with the strategy registered as `strategy`.
    pub fn strategy(mut self, column: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.predefined_strategies
            .insert(column.into(), StrategySpec::new(strategy));
        self
    }

    /// Like [`strategy`](Self::strategy), with strategy parameters.
    pub fn strategy_with_params(
        mut self,
        column: impl Into<String>,
        strategy: impl Into<String>,
        params: StrategyParams,
    ) -> Self {
        self.predefined_strategies
            .insert(column.into(), StrategySpec::with_params(strategy, params));
        self
    }

    /// Force the type of `column`.
    pub fn datatype(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.predefined_datatypes.insert(column.into(), column_type);
        self
    }

    pub fn include_non_missing(mut self, include: bool) -> Self {
        self.include_non_missing = Some(include);
        self
    }

    pub fn default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.default_strategy = Some(strategy.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ImputerConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<ImputerConfig, ConfigValidationError> {
        let config = ImputerConfig {
            predefined_order: self.predefined_order,
            predefined_strategies: self.predefined_strategies,
            predefined_datatypes: self.predefined_datatypes,
            include_non_missing: self.include_non_missing.unwrap_or(false),
            default_strategy: self
                .default_strategy
                .unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
