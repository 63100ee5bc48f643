use super::{MeanStrategy, RandomForestStrategy, Strategy, StrategyKind, StrategyParams};
use crate::column::Column;
use crate::error::{ImputationError, Result};
use crate::table::Table;
use std::collections::BTreeMap;

/// Builds a univariate strategy for a target column.
pub type UnivariateFactory = fn(&Column, &StrategyParams) -> Result<Box<dyn Strategy>>;

/// Builds a multivariate strategy for a target column and its features.
pub type MultivariateFactory =
    fn(&Column, &[&Column], &StrategyParams) -> Result<Box<dyn Strategy>>;

/// How to construct a strategy, tagged with its kind.
#[derive(Debug, Clone, Copy)]
pub enum StrategyFactory {
    Univariate(UnivariateFactory),
    Multivariate(MultivariateFactory),
}

impl StrategyFactory {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyFactory::Univariate(_) => StrategyKind::Univariate,
            StrategyFactory::Multivariate(_) => StrategyKind::Multivariate,
        }
    }
}

/// Maps strategy identifiers to factories.
///
/// The default registry knows `"mean"` and `"rf"`.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut factories = BTreeMap::new();
        factories.insert(
            MeanStrategy::IDENTIFIER.to_string(),
            StrategyFactory::Univariate(MeanStrategy::create),
        );
        factories.insert(
            RandomForestStrategy::IDENTIFIER.to_string(),
            StrategyFactory::Multivariate(RandomForestStrategy::create),
        );
        Self { factories }
    }
}

impl StrategyRegistry {
    /// A registry with no strategies.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add a strategy under `identifier`.
    ///
    /// Empty and already-registered identifiers are rejected.
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        factory: StrategyFactory,
    ) -> Result<&mut Self> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(ImputationError::InvalidConfig(
                "strategy identifier must not be empty".to_string(),
            ));
        }
        if self.factories.contains_key(&identifier) {
            return Err(ImputationError::InvalidConfig(format!(
                "strategy '{}' is already registered",
                identifier
            )));
        }
        self.factories.insert(identifier, factory);
        Ok(self)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn kind(&self, identifier: &str) -> Option<StrategyKind> {
        self.factories.get(identifier).map(StrategyFactory::kind)
    }

    /// Construct the strategy `identifier` for `target`.
    ///
    /// Multivariate strategies receive every other column of `table` as
    /// features, in table order.
    pub fn create(
        &self,
        identifier: &str,
        target: &Column,
        table: &Table,
        params: &StrategyParams,
    ) -> Result<Box<dyn Strategy>> {
        let factory = self
            .factories
            .get(identifier)
            .ok_or_else(|| ImputationError::UnknownStrategy(identifier.to_string()))?;

        match factory {
            StrategyFactory::Univariate(build) => build(target, params),
            StrategyFactory::Multivariate(build) => {
                let features: Vec<&Column> = table
                    .columns()
                    .iter()
                    .filter(|c| c.name() != target.name())
                    .collect();
                build(target, &features, params)
            }
        }
    }
}
