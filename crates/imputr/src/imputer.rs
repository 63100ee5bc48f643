//! The imputation orchestrator.
//!
//! [`Imputer`] wires the pieces together: it wraps the input frame in a
//! [`Table`], selects the columns to impute, binds a strategy to each of them,
//! fixes the imputation order and finally runs the strategies one column at a
//! time. Each column's result is stored back on the table before the next
//! column is fitted, so later multivariate strategies see earlier imputations
//! in their features.

use crate::config::{ImputerConfig, StrategySpec};
use crate::error::{ImputationError, Result, ResultExt};
use crate::ordering::determine_order;
use crate::strategy::{Strategy, StrategyRegistry};
use crate::table::Table;
use crate::types::{ColumnSummary, ImputationSummary};
use polars::prelude::{DataFrame, IntoColumn};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info};

/// Imputes the missing values of a DataFrame column by column.
///
/// # Example
///
/// ```rust
/// use imputr::Imputer;
/// use polars::prelude::*;
///
/// let df = df![
///     "Lv50 HP" => [Some(1100.0), None, Some(950.0), Some(1040.0)],
///     "Attribute" => [Some("Vaccine"), Some("Virus"), None, Some("Data")],
/// ]
/// .unwrap();
///
/// let mut imputer = Imputer::mean(&df).unwrap();
/// let imputed = imputer.impute().unwrap();
/// assert_eq!(imputed.column("Lv50 HP").unwrap().null_count(), 0);
/// ```
#[derive(Debug)]
pub struct Imputer {
    data: DataFrame,
    config: ImputerConfig,
    table: Table,
    strategies: BTreeMap<String, Box<dyn Strategy>>,
    included_columns: Vec<String>,
    ordered_columns: Vec<String>,
}

// Imputers can be handed to worker threads
static_assertions::assert_impl_all!(Imputer: Send, Sync);

impl Imputer {
    /// Set up an imputation run over `df` with the default strategy registry.
    pub fn new(df: &DataFrame, config: ImputerConfig) -> Result<Self> {
        Self::builder().config(config).build(df)
    }

    /// Impute every column with missing values using random forests.
    pub fn auto(df: &DataFrame) -> Result<Self> {
        Self::new(df, ImputerConfig::default())
    }

    /// Impute every column with missing values using its mean or mode.
    pub fn mean(df: &DataFrame) -> Result<Self> {
        let config = ImputerConfig {
            default_strategy: "mean".to_string(),
            ..ImputerConfig::default()
        };
        Self::new(df, config)
    }

    pub fn builder() -> ImputerBuilder {
        ImputerBuilder::default()
    }

    fn assemble(
        df: &DataFrame,
        config: ImputerConfig,
        registry: &StrategyRegistry,
    ) -> Result<Self> {
        config.validate()?;
        if !registry.contains(&config.default_strategy) {
            return Err(ImputationError::UnknownStrategy(config.default_strategy.clone())
                .with_context("Resolving default strategy"));
        }

        let table = Table::new(df, &config.predefined_datatypes)?;
        for name in config
            .predefined_strategies
            .keys()
            .chain(config.predefined_order.keys())
        {
            if table.column(name).is_none() {
                return Err(ImputationError::ColumnNotFound(name.clone())
                    .with_context("Validating imputer configuration"));
            }
        }

        let included: Vec<_> = table
            .columns()
            .iter()
            .filter(|c| {
                config.include_non_missing
                    || c.has_missing()
                    || config.predefined_strategies.contains_key(c.name())
                    || config.predefined_order.contains_key(c.name())
            })
            .collect();

        let default_spec = StrategySpec::new(config.default_strategy.as_str());
        let mut strategies = BTreeMap::new();
        for column in &included {
            let spec = config
                .predefined_strategies
                .get(column.name())
                .unwrap_or(&default_spec);
            let strategy = registry
                .create(&spec.strategy, column, &table, &spec.params)
                .context(format!("Assigning strategy to column '{}'", column.name()))?;
            debug!(
                "Column '{}' ({}, {} missing) -> {}",
                column.name(),
                column.column_type(),
                column.missing_value_count(),
                strategy.identifier()
            );
            strategies.insert(column.name().to_string(), strategy);
        }

        let ordered_columns: Vec<String> =
            determine_order(&included, &strategies, &config.predefined_order)?
                .iter()
                .map(|c| c.name().to_string())
                .collect();
        let included_columns: Vec<String> =
            included.iter().map(|c| c.name().to_string()).collect();

        info!(
            "Prepared imputation of {} of {} columns, order: {:?}",
            included_columns.len(),
            table.width(),
            ordered_columns
        );

        Ok(Self {
            data: df.clone(),
            config,
            table,
            strategies,
            included_columns,
            ordered_columns,
        })
    }

    /// Run every strategy in order and return the imputed frame.
    ///
    /// Columns keep their input order. Columns that were not imputed keep
    /// their input values and dtype; imputed columns are `Float64`
    /// (continuous) or `String` (categorical).
    pub fn impute(&mut self) -> Result<DataFrame> {
        self.impute_with_summary().map(|(df, _)| df)
    }

    /// Like [`impute`](Self::impute), also reporting what happened per column.
    ///
    /// On error the table keeps the state it had before the call.
    pub fn impute_with_summary(&mut self) -> Result<(DataFrame, ImputationSummary)> {
        match self.impute_internal() {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Imputation error: {}", e);
                Err(e)
            }
        }
    }

    fn impute_internal(&mut self) -> Result<(DataFrame, ImputationSummary)> {
        let start_time = Instant::now();
        info!("Imputing {} columns...", self.ordered_columns.len());

        let mut summary = ImputationSummary::new();
        summary.rows = self.table.height();
        summary.columns = self.table.width();
        summary.missing_before = self.table.missing_value_count();
        for warning in self.table.warnings() {
            summary.add_warning(warning);
        }

        // Results land on a working copy and replace the table only on success
        let mut table = self.table.clone();

        for (position, name) in self.ordered_columns.iter().enumerate() {
            let column_start = Instant::now();
            let strategy = self.strategies.get_mut(name).ok_or_else(|| {
                ImputationError::Internal(format!("no strategy assigned to column '{}'", name))
            })?;

            strategy
                .fit(&table)
                .context(format!("Fitting strategy for column '{}'", name))?;
            let imputed = strategy
                .impute_column(&table)
                .context(format!("Imputing column '{}'", name))?;

            let column = table
                .column_mut(name)
                .ok_or_else(|| ImputationError::ColumnNotFound(name.clone()))?;
            column.set_imputed_data(imputed)?;

            let duration_ms = column_start.elapsed().as_millis() as u64;
            debug!(
                "Imputed {} values in '{}' with {} ({} ms)",
                column.missing_value_count(),
                name,
                strategy.identifier(),
                duration_ms
            );
            summary.add_column_summary(ColumnSummary {
                name: name.clone(),
                column_type: column.column_type(),
                strategy: strategy.identifier().to_string(),
                order_position: position,
                values_imputed: column.missing_value_count(),
                duration_ms,
            });
        }

        let df = self.output_frame(&table)?;
        self.table = table;
        summary.missing_after = df.get_columns().iter().map(|c| c.null_count()).sum();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Imputation complete: {} values filled in {} ms",
            summary.values_imputed(),
            summary.duration_ms
        );
        Ok((df, summary))
    }

    fn output_frame(&self, table: &Table) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(table.width());
        for column in table.columns() {
            if self.strategies.contains_key(column.name()) {
                columns.push(column.imputed_data()?.clone().into_column());
            } else {
                columns.push(self.data.column(column.name())?.clone());
            }
        }
        DataFrame::new(columns).context("Assembling imputed DataFrame")
    }

    /// The input frame, untouched.
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn config(&self) -> &ImputerConfig {
        &self.config
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Strategies keyed by column name.
    pub fn strategies(&self) -> &BTreeMap<String, Box<dyn Strategy>> {
        &self.strategies
    }

    pub fn strategy(&self, column: &str) -> Option<&dyn Strategy> {
        self.strategies.get(column).map(|s| s.as_ref())
    }

    /// Columns selected for imputation, in table order.
    pub fn included_columns(&self) -> &[String] {
        &self.included_columns
    }

    /// Columns in the order they are imputed.
    pub fn ordered_columns(&self) -> &[String] {
        &self.ordered_columns
    }
}

/// Builder for [`Imputer`], for runs that need a custom [`StrategyRegistry`].
#[derive(Debug, Default)]
pub struct ImputerBuilder {
    config: Option<ImputerConfig>,
    registry: Option<StrategyRegistry>,
}

impl ImputerBuilder {
    pub fn config(mut self, config: ImputerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `registry` instead of the default one.
    pub fn registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration against `df` and bind strategies.
    pub fn build(self, df: &DataFrame) -> Result<Imputer> {
        let registry = self.registry.unwrap_or_default();
        Imputer::assemble(df, self.config.unwrap_or_default(), &registry)
    }
}
