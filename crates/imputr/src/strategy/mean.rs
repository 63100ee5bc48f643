use super::{Strategy, StrategyKind, StrategyParams, ensure_supported};
use crate::column::Column;
use crate::error::{ImputationError, Result};
use crate::table::Table;
use crate::types::{Average, ColumnType};
use crate::utils::{fill_numeric_nulls, fill_string_nulls};
use polars::prelude::Series;
use tracing::debug;

const SUPPORTED: &[ColumnType] = &[ColumnType::Categorical, ColumnType::Continuous];

/// Fills gaps with the column average: the mean for continuous columns and
/// the mode for categorical ones.
#[derive(Debug, Clone)]
pub struct MeanStrategy {
    target: String,
    average: Option<Average>,
}

impl MeanStrategy {
    pub const IDENTIFIER: &'static str = "mean";

    pub fn new(target: &Column) -> Result<Self> {
        ensure_supported("Mean", SUPPORTED, target)?;
        Ok(Self {
            target: target.name().to_string(),
            average: None,
        })
    }

    /// Registry entry point. The strategy takes no parameters.
    pub(crate) fn create(target: &Column, params: &StrategyParams) -> Result<Box<dyn Strategy>> {
        if !params.is_empty() {
            debug!(
                "Ignoring parameters {:?} for mean strategy on '{}'",
                params.keys().collect::<Vec<_>>(),
                target.name()
            );
        }
        Ok(Box::new(Self::new(target)?))
    }

    /// Value used to fill gaps, once fitted.
    pub fn average(&self) -> Option<&Average> {
        self.average.as_ref()
    }
}

impl Strategy for MeanStrategy {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn name(&self) -> &str {
        "Mean"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Univariate
    }

    fn supported_data_types(&self) -> &[ColumnType] {
        SUPPORTED
    }

    fn target_column(&self) -> &str {
        &self.target
    }

    fn fit(&mut self, table: &Table) -> Result<()> {
        let column = table.require(&self.target)?;
        self.average = Some(column.average().clone());
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.average.is_some()
    }

    fn impute_column(&self, table: &Table) -> Result<Series> {
        let average = self
            .average
            .as_ref()
            .ok_or_else(|| ImputationError::StrategyNotFitted(self.target.clone()))?;
        let column = table.require(&self.target)?;

        let filled = match average {
            Average::Mean(mean) => fill_numeric_nulls(column.data(), *mean)?,
            Average::Mode(mode) => fill_string_nulls(column.data(), mode)?,
        };
        Ok(filled)
    }
}
