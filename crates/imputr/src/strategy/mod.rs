//! Imputation strategies.
//!
//! A strategy is bound to one target column at construction time, learns from
//! the current [`Table`] in [`Strategy::fit`] and produces a complete
//! replacement series in [`Strategy::impute_column`].
//!
//! Two kinds exist:
//! - **Univariate** strategies only look at the target column ([`MeanStrategy`]).
//! - **Multivariate** strategies also read every other column of the table as
//!   features, through their numeric-encoded imputed data
//!   ([`RandomForestStrategy`]).
//!
//! Strategies are created by identifier through a [`StrategyRegistry`].

mod mean;
mod random_forest;
mod registry;

pub use mean::MeanStrategy;
pub use random_forest::RandomForestStrategy;
pub use registry::{
    MultivariateFactory, StrategyFactory, StrategyRegistry, UnivariateFactory,
};

use crate::column::Column;
use crate::error::{ImputationError, Result};
use crate::table::Table;
use crate::types::ColumnType;
use ndarray::Array2;
use polars::prelude::Series;
use serde::Serialize;
use std::fmt;

/// Free-form strategy parameters, as given in configuration.
pub type StrategyParams = serde_json::Map<String, serde_json::Value>;

/// Whether a strategy reads other columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Univariate,
    Multivariate,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Univariate => f.write_str("univariate"),
            StrategyKind::Multivariate => f.write_str("multivariate"),
        }
    }
}

/// A snapshot of a strategy's binding, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub identifier: String,
    pub name: String,
    pub kind: StrategyKind,
    pub target: String,
    pub features: Vec<String>,
    pub supported_data_types: Vec<ColumnType>,
    pub fitted: bool,
}

/// A column imputation strategy bound to a single target column.
pub trait Strategy: fmt::Debug + Send + Sync {
    /// Registry identifier, e.g. `"rf"`.
    fn identifier(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Column types this strategy can impute.
    fn supported_data_types(&self) -> &[ColumnType];

    /// Name of the column this strategy imputes.
    fn target_column(&self) -> &str;

    /// Columns read as predictors. Empty for univariate strategies.
    fn feature_columns(&self) -> &[String] {
        &[]
    }

    /// Learn from the table's current state. Calling it again refits.
    fn fit(&mut self, table: &Table) -> Result<()>;

    fn is_fitted(&self) -> bool;

    /// Full-length copy of the target column with every missing value filled.
    ///
    /// Observed values are returned unchanged. Fails with
    /// [`ImputationError::StrategyNotFitted`] before [`Strategy::fit`].
    fn impute_column(&self, table: &Table) -> Result<Series>;

    fn info(&self) -> StrategyInfo {
        StrategyInfo {
            identifier: self.identifier().to_string(),
            name: self.name().to_string(),
            kind: self.kind(),
            target: self.target_column().to_string(),
            features: self.feature_columns().to_vec(),
            supported_data_types: self.supported_data_types().to_vec(),
            fitted: self.is_fitted(),
        }
    }
}

/// Reject a target column whose type is not in `supported`.
pub fn ensure_supported(strategy: &str, supported: &[ColumnType], target: &Column) -> Result<()> {
    if supported.contains(&target.column_type()) {
        Ok(())
    } else {
        Err(ImputationError::UnsupportedColumnType {
            column: target.name().to_string(),
            column_type: target.column_type(),
            strategy: strategy.to_string(),
        })
    }
}

/// Build a `rows x features` matrix from the features' encoded imputed data.
pub fn feature_matrix(table: &Table, features: &[String], rows: &[usize]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((rows.len(), features.len()));
    for (j, name) in features.iter().enumerate() {
        let encoded = table.require(name)?.numeric_encoded_imputed_data()?;
        for (i, &row) in rows.iter().enumerate() {
            matrix[[i, j]] = *encoded.get(row).ok_or_else(|| {
                ImputationError::Internal(format!(
                    "row {} out of range for feature column '{}'",
                    row, name
                ))
            })?;
        }
    }
    Ok(matrix)
}

/// Merge observed values and predictions back into row order.
///
/// `observed` lines up with `column.non_null_indices()` and `predicted` with
/// `column.null_indices()`. Every row must be written exactly once.
pub(crate) fn reassemble<T: Clone>(
    column: &Column,
    observed: &[T],
    predicted: &[T],
) -> Result<Vec<T>> {
    let failed = |reason: String| ImputationError::ImputationFailed {
        column: column.name().to_string(),
        reason,
    };

    if observed.len() != column.non_null_indices().len() {
        return Err(failed(format!(
            "expected {} observed values, got {}",
            column.non_null_indices().len(),
            observed.len()
        )));
    }
    if predicted.len() != column.null_indices().len() {
        return Err(failed(format!(
            "expected {} predictions, got {}",
            column.null_indices().len(),
            predicted.len()
        )));
    }

    let mut slots: Vec<Option<T>> = vec![None; column.len()];
    let placements = column
        .non_null_indices()
        .iter()
        .zip(observed)
        .chain(column.null_indices().iter().zip(predicted));
    for (&row, value) in placements {
        let slot = slots
            .get_mut(row)
            .ok_or_else(|| failed(format!("row {} is out of range", row)))?;
        if slot.is_some() {
            return Err(failed(format!("row {} written twice", row)));
        }
        *slot = Some(value.clone());
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(row, slot)| slot.ok_or_else(|| failed(format!("row {} was never written", row))))
        .collect()
}
