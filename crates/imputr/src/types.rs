use crate::error::ImputationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The column types the engine is able to impute for and with.
///
/// Serialized as the short tags `"cat"` and `"cont"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "cat", alias = "categorical")]
    Categorical,
    #[serde(rename = "cont", alias = "continuous")]
    Continuous,
}

impl ColumnType {
    /// Short tag used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Categorical => "cat",
            ColumnType::Continuous => "cont",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Categorical => f.write_str("categorical"),
            ColumnType::Continuous => f.write_str("continuous"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = ImputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cat" | "categorical" => Ok(ColumnType::Categorical),
            "cont" | "continuous" => Ok(ColumnType::Continuous),
            _ => Err(ImputationError::UnknownColumnType(s.to_string())),
        }
    }
}

/// Central value of a column: the mode for categorical columns, the mean for
/// continuous ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Average {
    Mode(String),
    Mean(f64),
}

impl Average {
    pub fn as_mode(&self) -> Option<&str> {
        match self {
            Average::Mode(value) => Some(value),
            Average::Mean(_) => None,
        }
    }

    pub fn as_mean(&self) -> Option<f64> {
        match self {
            Average::Mean(value) => Some(*value),
            Average::Mode(_) => None,
        }
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Average::Mode(value) => write!(f, "'{}'", value),
            Average::Mean(value) => write!(f, "{:.4}", value),
        }
    }
}

// ============================================================================
// Imputation Summary Types
// ============================================================================

/// Summary of one imputation run, returned by
/// [`Imputer::impute_with_summary`](crate::Imputer::impute_with_summary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputationSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
    /// Number of rows in the table.
    pub rows: usize,
    /// Number of columns in the table.
    pub columns: usize,
    /// Total missing values before imputation, across all columns.
    pub missing_before: usize,
    /// Total missing values after imputation, across all columns.
    pub missing_after: usize,
    /// One entry per imputed column, in imputation order.
    pub column_summaries: Vec<ColumnSummary>,
    /// Warnings raised while building column metadata.
    pub warnings: Vec<String>,
}

impl ImputationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column_summary(&mut self, summary: ColumnSummary) {
        self.column_summaries.push(summary);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Number of values filled in by strategies.
    pub fn values_imputed(&self) -> usize {
        self.column_summaries.iter().map(|c| c.values_imputed).sum()
    }
}

/// What happened to a single column during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    /// Identifier of the strategy that imputed the column.
    pub strategy: String,
    /// Zero-based position in the imputation order.
    pub order_position: usize,
    pub values_imputed: usize,
    pub duration_ms: u64,
}
