//! The column collection an imputation run works on.

use crate::column::Column;
use crate::error::{ImputationError, Result, ResultExt};
use crate::types::ColumnType;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// Every column of the input frame, wrapped as [`Column`] metadata, in input
/// order.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    height: usize,
}

impl Table {
    /// Wrap every column of `df`, applying type overrides by name.
    ///
    /// Overrides naming columns absent from the frame are rejected.
    pub fn new(df: &DataFrame, datatypes: &BTreeMap<String, ColumnType>) -> Result<Self> {
        for name in datatypes.keys() {
            if df.column(name).is_err() {
                return Err(ImputationError::ColumnNotFound(name.clone())
                    .with_context("Applying column type overrides"));
            }
        }

        let mut columns = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let name = series.name().as_str();
            let column = Column::with_type(series, datatypes.get(name).copied())
                .context(format!("Building metadata for column '{}'", name))?;
            columns.push(column);
        }

        Ok(Self {
            columns,
            height: df.height(),
        })
    }

    /// Wrap every column of `df` with inferred types.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        Self::new(df, &BTreeMap::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Like [`Table::column`], but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| ImputationError::ColumnNotFound(name.to_string()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Total missing values across all columns.
    pub fn missing_value_count(&self) -> usize {
        self.columns.iter().map(Column::missing_value_count).sum()
    }

    /// Warnings collected while building column metadata.
    pub fn warnings(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| c.warnings().iter().cloned())
            .collect()
    }
}
