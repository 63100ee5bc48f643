//! Per-column metadata.
//!
//! A [`Column`] wraps one series together with everything the engine needs to
//! know about it: its [`ColumnType`], missing/unique counts, its average, the
//! positions of missing and observed rows, and two lazily-computed views:
//!
//! - `imputed_data`: the values with every gap filled. Until a strategy stores
//!   its result this is the average-filled original.
//! - `numeric_encoded_imputed_data`: the imputed values as `f64`, with
//!   categorical labels replaced by dense integer codes. Multivariate strategies
//!   build their feature matrix from this view.
//!
//! All row indices are positional (0-based).

use crate::error::{ImputationError, Result};
use crate::types::{Average, ColumnType};
use crate::utils::{
    distinct_non_null, fill_numeric_nulls, fill_string_nulls, is_label_dtype, is_numeric_dtype,
    nan_to_null, null_positions, string_mode,
};
use once_cell::sync::OnceCell;
use polars::prelude::{DataType, Series};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Continuous columns with at most this many distinct values trigger a warning.
pub const LOW_CARDINALITY_THRESHOLD: usize = 10;

/// One column of the table and its imputation metadata.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    data: Series,
    missing_value_count: usize,
    unique_value_count: usize,
    average: Average,
    null_indices: Vec<usize>,
    non_null_indices: Vec<usize>,
    warnings: Vec<String>,
    imputed_data: OnceCell<Series>,
    encoded_imputed_data: OnceCell<Vec<f64>>,
}

impl Column {
    /// Build a column, inferring its type from the series dtype.
    pub fn new(series: &Series) -> Result<Self> {
        Self::with_type(series, None)
    }

    /// Build a column, optionally overriding type inference.
    /// NaN cells of float columns count as missing.
    pub fn with_type(series: &Series, column_type: Option<ColumnType>) -> Result<Self> {
        let series = &nan_to_null(series)?;
        let name = series.name().to_string();
        let unique_value_count = distinct_non_null(series)?;

        let mut warnings = Vec::new();
        let column_type = match column_type {
            Some(column_type) => column_type,
            None => {
                let inferred = infer_column_type(series)?;
                if inferred == ColumnType::Continuous
                    && unique_value_count <= LOW_CARDINALITY_THRESHOLD
                {
                    let message = format!(
                        "Column '{}' is continuous but has only {} unique values; \
                         consider overriding its type to categorical",
                        name, unique_value_count
                    );
                    warn!("{}", message);
                    warnings.push(message);
                }
                inferred
            }
        };

        let data = normalize_storage(series, column_type)?;
        let (null_indices, non_null_indices) = null_positions(&data);
        let average = compute_average(&data, column_type)?;

        Ok(Self {
            name,
            column_type,
            missing_value_count: null_indices.len(),
            unique_value_count,
            average,
            null_indices,
            non_null_indices,
            warnings,
            data,
            imputed_data: OnceCell::new(),
            encoded_imputed_data: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Original values, stored as `String` (categorical) or `Float64` (continuous).
    pub fn data(&self) -> &Series {
        &self.data
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn missing_value_count(&self) -> usize {
        self.missing_value_count
    }

    pub fn has_missing(&self) -> bool {
        self.missing_value_count > 0
    }

    /// Distinct non-missing values.
    pub fn unique_value_count(&self) -> usize {
        self.unique_value_count
    }

    /// Mode (categorical) or mean (continuous) of the observed values.
    pub fn average(&self) -> &Average {
        &self.average
    }

    /// Positions of missing rows, ascending.
    pub fn null_indices(&self) -> &[usize] {
        &self.null_indices
    }

    /// Positions of observed rows, ascending.
    pub fn non_null_indices(&self) -> &[usize] {
        &self.non_null_indices
    }

    /// Non-fatal findings from type inference.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Imputed values; average-filled until a strategy stores its result.
    pub fn imputed_data(&self) -> Result<&Series> {
        self.imputed_data.get_or_try_init(|| -> Result<Series> {
            let filled = match &self.average {
                Average::Mean(mean) => fill_numeric_nulls(&self.data, *mean)?,
                Average::Mode(mode) => fill_string_nulls(&self.data, mode)?,
            };
            Ok(filled)
        })
    }

    /// Whether `imputed_data` has been materialized or set.
    pub fn has_imputed_data(&self) -> bool {
        self.imputed_data.get().is_some()
    }

    /// Replace the imputed values.
    ///
    /// The series must have one value per row and no missing values. It is cast
    /// to the column's storage dtype and renamed to the column name. The encoded
    /// view is recomputed on next access.
    pub fn set_imputed_data(&mut self, values: Series) -> Result<()> {
        if values.len() != self.len() {
            return Err(self.invalid_imputed(format!(
                "expected {} values, got {}",
                self.len(),
                values.len()
            )));
        }
        if values.null_count() > 0 {
            return Err(self.invalid_imputed(format!(
                "{} values are still missing",
                values.null_count()
            )));
        }

        let storage = storage_dtype(self.column_type);
        let mut values = values
            .cast(&storage)
            .map_err(|e| self.invalid_imputed(format!("cannot cast to {}: {}", storage, e)))?;
        if values.null_count() > 0 {
            return Err(self.invalid_imputed(format!("values do not all convert to {}", storage)));
        }
        if self.column_type == ColumnType::Continuous
            && values.f64()?.into_iter().flatten().any(f64::is_nan)
        {
            return Err(self.invalid_imputed("NaN values are not allowed".to_string()));
        }
        values.rename(self.name.as_str().into());

        self.imputed_data = OnceCell::with_value(values);
        self.encoded_imputed_data = OnceCell::new();
        Ok(())
    }

    /// Imputed values as `f64`; categorical labels become dense codes ordered
    /// by label.
    pub fn numeric_encoded_imputed_data(&self) -> Result<&[f64]> {
        let encoded = self.encoded_imputed_data.get_or_try_init(|| -> Result<Vec<f64>> {
            let imputed = self.imputed_data()?;
            match self.column_type {
                ColumnType::Continuous => Ok(imputed
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect()),
                ColumnType::Categorical => {
                    let labels = imputed.str()?;
                    let classes: BTreeSet<&str> = labels.into_iter().flatten().collect();
                    let codes: HashMap<&str, f64> = classes
                        .into_iter()
                        .enumerate()
                        .map(|(code, label)| (label, code as f64))
                        .collect();
                    labels
                        .into_iter()
                        .map(|label| {
                            label.and_then(|l| codes.get(l).copied()).ok_or_else(|| {
                                ImputationError::Internal(format!(
                                    "imputed data of column '{}' contains missing values",
                                    self.name
                                ))
                            })
                        })
                        .collect()
                }
            }
        })?;
        Ok(encoded)
    }

    fn invalid_imputed(&self, reason: String) -> ImputationError {
        ImputationError::InvalidImputedData {
            column: self.name.clone(),
            reason,
        }
    }
}

/// Map a series dtype onto a column type.
pub fn infer_column_type(series: &Series) -> Result<ColumnType> {
    let dtype = series.dtype();
    if is_numeric_dtype(dtype) {
        Ok(ColumnType::Continuous)
    } else if is_label_dtype(dtype) {
        Ok(ColumnType::Categorical)
    } else {
        Err(ImputationError::UnsupportedDtype {
            column: series.name().to_string(),
            dtype: dtype.to_string(),
        })
    }
}

fn storage_dtype(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Categorical => DataType::String,
        ColumnType::Continuous => DataType::Float64,
    }
}

/// Cast the series to the storage dtype of its column type.
fn normalize_storage(series: &Series, column_type: ColumnType) -> Result<Series> {
    let dtype = series.dtype();
    let conversion_error = |reason: String| ImputationError::TypeConversionFailed {
        column: series.name().to_string(),
        target_type: column_type.to_string(),
        reason,
    };

    match column_type {
        ColumnType::Categorical => {
            if !is_numeric_dtype(dtype) && !is_label_dtype(dtype) {
                return Err(ImputationError::UnsupportedDtype {
                    column: series.name().to_string(),
                    dtype: dtype.to_string(),
                });
            }
            series
                .cast(&DataType::String)
                .map_err(|e| conversion_error(e.to_string()))
        }
        ColumnType::Continuous => {
            if is_numeric_dtype(dtype) {
                series
                    .cast(&DataType::Float64)
                    .map_err(|e| conversion_error(e.to_string()))
            } else if dtype == &DataType::String {
                series
                    .strict_cast(&DataType::Float64)
                    .map_err(|e| conversion_error(e.to_string()))
            } else {
                Err(conversion_error(format!("'{}' values are not numeric", dtype)))
            }
        }
    }
}

fn compute_average(data: &Series, column_type: ColumnType) -> Result<Average> {
    let no_values = || ImputationError::NoValidValues(data.name().to_string());
    match column_type {
        ColumnType::Categorical => string_mode(data).map(Average::Mode).ok_or_else(no_values),
        ColumnType::Continuous => data.mean().map(Average::Mean).ok_or_else(no_values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::NamedFrom;
    use pretty_assertions::assert_eq;

    fn f64_values(series: &Series) -> Vec<f64> {
        series.f64().unwrap().into_iter().flatten().collect()
    }

    // ========================================================================
    // Continuous columns
    // ========================================================================

    #[test]
    fn test_continuous_column_metadata() {
        let series = Series::new("int_col".into(), &[Some(1i64), Some(2), None, Some(3)]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.name(), "int_col");
        assert_eq!(column.column_type(), ColumnType::Continuous);
        assert_eq!(column.missing_value_count(), 1);
        assert_eq!(column.unique_value_count(), 3);
        assert_eq!(column.average(), &Average::Mean(2.0));
        assert_eq!(column.null_indices(), &[2]);
        assert_eq!(column.non_null_indices(), &[0, 1, 3]);
        assert_eq!(column.data().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_continuous_low_cardinality_warns() {
        let series = Series::new("int_col".into(), &[Some(1i64), Some(2), None, Some(3)]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.warnings().len(), 1);
        assert!(column.warnings()[0].contains("int_col"));
    }

    #[test]
    fn test_continuous_high_cardinality_no_warning() {
        let values: Vec<f64> = (0..11).map(|v| v as f64 * 1.5).collect();
        let series = Series::new("atk".into(), values);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.column_type(), ColumnType::Continuous);
        assert!(column.warnings().is_empty());
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let series = Series::new("Lv50 Atk".into(), &[Some(1.0), Some(f64::NAN), None, Some(4.0)]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.missing_value_count(), 2);
        assert_eq!(column.unique_value_count(), 2);
        assert_eq!(column.average(), &Average::Mean(2.5));
        assert_eq!(column.null_indices(), &[1, 2]);
        assert_eq!(f64_values(column.imputed_data().unwrap()), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_default_imputed_data_is_average_filled() {
        let series = Series::new("int_col".into(), &[Some(1i64), Some(2), None, Some(3)]);
        let column = Column::new(&series).unwrap();

        assert!(!column.has_imputed_data());
        assert_eq!(f64_values(column.imputed_data().unwrap()), vec![1.0, 2.0, 2.0, 3.0]);
        assert!(column.has_imputed_data());
    }

    #[test]
    fn test_set_imputed_data_replaces_and_reencodes() {
        let series = Series::new("int_col".into(), &[Some(1i64), Some(2), None, Some(3)]);
        let mut column = Column::new(&series).unwrap();
        assert_eq!(column.numeric_encoded_imputed_data().unwrap(), &[1.0, 2.0, 2.0, 3.0]);

        column
            .set_imputed_data(Series::new("whatever".into(), &[1i64, 1, 1, 1]))
            .unwrap();

        assert_eq!(f64_values(column.imputed_data().unwrap()), vec![1.0; 4]);
        assert_eq!(column.imputed_data().unwrap().name().as_str(), "int_col");
        assert_eq!(column.numeric_encoded_imputed_data().unwrap(), &[1.0; 4]);
        // Original data is untouched
        assert_eq!(column.data().null_count(), 1);
    }

    #[test]
    fn test_set_imputed_data_rejects_wrong_length() {
        let series = Series::new("x".into(), &[Some(1.0), None, Some(3.0)]);
        let mut column = Column::new(&series).unwrap();

        let err = column
            .set_imputed_data(Series::new("x".into(), &[1.0, 2.0]))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_IMPUTED_DATA");
    }

    #[test]
    fn test_set_imputed_data_rejects_missing_values() {
        let series = Series::new("x".into(), &[Some(1.0), None, Some(3.0)]);
        let mut column = Column::new(&series).unwrap();

        let err = column
            .set_imputed_data(Series::new("x".into(), &[Some(1.0), None, Some(3.0)]))
            .unwrap_err();
        assert!(matches!(err, ImputationError::InvalidImputedData { .. }));
        assert!(!column.has_imputed_data());
    }

    #[test]
    fn test_set_imputed_data_rejects_nan() {
        let series = Series::new("x".into(), &[Some(1.0), None, Some(3.0)]);
        let mut column = Column::new(&series).unwrap();

        let err = column
            .set_imputed_data(Series::new("x".into(), &[1.0, f64::NAN, 3.0]))
            .unwrap_err();
        assert!(matches!(err, ImputationError::InvalidImputedData { .. }));
    }

    #[test]
    fn test_average_is_idempotent() {
        let series = Series::new("x".into(), &[Some(1.5), None, Some(2.5)]);
        let column = Column::new(&series).unwrap();
        assert_eq!(column.average(), column.average());
        assert_eq!(column.average().as_mean(), Some(2.0));
    }

    // ========================================================================
    // Categorical columns
    // ========================================================================

    #[test]
    fn test_categorical_column_metadata() {
        let series = Series::new("str_col".into(), &[Some("a"), Some("a"), Some("b"), None]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.column_type(), ColumnType::Categorical);
        assert_eq!(column.missing_value_count(), 1);
        assert_eq!(column.unique_value_count(), 2);
        assert_eq!(column.average(), &Average::Mode("a".to_string()));
        assert!(column.warnings().is_empty());
        assert_eq!(column.null_indices(), &[3]);
    }

    #[test]
    fn test_categorical_encoding() {
        let series = Series::new("str_col".into(), &[Some("a"), Some("a"), Some("b"), None]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.numeric_encoded_imputed_data().unwrap(), &[0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_categorical_encoding_is_label_ordered() {
        let series = Series::new("c".into(), &["Virus", "Data", "Vaccine", "Data"]);
        let column = Column::new(&series).unwrap();

        // Data < Vaccine < Virus
        assert_eq!(column.numeric_encoded_imputed_data().unwrap(), &[2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_categorical_mode_tie_is_stable() {
        let series = Series::new("c".into(), &[Some("b"), Some("a"), Some("b"), Some("a"), None]);
        let first = Column::new(&series).unwrap();
        let second = Column::new(&series).unwrap();

        assert_eq!(first.average(), &Average::Mode("a".to_string()));
        assert_eq!(first.average(), second.average());
    }

    #[test]
    fn test_boolean_is_categorical() {
        let series = Series::new("flag".into(), &[Some(true), None, Some(false), Some(true)]);
        let column = Column::new(&series).unwrap();

        assert_eq!(column.column_type(), ColumnType::Categorical);
        assert_eq!(column.average(), &Average::Mode("true".to_string()));
    }

    // ========================================================================
    // Overrides and failures
    // ========================================================================

    #[test]
    fn test_categorical_override_on_numeric() {
        let series = Series::new("level".into(), &[Some(1i64), Some(2), Some(2), None]);
        let column = Column::with_type(&series, Some(ColumnType::Categorical)).unwrap();

        assert_eq!(column.column_type(), ColumnType::Categorical);
        assert_eq!(column.data().dtype(), &DataType::String);
        assert_eq!(column.average(), &Average::Mode("2".to_string()));
        // Overrides skip the low-cardinality warning
        assert!(column.warnings().is_empty());
    }

    #[test]
    fn test_continuous_override_on_numeric_strings() {
        let series = Series::new("hp".into(), &[Some("10"), None, Some("20")]);
        let column = Column::with_type(&series, Some(ColumnType::Continuous)).unwrap();

        assert_eq!(column.average(), &Average::Mean(15.0));
        assert_eq!(column.missing_value_count(), 1);
    }

    #[test]
    fn test_continuous_override_on_text_fails() {
        let series = Series::new("stage".into(), &[Some("Rookie"), Some("Mega")]);
        let err = Column::with_type(&series, Some(ColumnType::Continuous)).unwrap_err();

        assert!(err.is_type_error());
    }

    #[test]
    fn test_unsupported_dtype() {
        let series = Series::new("d".into(), &[1i32, 2, 3])
            .cast(&DataType::Date)
            .unwrap();
        let err = Column::new(&series).unwrap_err();

        assert!(matches!(err, ImputationError::UnsupportedDtype { .. }));
        assert!(err.is_type_error());
    }

    #[test]
    fn test_all_missing_column_fails() {
        let series = Series::new("empty".into(), &[Option::<f64>::None, None]);
        let err = Column::new(&series).unwrap_err();

        assert!(matches!(err, ImputationError::NoValidValues(_)));
    }
}
