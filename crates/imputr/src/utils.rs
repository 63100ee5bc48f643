//! Shared series helpers used by columns and strategies.

use polars::prelude::*;
use std::collections::BTreeMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds labels rather than quantities.
///
/// Booleans count as labels: a two-valued flag has no meaningful mean.
#[inline]
pub fn is_label_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::String | DataType::Categorical(_, _) | DataType::Boolean
    )
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Most frequent value of a string Series.
///
/// Ties go to the lexicographically smallest value so repeated calls agree.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_chunked = series.str().ok()?;

    let mut value_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for val in str_chunked.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (val, count) in value_counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((val, count));
        }
    }
    best.map(|(val, _)| val.to_string())
}

/// Number of distinct non-null values.
pub fn distinct_non_null(series: &Series) -> PolarsResult<usize> {
    series.drop_nulls().n_unique()
}

/// Split row positions into (null, non-null), both ascending.
pub fn null_positions(series: &Series) -> (Vec<usize>, Vec<usize>) {
    let mask = series.is_null();
    let mut nulls = Vec::with_capacity(series.null_count());
    let mut non_nulls = Vec::with_capacity(series.len() - series.null_count());

    for (idx, is_null) in (&mask).into_iter().enumerate() {
        if is_null.unwrap_or(false) {
            nulls.push(idx);
        } else {
            non_nulls.push(idx);
        }
    }

    (nulls, non_nulls)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Turn NaN cells of a float series into nulls. Other dtypes pass through.
pub fn nan_to_null(series: &Series) -> PolarsResult<Series> {
    let dtype = series.dtype();
    if !matches!(dtype, DataType::Float32 | DataType::Float64) {
        return Ok(series.clone());
    }

    let values = series.cast(&DataType::Float64)?;
    let cleaned: Float64Chunked = values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    cleaned
        .with_name(series.name().clone())
        .into_series()
        .cast(dtype)
}

/// Fill null values in a Float64 Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let values: Vec<f64> = series
        .f64()?
        .into_iter()
        .map(|val| val.unwrap_or(fill_value))
        .collect();

    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a String Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let values: Vec<&str> = series
        .str()?
        .into_iter()
        .map(|val| val.unwrap_or(fill_value))
        .collect();

    Ok(Series::new(series.name().clone(), values))
}

// =============================================================================
// Tests
// =============================================================================
