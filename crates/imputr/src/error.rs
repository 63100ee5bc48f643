//! Error types for the imputation engine.
//!
//! This module provides the error hierarchy using `thiserror`. Errors fall into
//! four families:
//!
//! - **Configuration**: unknown strategy identifiers, unsupported column types,
//!   malformed partial orders, bad strategy parameters.
//! - **Type**: a column's storage dtype cannot be mapped to a [`ColumnType`].
//! - **Data**: imputed values that are incomplete or have the wrong length.
//! - **Runtime**: model failures and wrapped polars/IO errors.
//!
//! Errors are serializable as `{code, message}` so they can be reported as JSON.
//!
//! [`ColumnType`]: crate::types::ColumnType

use crate::config::ConfigValidationError;
use crate::forest::ForestError;
use crate::types::ColumnType;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the imputation engine.
#[derive(Error, Debug)]
pub enum ImputationError {
    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigValidationError),

    /// Strategy identifier is not registered.
    #[error("Strategy with '{0}' string representation is not defined")]
    UnknownStrategy(String),

    /// Column type tag is not recognized.
    #[error("Data type with '{0}' string representation is not defined")]
    UnknownColumnType(String),

    /// Strategy does not support the target column's type.
    #[error("Column '{column}' has type {column_type}, which is not supported by {strategy}")]
    UnsupportedColumnType {
        column: String,
        column_type: ColumnType,
        strategy: String,
    },

    /// Caller-supplied imputation order is malformed.
    #[error("Invalid imputation order: {0}")]
    InvalidOrder(String),

    /// Strategy parameters could not be parsed or are out of range.
    #[error("Invalid parameters for strategy '{strategy}': {reason}")]
    InvalidParameters { strategy: String, reason: String },

    /// Column storage dtype cannot be mapped to a column type.
    #[error("Column '{column}' has unsupported data type '{dtype}'")]
    UnsupportedDtype { column: String, dtype: String },

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Imputed data rejected by a column.
    #[error("Invalid imputed data for column '{column}': {reason}")]
    InvalidImputedData { column: String, reason: String },

    /// Strategy used before `fit` was called.
    #[error("Strategy for column '{0}' has not been fitted")]
    StrategyNotFitted(String),

    /// Imputation failed.
    #[error("Failed to impute missing values in column '{column}': {reason}")]
    ImputationFailed { column: String, reason: String },

    /// Tree ensemble error.
    #[error("Model error: {0}")]
    Model(#[from] ForestError),

    /// Internal error (broken invariant).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImputationError>,
    },
}

impl ImputationError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ImputationError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers that dispatch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Config(_) => "INVALID_CONFIG",
            Self::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
            Self::UnknownColumnType(_) => "UNKNOWN_COLUMN_TYPE",
            Self::UnsupportedColumnType { .. } => "UNSUPPORTED_COLUMN_TYPE",
            Self::InvalidOrder(_) => "INVALID_ORDER",
            Self::InvalidParameters { .. } => "INVALID_PARAMETERS",
            Self::UnsupportedDtype { .. } => "UNSUPPORTED_DTYPE",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::InvalidImputedData { .. } => "INVALID_IMPUTED_DATA",
            Self::StrategyNotFitted(_) => "STRATEGY_NOT_FITTED",
            Self::ImputationFailed { .. } => "IMPUTATION_FAILED",
            Self::Model(_) => "MODEL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by caller configuration rather than data.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::ColumnNotFound(_)
            | Self::InvalidConfig(_)
            | Self::Config(_)
            | Self::UnknownStrategy(_)
            | Self::UnknownColumnType(_)
            | Self::UnsupportedColumnType { .. }
            | Self::InvalidOrder(_)
            | Self::InvalidParameters { .. } => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }

    /// Check if this error is a column type error.
    pub fn is_type_error(&self) -> bool {
        match self {
            Self::UnsupportedDtype { .. } | Self::TypeConversionFailed { .. } => true,
            Self::WithContext { source, .. } => source.is_type_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ImputationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ImputationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for imputation operations.
pub type Result<T> = std::result::Result<T, ImputationError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ImputationError::Polars(e).with_context(context))
    }
}
