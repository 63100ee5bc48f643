//! Column-ordered Missing Value Imputation
//!
//! Fills the missing values of a polars [`DataFrame`](polars::prelude::DataFrame)
//! one column at a time, each column with its own strategy.
//!
//! # Overview
//!
//! - **Column metadata**: every column gets a [`ColumnType`] (inferred or
//!   overridden), missing/unique counts, an average and a numeric encoding
//! - **Strategies**: univariate ([`MeanStrategy`], `"mean"`) and multivariate
//!   ([`RandomForestStrategy`], `"rf"`), created by identifier through a
//!   [`StrategyRegistry`] that callers can extend
//! - **Ordering**: caller-ranked columns first, then univariate columns, then
//!   multivariate columns, each by descending missing count
//! - **Chaining**: every imputed column is written back before the next one is
//!   fitted, so multivariate models see earlier results
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use imputr::{Imputer, ImputerConfig};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("digimon.csv".into()))?
//!     .finish()?;
//!
//! // Random forests for every column with missing values
//! let imputed = Imputer::auto(&df)?.impute()?;
//!
//! // Mean/mode fill instead
//! let imputed = Imputer::mean(&df)?.impute()?;
//!
//! // Full control
//! let config = ImputerConfig::builder()
//!     .order("Lv50 Atk", 0)
//!     .strategy("Attribute", "mean")
//!     .datatype("Number", ColumnType::Categorical)
//!     .include_non_missing(true)
//!     .build()?;
//! let (imputed, summary) = Imputer::new(&df, config)?.impute_with_summary()?;
//! println!("{}", serde_json::to_string_pretty(&summary)?);
//! ```
//!
//! # Custom Strategies
//!
//! Implement [`Strategy`] and register a factory under a new identifier:
//!
//! ```rust,ignore
//! let mut registry = StrategyRegistry::default();
//! registry.register("zero", StrategyFactory::Univariate(ZeroFill::create))?;
//!
//! let imputer = Imputer::builder()
//!     .config(ImputerConfig::builder().strategy("Lv50 Atk", "zero").build()?)
//!     .registry(registry)
//!     .build(&df)?;
//! ```

pub mod column;
pub mod config;
pub mod error;
pub mod forest;
pub mod imputer;
pub mod ordering;
pub mod strategy;
pub mod table;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use column::Column;
pub use config::{ConfigValidationError, ImputerConfig, ImputerConfigBuilder, StrategySpec};
pub use error::{ImputationError, Result as ImputationResult, ResultExt};
pub use forest::{ForestError, ForestParams, MaxFeatures, RandomForest};
pub use imputer::{Imputer, ImputerBuilder};
pub use strategy::{
    MeanStrategy, RandomForestStrategy, Strategy, StrategyFactory, StrategyInfo, StrategyKind,
    StrategyParams, StrategyRegistry,
};
pub use table::Table;
pub use types::{Average, ColumnSummary, ColumnType, ImputationSummary};
