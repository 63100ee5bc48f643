//! Random forest used by the `"rf"` imputation strategy.
//!
//! Trees are CART trees grown best-first: Gini impurity for classification,
//! variance for regression. Each split considers a random subset of features,
//! and each tree is trained on a bootstrap sample with its own seeded RNG, so a
//! fixed `random_state` gives reproducible forests regardless of thread count.
//!
//! Predictions aggregate leaf values across trees:
//!
//! - classification averages the class frequencies of the reached leaves and
//!   returns the most probable class (lowest index on ties);
//! - regression averages the leaf means.

mod tree;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use tree::{DecisionTree, GrowthLimits, Task};

/// Seed used when the caller does not provide `random_state`.
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Errors raised while configuring, fitting or querying a forest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("Shape mismatch: {features} feature rows but {labels} labels")]
    ShapeMismatch { features: usize, labels: usize },

    #[error("Cannot fit a forest on an empty training set")]
    EmptyTrainingSet,

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Forest has not been fitted")]
    NotFitted,

    #[error("Invalid label {label} at row {row}: {reason}")]
    InvalidLabel {
        row: usize,
        label: f64,
        reason: String,
    },

    #[error("Expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
}

// ============================================================================
// Parameters
// ============================================================================

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaxFeaturesRepr", into = "MaxFeaturesRepr")]
pub enum MaxFeatures {
    /// `sqrt(n_features)`
    Sqrt,
    /// `log2(n_features)`
    Log2,
    /// Every feature.
    All,
    /// A fraction of the features, in `(0, 1]`.
    Fraction(f64),
    /// A fixed count, capped at the number of features.
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` features (at least one).
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fraction(fraction) => (n * fraction).floor() as usize,
            MaxFeatures::Count(count) => count,
        };
        count.clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::Sqrt => f.write_str("sqrt"),
            MaxFeatures::Log2 => f.write_str("log2"),
            MaxFeatures::All => f.write_str("all"),
            MaxFeatures::Fraction(fraction) => write!(f, "{}", fraction),
            MaxFeatures::Count(count) => write!(f, "{}", count),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaxFeaturesRepr {
    Name(String),
    Count(usize),
    Fraction(f64),
}

impl TryFrom<MaxFeaturesRepr> for MaxFeatures {
    type Error = String;

    fn try_from(repr: MaxFeaturesRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxFeaturesRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                _ => Err(format!(
                    "unknown max_features '{}', expected 'sqrt', 'log2', 'all', \
                     a count or a fraction",
                    name
                )),
            },
            MaxFeaturesRepr::Count(0) => Err("max_features count must be at least 1".to_string()),
            MaxFeaturesRepr::Count(count) => Ok(MaxFeatures::Count(count)),
            MaxFeaturesRepr::Fraction(fraction) if fraction > 0.0 && fraction <= 1.0 => {
                Ok(MaxFeatures::Fraction(fraction))
            }
            MaxFeaturesRepr::Fraction(fraction) => Err(format!(
                "max_features fraction must be in (0, 1], got {}",
                fraction
            )),
        }
    }
}

impl From<MaxFeatures> for MaxFeaturesRepr {
    fn from(value: MaxFeatures) -> Self {
        match value {
            MaxFeatures::Count(count) => MaxFeaturesRepr::Count(count),
            MaxFeatures::Fraction(fraction) => MaxFeaturesRepr::Fraction(fraction),
            named => MaxFeaturesRepr::Name(named.to_string()),
        }
    }
}

/// Forest hyperparameters, deserializable from a strategy's JSON parameters.
///
/// `max_depth` and `max_leaf_nodes` accept `null` for "unlimited".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    #[serde(alias = "min_sample_split")]
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub min_weight_fraction_leaf: f64,
    pub max_features: MaxFeatures,
    pub max_leaf_nodes: Option<usize>,
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 64,
            max_depth: Some(8),
            min_samples_split: 512,
            min_samples_leaf: 128,
            min_weight_fraction_leaf: 0.35,
            max_features: MaxFeatures::Sqrt,
            max_leaf_nodes: Some(32),
            bootstrap: true,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl ForestParams {
    /// Check value ranges that the type system does not capture.
    pub fn validate(&self) -> Result<(), ForestError> {
        let invalid = |name: &'static str, reason: String| -> Result<(), ForestError> {
            Err(ForestError::InvalidParameter { name, reason })
        };

        if self.n_estimators == 0 {
            return invalid("n_estimators", "must be at least 1".to_string());
        }
        if self.max_depth == Some(0) {
            return invalid("max_depth", "must be at least 1".to_string());
        }
        if self.min_samples_split < 2 {
            return invalid(
                "min_samples_split",
                format!("must be at least 2, got {}", self.min_samples_split),
            );
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf", "must be at least 1".to_string());
        }
        if !(0.0..=0.5).contains(&self.min_weight_fraction_leaf) {
            return invalid(
                "min_weight_fraction_leaf",
                format!("must be in [0, 0.5], got {}", self.min_weight_fraction_leaf),
            );
        }
        if let Some(max_leaf_nodes) = self.max_leaf_nodes
            && max_leaf_nodes < 2
        {
            return invalid(
                "max_leaf_nodes",
                format!("must be at least 2, got {}", max_leaf_nodes),
            );
        }
        Ok(())
    }

    fn growth_limits(&self, n_samples: usize, n_features: usize) -> GrowthLimits {
        let fraction_leaf = (self.min_weight_fraction_leaf * n_samples as f64).ceil() as usize;
        GrowthLimits {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf.max(fraction_leaf),
            max_features: self.max_features.resolve(n_features),
            max_leaf_nodes: self.max_leaf_nodes,
        }
    }
}

// ============================================================================
// Forest
// ============================================================================

/// An ensemble of decision trees for either classification or regression.
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    task: Task,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Classifier over labels `0..n_classes`.
    pub fn classifier(params: ForestParams, n_classes: usize) -> Result<Self, ForestError> {
        params.validate()?;
        if n_classes == 0 {
            return Err(ForestError::InvalidParameter {
                name: "n_classes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            params,
            task: Task::Classification { n_classes },
            trees: Vec::new(),
            n_features: 0,
        })
    }

    pub fn regressor(params: ForestParams) -> Result<Self, ForestError> {
        params.validate()?;
        Ok(Self {
            params,
            task: Task::Regression,
            trees: Vec::new(),
            n_features: 0,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_classifier(&self) -> bool {
        matches!(self.task, Task::Classification { .. })
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Train on `x` (rows are samples) against `y`, replacing any previous fit.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ForestError> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ForestError::ShapeMismatch {
                features: n_samples,
                labels: y.len(),
            });
        }
        if n_samples == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }
        self.validate_labels(y)?;

        let n_features = x.ncols();
        let limits = self.params.growth_limits(n_samples, n_features);
        debug!(
            "Fitting {} trees on {} samples x {} features (leaf >= {}, {} features per split)",
            self.params.n_estimators,
            n_samples,
            n_features,
            limits.min_samples_leaf,
            limits.max_features
        );

        let task = self.task;
        let bootstrap = self.params.bootstrap;
        let base_seed = self.params.random_state;
        self.trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let samples: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(x, y, samples, task, &limits, &mut rng)
            })
            .collect();
        self.n_features = n_features;

        Ok(())
    }

    /// Predict one value per row of `x`: a class index or a regression value.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_row(x.row(i)))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let n_trees = self.trees.len() as f64;
        match self.task {
            Task::Classification { n_classes } => {
                let mut proba = vec![0.0; n_classes];
                for tree in &self.trees {
                    for (acc, p) in proba.iter_mut().zip(tree.predict_row(row)) {
                        *acc += p;
                    }
                }
                let mut best = 0;
                for (class, p) in proba.iter().enumerate() {
                    if *p > proba[best] {
                        best = class;
                    }
                }
                best as f64
            }
            Task::Regression => {
                self.trees
                    .iter()
                    .map(|tree| tree.predict_row(row)[0])
                    .sum::<f64>()
                    / n_trees
            }
        }
    }

    fn validate_labels(&self, y: ArrayView1<f64>) -> Result<(), ForestError> {
        for (row, &label) in y.iter().enumerate() {
            let reason = match self.task {
                _ if !label.is_finite() => Some("labels must be finite".to_string()),
                Task::Classification { n_classes }
                    if label < 0.0 || label.fract() != 0.0 || label >= n_classes as f64 =>
                {
                    Some(format!("expected a class index in 0..{}", n_classes))
                }
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(ForestError::InvalidLabel { row, label, reason });
            }
        }
        Ok(())
    }
}
