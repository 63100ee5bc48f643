use super::{
    Strategy, StrategyKind, StrategyParams, ensure_supported, feature_matrix, reassemble,
};
use crate::column::Column;
use crate::error::{ImputationError, Result};
use crate::forest::{ForestParams, RandomForest};
use crate::table::Table;
use crate::types::ColumnType;
use ndarray::Array1;
use polars::prelude::{NamedFrom, Series};
use std::collections::BTreeSet;
use tracing::debug;

const SUPPORTED: &[ColumnType] = &[ColumnType::Categorical, ColumnType::Continuous];

/// Predicts missing values from every other column with a random forest:
/// a classifier for categorical targets, a regressor for continuous ones.
#[derive(Debug, Clone)]
pub struct RandomForestStrategy {
    target: String,
    target_type: ColumnType,
    features: Vec<String>,
    params: ForestParams,
    model: Option<FittedModel>,
}

#[derive(Debug, Clone)]
struct FittedModel {
    forest: RandomForest,
    /// Class labels by index; empty for regression.
    classes: Vec<String>,
}

impl RandomForestStrategy {
    pub const IDENTIFIER: &'static str = "rf";

    pub fn new(target: &Column, features: &[&Column], params: ForestParams) -> Result<Self> {
        ensure_supported("RandomForest", SUPPORTED, target)?;
        params
            .validate()
            .map_err(|e| ImputationError::InvalidParameters {
                strategy: Self::IDENTIFIER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            target: target.name().to_string(),
            target_type: target.column_type(),
            features: features.iter().map(|c| c.name().to_string()).collect(),
            params,
            model: None,
        })
    }

    /// Registry entry point; `params` are deserialized into [`ForestParams`].
    pub(crate) fn create(
        target: &Column,
        features: &[&Column],
        params: &StrategyParams,
    ) -> Result<Box<dyn Strategy>> {
        let params: ForestParams = serde_json::from_value(serde_json::Value::Object(params.clone()))
            .map_err(|e| ImputationError::InvalidParameters {
                strategy: Self::IDENTIFIER.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(Self::new(target, features, params)?))
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

impl Strategy for RandomForestStrategy {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn name(&self) -> &str {
        "RandomForest"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Multivariate
    }

    fn supported_data_types(&self) -> &[ColumnType] {
        SUPPORTED
    }

    fn target_column(&self) -> &str {
        &self.target
    }

    fn feature_columns(&self) -> &[String] {
        &self.features
    }

    fn fit(&mut self, table: &Table) -> Result<()> {
        let column = table.require(&self.target)?;
        let rows = column.non_null_indices();
        let x = feature_matrix(table, &self.features, rows)?;

        let model = match self.target_type {
            ColumnType::Continuous => {
                let y: Array1<f64> = column.data().f64()?.into_iter().flatten().collect();
                let mut forest = RandomForest::regressor(self.params.clone())?;
                forest.fit(x.view(), y.view())?;
                FittedModel {
                    forest,
                    classes: Vec::new(),
                }
            }
            ColumnType::Categorical => {
                let labels: Vec<&str> = column.data().str()?.into_iter().flatten().collect();
                let classes: Vec<String> = labels
                    .iter()
                    .copied()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(String::from)
                    .collect();
                let y: Array1<f64> = labels
                    .iter()
                    .map(|label| {
                        classes
                            .binary_search_by(|c| c.as_str().cmp(label))
                            .map(|idx| idx as f64)
                            .map_err(|_| {
                                ImputationError::Internal(format!("label '{}' has no class", label))
                            })
                    })
                    .collect::<Result<_>>()?;
                let mut forest = RandomForest::classifier(self.params.clone(), classes.len())?;
                forest.fit(x.view(), y.view())?;
                FittedModel { forest, classes }
            }
        };

        debug!(
            "Fitted {} on '{}' with {} rows and {} features",
            self.name(),
            self.target,
            rows.len(),
            self.features.len()
        );
        self.model = Some(model);
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn impute_column(&self, table: &Table) -> Result<Series> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ImputationError::StrategyNotFitted(self.target.clone()))?;
        let column = table.require(&self.target)?;

        let missing = column.null_indices();
        let predictions = if missing.is_empty() {
            Vec::new()
        } else {
            let x = feature_matrix(table, &self.features, missing)?;
            model.forest.predict(x.view())?.to_vec()
        };

        let name = column.name().into();
        match self.target_type {
            ColumnType::Continuous => {
                let observed: Vec<f64> = column.data().f64()?.into_iter().flatten().collect();
                let values = reassemble(column, &observed, &predictions)?;
                Ok(Series::new(name, values))
            }
            ColumnType::Categorical => {
                let predicted: Vec<&str> = predictions
                    .iter()
                    .map(|&code| {
                        model
                            .classes
                            .get(code as usize)
                            .map(String::as_str)
                            .ok_or_else(|| ImputationError::ImputationFailed {
                                column: self.target.clone(),
                                reason: format!("predicted unknown class {}", code),
                            })
                    })
                    .collect::<Result<_>>()?;
                let observed: Vec<&str> = column.data().str()?.into_iter().flatten().collect();
                let values = reassemble(column, &observed, &predicted)?;
                Ok(Series::new(name, values))
            }
        }
    }
}
