//! Integration tests for column-ordered imputation.
//!
//! These tests run the public API end to end on a small Digimon dataset.

use imputr::{ColumnType, Imputer, ImputerConfig, StrategyKind, StrategyRegistry};
use polars::df;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn digimon() -> DataFrame {
    load_csv("digimon_small.csv")
}

fn total_nulls(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

fn series<'a>(df: &'a DataFrame, name: &str) -> &'a Series {
    df.column(name).unwrap().as_materialized_series()
}

fn fast_forest_config() -> ImputerConfig {
    ImputerConfig::from_json_str(
        r#"{
            "predefined_strategies": {
                "Lv50 Atk": {"strategy": "rf", "params": {
                    "n_estimators": 16, "min_samples_split": 2,
                    "min_samples_leaf": 1, "min_weight_fraction_leaf": 0.0
                }}
            }
        }"#,
    )
    .unwrap()
}

// ============================================================================
// Fixture sanity
// ============================================================================

#[test]
fn test_fixture_has_missing_values() {
    let df = digimon();
    assert_eq!(df.shape(), (20, 8));
    assert_eq!(df.column("Stage").unwrap().null_count(), 1);
    assert_eq!(df.column("Attribute").unwrap().null_count(), 3);
    assert_eq!(df.column("Lv50 Atk").unwrap().null_count(), 3);
    assert_eq!(total_nulls(&df), 7);
}

// ============================================================================
// Default (random forest) imputation
// ============================================================================

#[test]
fn test_auto_imputes_every_missing_value() {
    let df = digimon();
    let (imputed, summary) = Imputer::auto(&df).unwrap().impute_with_summary().unwrap();

    assert_eq!(imputed.shape(), df.shape());
    assert_eq!(imputed.get_column_names_str(), df.get_column_names_str());
    assert_eq!(total_nulls(&imputed), 0);

    assert_eq!(summary.rows, 20);
    assert_eq!(summary.columns, 8);
    assert_eq!(summary.missing_before, 7);
    assert_eq!(summary.missing_after, 0);
    assert_eq!(summary.values_imputed(), 7);
}

#[test]
fn test_auto_leaves_complete_columns_untouched() {
    let df = digimon();
    let imputed = Imputer::auto(&df).unwrap().impute().unwrap();

    for name in ["Number", "Digimon", "Type", "Memory", "Lv50 HP"] {
        assert!(
            series(&imputed, name).equals_missing(series(&df, name)),
            "column '{}' should be unchanged",
            name
        );
    }
    assert_eq!(series(&imputed, "Number").dtype(), &DataType::Int64);
}

#[test]
fn test_auto_keeps_observed_values() {
    let df = digimon();
    let imputed = Imputer::auto(&df).unwrap().impute().unwrap();

    let before = series(&df, "Attribute").str().unwrap();
    let after = series(&imputed, "Attribute").str().unwrap();
    for (original, filled) in before.into_iter().zip(after.into_iter()) {
        if let Some(original) = original {
            assert_eq!(filled, Some(original));
        }
    }

    let before = series(&df, "Lv50 Atk").cast(&DataType::Float64).unwrap();
    let after = series(&imputed, "Lv50 Atk").f64().unwrap().clone();
    for (original, filled) in before.f64().unwrap().into_iter().zip(after.into_iter()) {
        if let Some(original) = original {
            assert_eq!(filled, Some(original));
        }
    }
}

#[test]
fn test_auto_imputed_labels_come_from_observed_labels() {
    let df = digimon();
    let imputed = Imputer::auto(&df).unwrap().impute().unwrap();

    let observed: Vec<&str> = series(&df, "Attribute")
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    for label in series(&imputed, "Attribute").str().unwrap().into_iter() {
        let label = label.expect("no nulls after imputation");
        assert!(observed.contains(&label), "unexpected label '{}'", label);
    }
}

#[test]
fn test_auto_output_dtypes() {
    let df = digimon();
    let imputed = Imputer::auto(&df).unwrap().impute().unwrap();

    assert_eq!(series(&imputed, "Lv50 Atk").dtype(), &DataType::Float64);
    assert_eq!(series(&imputed, "Attribute").dtype(), &DataType::String);
    assert_eq!(series(&imputed, "Stage").dtype(), &DataType::String);
}

#[test]
fn test_auto_is_deterministic() {
    let df = digimon();
    let first = Imputer::new(&df, fast_forest_config()).unwrap().impute().unwrap();
    let second = Imputer::new(&df, fast_forest_config()).unwrap().impute().unwrap();

    assert!(first.equals_missing(&second));
}

#[test]
fn test_forest_predictions_stay_within_observed_range() {
    let df = digimon();
    let imputed = Imputer::new(&df, fast_forest_config()).unwrap().impute().unwrap();

    let atk = series(&imputed, "Lv50 Atk").f64().unwrap();
    for value in atk.into_iter().flatten() {
        assert!((68.0..=132.0).contains(&value), "prediction {} out of range", value);
    }
}

// ============================================================================
// Mean imputation
// ============================================================================

#[test]
fn test_mean_fills_mean_and_mode() {
    let df = digimon();
    let imputed = Imputer::mean(&df).unwrap().impute().unwrap();
    assert_eq!(total_nulls(&imputed), 0);

    let mean = series(&df, "Lv50 Atk").mean().unwrap();
    let atk = series(&imputed, "Lv50 Atk").f64().unwrap();
    for row in [2, 8, 17] {
        let value = atk.get(row).unwrap();
        assert!((value - mean).abs() < 1e-9);
    }

    let attribute = series(&imputed, "Attribute").str().unwrap();
    for row in [4, 14, 18] {
        assert_eq!(attribute.get(row), Some("Neutral"));
    }
    assert_eq!(series(&imputed, "Stage").str().unwrap().get(12), Some("Rookie"));
}

#[test]
fn test_mean_strategies_are_univariate() {
    let df = digimon();
    let imputer = Imputer::mean(&df).unwrap();

    assert_eq!(imputer.strategies().len(), 3);
    for strategy in imputer.strategies().values() {
        assert_eq!(strategy.identifier(), "mean");
        assert_eq!(strategy.kind(), StrategyKind::Univariate);
    }
}

// ============================================================================
// Column selection and ordering
// ============================================================================

#[test]
fn test_default_order_is_descending_missing_count() {
    let df = digimon();
    let imputer = Imputer::auto(&df).unwrap();

    // Attribute and Lv50 Atk tie at three missing values and keep table order
    assert_eq!(imputer.ordered_columns(), ["Attribute", "Lv50 Atk", "Stage"]);
}

#[test]
fn test_predefined_order_goes_first() {
    let df = digimon();
    let config = ImputerConfig::builder()
        .order("Stage", 0)
        .strategy("Lv50 Atk", "mean")
        .build()
        .unwrap();
    let (_, summary) = Imputer::new(&df, config)
        .unwrap()
        .impute_with_summary()
        .unwrap();

    let order: Vec<&str> = summary
        .column_summaries
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    // ranked, then univariate, then multivariate
    assert_eq!(order, vec!["Stage", "Lv50 Atk", "Attribute"]);
    assert_eq!(summary.column_summaries[0].order_position, 0);
    assert_eq!(summary.column_summaries[1].strategy, "mean");
    assert_eq!(summary.column_summaries[2].strategy, "rf");
}

#[test]
fn test_include_non_missing_imputes_every_column() {
    let df = digimon();
    let config = ImputerConfig::builder()
        .include_non_missing(true)
        .default_strategy("mean")
        .build()
        .unwrap();
    let mut imputer = Imputer::new(&df, config).unwrap();
    assert_eq!(imputer.included_columns().len(), 8);

    let (imputed, summary) = imputer.impute_with_summary().unwrap();
    assert_eq!(summary.column_summaries.len(), 8);
    assert_eq!(total_nulls(&imputed), 0);

    // imputed continuous columns are normalized to Float64
    assert_eq!(series(&imputed, "Number").dtype(), &DataType::Float64);
    assert_eq!(series(&imputed, "Number").f64().unwrap().get(0), Some(1.0));
}

#[test]
fn test_datatype_override_makes_numbers_categorical() {
    let df = digimon();
    let config = ImputerConfig::builder()
        .datatype("Memory", ColumnType::Categorical)
        .strategy("Memory", "rf")
        .build()
        .unwrap();
    let mut imputer = Imputer::new(&df, config).unwrap();

    let memory = imputer.table().column("Memory").unwrap();
    assert_eq!(memory.column_type(), ColumnType::Categorical);
    assert_eq!(memory.unique_value_count(), 4);
    assert!(imputer.included_columns().contains(&"Memory".to_string()));

    let imputed = imputer.impute().unwrap();
    assert_eq!(series(&imputed, "Memory").dtype(), &DataType::String);
    assert_eq!(series(&imputed, "Memory").str().unwrap().get(0), Some("2"));
}

#[test]
fn test_low_cardinality_warning_in_summary() {
    let df = digimon();
    let (_, summary) = Imputer::auto(&df).unwrap().impute_with_summary().unwrap();

    assert!(summary.warnings.iter().any(|w| w.contains("Memory")));
}

// ============================================================================
// Configuration files
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let df = digimon();
    let config =
        ImputerConfig::from_json_file(fixtures_path().join("digimon_config.json")).unwrap();
    assert_eq!(config.predefined_datatypes["Memory"], ColumnType::Categorical);

    let mut imputer = Imputer::new(&df, config).unwrap();
    assert_eq!(imputer.ordered_columns(), ["Attribute", "Stage", "Lv50 Atk"]);
    assert_eq!(imputer.strategy("Stage").unwrap().identifier(), "mean");

    let imputed = imputer.impute().unwrap();
    assert_eq!(total_nulls(&imputed), 0);
}

#[test]
fn test_config_file_not_found() {
    let err = ImputerConfig::from_json_file(fixtures_path().join("missing.json")).unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_summary_serializes_to_json() {
    let df = digimon();
    let (_, summary) = Imputer::mean(&df).unwrap().impute_with_summary().unwrap();

    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["missing_before"], 7);
    assert_eq!(json["missing_after"], 0);
    assert_eq!(json["column_summaries"][0]["strategy"], "mean");
    assert_eq!(json["column_summaries"][0]["column_type"], "cat");
}

// ============================================================================
// Rejected configurations
// ============================================================================

#[test]
fn test_unknown_strategy_rejected() {
    let df = digimon();
    let config = ImputerConfig::builder()
        .strategy("Attribute", "knn")
        .build()
        .unwrap();

    let err = Imputer::new(&df, config).unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_STRATEGY");
    assert!(err.is_config_error());
}

#[test]
fn test_unknown_column_rejected() {
    let df = digimon();
    for config in [
        ImputerConfig::builder().order("Level", 0).build().unwrap(),
        ImputerConfig::builder().strategy("Level", "mean").build().unwrap(),
        ImputerConfig::builder()
            .datatype("Level", ColumnType::Continuous)
            .build()
            .unwrap(),
    ] {
        let err = Imputer::new(&df, config).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}

#[test]
fn test_impossible_datatype_override_rejected() {
    let df = digimon();
    let config = ImputerConfig::builder()
        .datatype("Digimon", ColumnType::Continuous)
        .build()
        .unwrap();

    let err = Imputer::new(&df, config).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_invalid_forest_params_rejected() {
    let df = digimon();
    let config = ImputerConfig::from_json_str(
        r#"{"predefined_strategies": {
            "Lv50 Atk": {"strategy": "rf", "params": {"n_estimators": 0}}
        }}"#,
    )
    .unwrap();

    let err = Imputer::new(&df, config).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PARAMETERS");
}

#[test]
fn test_all_null_column_rejected() {
    let df = df![
        "a" => [Some(1.0), None, Some(3.0)],
        "b" => [None::<f64>, None, None],
    ]
    .unwrap();

    let err = Imputer::auto(&df).unwrap_err();
    assert_eq!(err.error_code(), "NO_VALID_VALUES");
}

#[test]
fn test_custom_registry_without_default_strategy_rejected() {
    let df = digimon();
    let err = Imputer::builder()
        .registry(StrategyRegistry::empty())
        .build(&df)
        .unwrap_err();

    assert_eq!(err.error_code(), "UNKNOWN_STRATEGY");
}
