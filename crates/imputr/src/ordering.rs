//! Imputation order.
//!
//! Columns with a caller-assigned rank go first, in ascending rank. The rest
//! follow in two groups: univariate-strategy columns, then multivariate-strategy
//! columns, each sorted by descending missing-value count. Columns with equal
//! counts keep their table order.

use crate::column::Column;
use crate::error::{ImputationError, Result};
use crate::strategy::{Strategy, StrategyKind};
use std::collections::{BTreeMap, HashMap};

/// Check that no two columns share a rank.
pub fn validate_order(order: &BTreeMap<String, i64>) -> Result<()> {
    let mut seen: HashMap<i64, &str> = HashMap::with_capacity(order.len());
    for (name, &rank) in order {
        if let Some(other) = seen.insert(rank, name) {
            return Err(ImputationError::InvalidOrder(format!(
                "columns '{}' and '{}' share rank {}",
                other, name, rank
            )));
        }
    }
    Ok(())
}

/// Order `columns` for imputation.
///
/// `columns` are the included columns in table order; every one of them must
/// have an entry in `strategies`, and every name in `order` must be one of
/// them. The result lists each column exactly once.
pub fn determine_order<'a>(
    columns: &[&'a Column],
    strategies: &BTreeMap<String, Box<dyn Strategy>>,
    order: &BTreeMap<String, i64>,
) -> Result<Vec<&'a Column>> {
    validate_order(order)?;
    for name in order.keys() {
        if !columns.iter().any(|c| c.name() == name) {
            return Err(ImputationError::ColumnNotFound(name.clone())
                .with_context("Resolving imputation order"));
        }
    }

    let mut ranked: Vec<(i64, &'a Column)> = Vec::with_capacity(order.len());
    let mut univariate: Vec<&'a Column> = Vec::new();
    let mut multivariate: Vec<&'a Column> = Vec::new();

    for &column in columns {
        if let Some(&rank) = order.get(column.name()) {
            ranked.push((rank, column));
            continue;
        }
        let strategy = strategies.get(column.name()).ok_or_else(|| {
            ImputationError::Internal(format!("no strategy assigned to column '{}'", column.name()))
        })?;
        match strategy.kind() {
            StrategyKind::Univariate => univariate.push(column),
            StrategyKind::Multivariate => multivariate.push(column),
        }
    }

    ranked.sort_by_key(|(rank, _)| *rank);
    univariate.sort_by(|a, b| b.missing_value_count().cmp(&a.missing_value_count()));
    multivariate.sort_by(|a, b| b.missing_value_count().cmp(&a.missing_value_count()));

    Ok(ranked
        .into_iter()
        .map(|(_, column)| column)
        .chain(univariate)
        .chain(multivariate)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;
    use crate::table::Table;
    use polars::df;
    use polars::prelude::DataFrame;
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        let df: DataFrame = df![
            "A" => [Some(1.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0)],
            "B" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)],
            "C" => [None, None, None, Some(4.0), Some(5.0), Some(6.0)],
            "D" => [None, None, None, None, None, Some(6.0)],
            "E" => [Some("x"), None, Some("y"), Some("x"), None, Some("y")],
        ]
        .unwrap();
        Table::from_dataframe(&df).unwrap()
    }

    fn strategies(
        table: &Table,
        assignment: &[(&str, &str)],
    ) -> BTreeMap<String, Box<dyn Strategy>> {
        let registry = StrategyRegistry::default();
        assignment
            .iter()
            .map(|(name, id)| {
                let column = table.column(name).unwrap();
                let strategy = registry
                    .create(id, column, table, &Default::default())
                    .unwrap();
                (name.to_string(), strategy)
            })
            .collect()
    }

    fn names(columns: &[&Column]) -> Vec<String> {
        columns.iter().map(|c| c.name().to_string()).collect()
    }

    #[test]
    fn test_ranked_then_univariate_then_multivariate() {
        let table = table();
        let strategies = strategies(
            &table,
            &[("A", "rf"), ("B", "rf"), ("C", "mean"), ("D", "rf")],
        );
        let columns: Vec<&Column> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| table.column(n).unwrap())
            .collect();
        let order = BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 0)]);

        let ordered = determine_order(&columns, &strategies, &order).unwrap();
        assert_eq!(names(&ordered), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_descending_missing_count_within_group() {
        let table = table();
        let strategies = strategies(&table, &[("A", "rf"), ("C", "rf"), ("D", "rf"), ("E", "rf")]);
        let columns: Vec<&Column> = ["A", "C", "D", "E"]
            .iter()
            .map(|n| table.column(n).unwrap())
            .collect();

        let ordered = determine_order(&columns, &strategies, &BTreeMap::new()).unwrap();
        assert_eq!(names(&ordered), vec!["D", "C", "E", "A"]);
    }

    #[test]
    fn test_equal_missing_counts_keep_table_order() {
        let table = table();
        let strategies = strategies(&table, &[("A", "mean"), ("B", "mean"), ("E", "mean")]);
        let columns: Vec<&Column> = ["A", "B", "E"]
            .iter()
            .map(|n| table.column(n).unwrap())
            .collect();

        let ordered = determine_order(&columns, &strategies, &BTreeMap::new()).unwrap();
        // E has two missing values; A and B stay in table order
        assert_eq!(names(&ordered), vec!["E", "A", "B"]);
    }

    #[test]
    fn test_rank_gaps_are_allowed() {
        let table = table();
        let strategies = strategies(&table, &[("A", "rf"), ("C", "rf"), ("D", "rf")]);
        let columns: Vec<&Column> = ["A", "C", "D"]
            .iter()
            .map(|n| table.column(n).unwrap())
            .collect();
        let order = BTreeMap::from([("D".to_string(), 10), ("A".to_string(), -3)]);

        let ordered = determine_order(&columns, &strategies, &order).unwrap();
        assert_eq!(names(&ordered), vec!["A", "D", "C"]);
    }

    #[test]
    fn test_duplicate_ranks_rejected() {
        let order = BTreeMap::from([("A".to_string(), 0), ("B".to_string(), 0)]);
        let err = validate_order(&order).unwrap_err();

        assert_eq!(err.error_code(), "INVALID_ORDER");
    }

    #[test]
    fn test_order_naming_unknown_column() {
        let table = table();
        let strategies = strategies(&table, &[("A", "rf")]);
        let columns = vec![table.column("A").unwrap()];
        let order = BTreeMap::from([("Z".to_string(), 0)]);

        let err = determine_order(&columns, &strategies, &order).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_missing_strategy_is_internal_error() {
        let table = table();
        let columns = vec![table.column("A").unwrap()];

        let err = determine_order(&columns, &BTreeMap::new(), &BTreeMap::new()).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
