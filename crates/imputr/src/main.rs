//! CLI entry point for column-ordered imputation of CSV files.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use imputr::{ColumnType, Imputer, ImputerConfig, ImputationSummary, StrategySpec};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Column-ordered missing value imputation",
    long_about = "Fills the missing values of a CSV file one column at a time.\n\n\
                  Columns with missing values are imputed with random forests (\"rf\") unless\n\
                  another strategy is given. Ranked columns go first, then univariate\n\
                  strategies, then multivariate ones, by descending missing count.\n\n\
                  EXAMPLES:\n  \
                  # Impute with defaults, writes digimon_imputed.csv\n  \
                  imputr -i digimon.csv\n\n  \
                  # Mean/mode fill, Attribute first\n  \
                  imputr -i digimon.csv --default-strategy mean --order Attribute=0\n\n  \
                  # Treat a numeric column as categorical and preview the plan\n  \
                  imputr -i digimon.csv --datatype Memory=cat --dry-run"
)]
struct Args {
    /// Path to the CSV file to impute
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the imputed CSV
    ///
    /// Defaults to <input_stem>_imputed.csv next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Strategy for columns without an explicit one ("rf", "mean")
    #[arg(long)]
    default_strategy: Option<String>,

    /// Strategy for one column, as NAME=ID (repeatable)
    #[arg(long = "strategy", value_name = "NAME=ID", value_parser = parse_key_value::<String>)]
    strategies: Vec<(String, String)>,

    /// Column type override, as NAME=cat|cont (repeatable)
    #[arg(
        long = "datatype",
        value_name = "NAME=TYPE",
        value_parser = parse_key_value::<ColumnType>
    )]
    datatypes: Vec<(String, ColumnType)>,

    /// Imputation rank for one column, as NAME=RANK (repeatable)
    #[arg(long = "order", value_name = "NAME=RANK", value_parser = parse_key_value::<i64>)]
    order: Vec<(String, i64)>,

    /// Impute every column, including those without missing values
    #[arg(long)]
    include_non_missing: bool,

    /// Show column metadata, strategies and order without imputing
    #[arg(long)]
    dry_run: bool,

    /// Print the imputation summary as JSON to stdout
    ///
    /// Disables all logs so stdout only holds JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Parse `NAME=VALUE`, splitting on the last `=`.
fn parse_key_value<T>(s: &str) -> std::result::Result<(String, T), String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let (key, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("missing column name in '{}'", s));
    }
    let value = value.trim().parse::<T>().map_err(|e| e.to_string())?;
    Ok((key.to_string(), value))
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(&args)?;

    info!("Loading dataset from: {}", args.input.display());
    let data = load_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let mut imputer = Imputer::new(&data, config)?;

    if args.dry_run {
        print_plan(&args, &imputer);
        return Ok(());
    }

    let (mut imputed, summary) = imputer.impute_with_summary()?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_csv(&mut imputed, &output)?;
    info!("Imputed dataset written to: {}", output.display());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &output);
    }

    Ok(())
}

/// Load the config file, if any, and apply command line overrides.
fn build_config(args: &Args) -> Result<ImputerConfig> {
    let mut config = match &args.config {
        Some(path) => ImputerConfig::from_json_file(path)?,
        None => ImputerConfig::default(),
    };

    if let Some(ref strategy) = args.default_strategy {
        config.default_strategy = strategy.clone();
    }
    for (column, strategy) in &args.strategies {
        config
            .predefined_strategies
            .insert(column.clone(), StrategySpec::new(strategy.as_str()));
    }
    for (column, column_type) in &args.datatypes {
        config
            .predefined_datatypes
            .insert(column.clone(), *column_type);
    }
    for (column, rank) in &args.order {
        config.predefined_order.insert(column.clone(), *rank);
    }
    if args.include_non_missing {
        config.include_non_missing = true;
    }

    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}_imputed.csv", stem))
}

/// Load a CSV, retrying without quote handling if the first attempt fails.
fn load_csv(path: &Path) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Print what an imputation run would do.
///
/// Uses `println!` on purpose: this is the output of `--dry-run`, not logging.
fn print_plan(args: &Args, imputer: &Imputer) {
    let table = imputer.table();

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Imputation plan");
    println!("{}\n", "=".repeat(80));

    println!("  File: {}", args.input.display());
    println!("  Rows: {}", table.height());
    println!("  Columns: {}", table.width());
    println!();

    println!(
        "{:<20} {:<12} {:<8} {:<8} {:<16} {:<8}",
        "Column", "Type", "Missing", "Unique", "Average", "Strategy"
    );
    println!("{}", "-".repeat(80));
    for column in table.columns() {
        let strategy = imputer
            .strategy(column.name())
            .map(|s| s.identifier().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<12} {:<8} {:<8} {:<16} {:<8}",
            truncate_str(column.name(), 19),
            column.column_type(),
            column.missing_value_count(),
            column.unique_value_count(),
            truncate_str(&column.average().to_string(), 15),
            strategy
        );
    }
    println!();

    println!("IMPUTATION ORDER");
    println!("{}", "-".repeat(40));
    if imputer.ordered_columns().is_empty() {
        println!("  Nothing to impute");
    }
    for (position, name) in imputer.ordered_columns().iter().enumerate() {
        println!("  {}. {}", position + 1, name);
    }
    println!();

    let warnings = table.warnings();
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in &warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!("To execute this imputation, run without --dry-run");
    println!("{}", "=".repeat(80));
}

fn print_summary(summary: &ImputationSummary, output: &Path) {
    println!();
    println!("{}", "=".repeat(80));
    println!("IMPUTATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!(
        "Output: {} ({} rows x {} columns)",
        output.display(),
        summary.rows,
        summary.columns
    );
    println!("Duration: {}ms", summary.duration_ms);
    println!(
        "Missing values: {} -> {}",
        summary.missing_before, summary.missing_after
    );
    println!();

    if !summary.column_summaries.is_empty() {
        println!("Columns:");
        for column in &summary.column_summaries {
            println!(
                "  {}. {} ({}, {}): {} values in {}ms",
                column.order_position + 1,
                column.name,
                column.column_type,
                column.strategy,
                column.values_imputed,
                column.duration_ms
            );
        }
        println!();
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
