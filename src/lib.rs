pub mod candidates;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod join;
pub mod matcher;
pub mod normalize;
pub mod planner;
pub mod preview;
pub mod profile;
pub mod report;
pub mod similarity;
pub mod table;

use std::{borrow::Cow, env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs, JoinArgs, ProfileArgs},
    config::MatchConfig,
    error::AutoJoinError,
    planner::{PlannedJoin, analyze, build_plan},
    report::Report,
    table::Table,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbosity: u8) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = match verbosity {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            };
            builder.filter_module("csv_autojoin", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Join(args) => handle_join(&args),
        Commands::Profile(args) => handle_profile(&args),
    }
}

/// Discovers key correspondences between `tables` and merges them onto the
/// first table.
///
/// Tables that cannot be matched are left out of the result and recorded as
/// unmatched in the report; they are not an error.
pub fn match_and_join(tables: &[Table], config: &MatchConfig) -> Result<(Table, Report), AutoJoinError> {
    let PlannedJoin {
        tables,
        analyses,
        plan,
        mut report,
    } = plan_join(tables, config)?;
    let (joined, executions) = join::execute_plan(&tables, &analyses, &plan)?;
    report.record_executions(executions);
    report.output_rows = Some(joined.row_count());
    report.output_columns = Some(joined.column_count());
    Ok((joined, report))
}

/// Validates the inputs and builds the join plan without executing it.
pub fn plan_join<'a>(
    tables: &'a [Table],
    config: &MatchConfig,
) -> Result<PlannedJoin<'a>, AutoJoinError> {
    config.validate()?;
    if tables.len() < 2 {
        return Err(AutoJoinError::TooFewTables {
            count: tables.len(),
        });
    }
    for table in tables {
        table.ensure_joinable()?;
    }
    let tables: Cow<'a, [Table]> = if config.drop_duplicates {
        Cow::Owned(
            tables
                .iter()
                .map(|table| {
                    let unique = table.without_duplicate_rows();
                    if unique.row_count() < table.row_count() {
                        info!(
                            "{} | dropped {} duplicate row(s)",
                            table.name(),
                            table.row_count() - unique.row_count()
                        );
                    }
                    unique
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(tables)
    };
    info!(
        "Matching {} table(s) onto '{}' ({} join, {} names, threshold {:.2})",
        tables.len(),
        tables[0].name(),
        config.how,
        config.strategy,
        config.threshold
    );
    let analyses = tables
        .iter()
        .map(|table| analyze(table, config))
        .collect::<Result<Vec<_>, _>>()?;
    let (plan, report) = build_plan(&analyses, config);
    Ok(PlannedJoin {
        tables,
        analyses,
        plan,
        report,
    })
}

fn load_tables(files: &[std::path::PathBuf], input: &InputArgs) -> Result<Vec<Table>> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    files
        .iter()
        .map(|path| {
            let table = io_utils::load_table(path, input.delimiter, encoding)?;
            debug!(
                "Loaded '{}' with {} row(s) and {} column(s)",
                table.name(),
                table.row_count(),
                table.column_count()
            );
            Ok(table)
        })
        .collect()
}

fn handle_join(args: &JoinArgs) -> Result<()> {
    let config = args.resolve_config().context("Resolving matching options")?;
    let tables = load_tables(&args.files, &args.input)?;

    let report = if args.dry_run {
        let report = plan_join(&tables, &config)?.report;
        info!(
            "Dry run: {} of {} table(s) would be joined",
            report.matched_tables().len() + 1,
            tables.len()
        );
        let (headers, rows) = report.summary_rows();
        preview::print_table(&headers, &rows);
        report
    } else {
        let (joined, report) = match_and_join(&tables, &config)?;
        if args.table {
            print!("{}", preview::render_preview(&joined, args.preview_rows));
        } else {
            let delimiter =
                io_utils::resolve_output_delimiter(args.output.as_deref(), args.output_delimiter);
            io_utils::write_table(&joined, args.output.as_deref(), delimiter)
                .context("Writing joined output")?;
            if let Some(path) = &args.output {
                info!("Joined table written to {path:?}");
            }
        }
        report
    };

    let unmatched = report.unmatched_tables();
    if !unmatched.is_empty() {
        info!("Unmatched table(s): {}", unmatched.join(", "));
    }
    if let Some(path) = &args.report {
        report
            .save(path)
            .with_context(|| format!("Writing report to {path:?}"))?;
        info!("Match report written to {path:?}");
    }
    Ok(())
}

fn handle_profile(args: &ProfileArgs) -> Result<()> {
    let config = args.matching.resolve().context("Resolving matching options")?;
    config.validate()?;
    let tables = load_tables(&args.files, &args.input)?;
    for table in &tables {
        let analysis = analyze(table, &config)
            .with_context(|| format!("Profiling '{}'", table.name()))?;
        println!(
            "{} ({} row(s), {} column(s))",
            table.name(),
            table.row_count(),
            table.column_count()
        );
        let headers = ["column", "type", "non_null", "distinct", "uniqueness", "null_ratio"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = analysis
            .profile
            .columns
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    match &c.date_format {
                        Some(format) => format!("{} ({format})", c.column_type),
                        None => c.column_type.to_string(),
                    },
                    c.non_null.to_string(),
                    c.distinct.to_string(),
                    format!("{:.3}", c.uniqueness),
                    format!("{:.3}", c.null_ratio),
                ]
            })
            .collect::<Vec<_>>();
        preview::print_table(&headers, &rows);
        println!();

        let headers = ["rank", "key", "arity", "uniqueness", "complete"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = analysis
            .candidates
            .iter()
            .enumerate()
            .map(|(rank, c)| {
                vec![
                    (rank + 1).to_string(),
                    if c.fallback {
                        format!("{} (full row)", c.label())
                    } else if c.superset {
                        format!("{} (superset)", c.label())
                    } else {
                        c.label()
                    },
                    c.arity().to_string(),
                    format!("{:.3}", c.uniqueness),
                    c.complete.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        preview::print_table(&headers, &rows);
        println!();
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
