//! Change-Request History CLI Application
//!
//! This is the command-line interface for the change-request history index.
//! It uses the cfx-history library and adds:
//! - TOML configuration of inputs, build filters, date policy and queries
//! - JSON record loading
//! - Report generation (TXT/JSON)
//! - Ctrl+C cancellation of long aggregation runs

use anyhow::{Context, Result};
use cfx_history::{
    CancellationToken, CompositeFilter, EngineConfig, HistoryLibrary, LibraryConfig, QueryEngine,
    StaticFilter,
};
use clap::Parser;
use std::path::PathBuf;

mod config;
mod inputs;
mod queries;
mod report;

use report::QueryReport;

/// Change-request history - state counts of tracked requests over time
#[derive(Parser, Debug)]
#[command(name = "cfx-history")]
#[command(about = "Build a change-request history index and count states over time", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Write every report to this file instead of the configured output directory
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Sample dates on the current thread only
    #[arg(long)]
    sequential: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Change-request history CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using history library v{}", cfx_history::VERSION);

    log::info!("Loading configuration from: {:?}", args.config);
    let config = config::load_config(&args.config)?;
    log::debug!("Configuration loaded successfully");

    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupt received, cancelling the current run");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    // Build the library
    let directory = inputs::load_directory(config.input.users.as_deref())?;
    let records = inputs::load_inputs(&config.input.records)?;
    let build_filters = queries::library_filters(&config.library)?;

    let mut library_config =
        LibraryConfig::new().ignore_creation_errors(config.library.ignore_creation_errors);
    if let Some(label) = &config.library.label {
        library_config = library_config.with_label(label);
    }

    let library = HistoryLibrary::build(&records, &directory, &build_filters, &library_config)
        .context("Failed to build the history library")?;
    if !library.failed_ids().is_empty() {
        log::warn!(
            "{} entities could not be created: {}",
            library.failed_ids().len(),
            library.failed_ids().join(", ")
        );
    }
    for filter in &build_filters {
        log::debug!("Build filter '{}': {} cache hits", filter.label(), filter.cache_hits());
    }

    // Run the queries
    let generator = queries::dates_generator(&config.dates)?;
    let engine = QueryEngine::new(&library)
        .with_config(EngineConfig::new().with_parallel(!args.sequential))
        .with_cancellation(cancellation);

    let query_filters: Vec<(String, Vec<CompositeFilter>)> = if config.queries.is_empty() {
        vec![("All".to_string(), Vec::new())]
    } else {
        config
            .queries
            .iter()
            .map(|query| -> Result<(String, Vec<CompositeFilter>)> {
                Ok((query.name.clone(), vec![queries::composite_filter(query)?]))
            })
            .collect::<Result<_>>()?
    };

    let mut rendered = Vec::new();
    for (name, filters) in &query_filters {
        log::info!("Running query '{}'", name);
        let results = engine
            .gather_state_counts_for_each_date(filters, generator.as_ref())
            .with_context(|| format!("Query '{}' failed", name))?;

        let report = QueryReport {
            name,
            library: library.label(),
            results: &results,
        };
        let destination = report::destination(
            args.output.as_deref(),
            config.output.output_dir.as_deref(),
            name,
            config.output.format,
        );
        rendered.push((destination, report.render(config.output.format)?));
    }

    report::write_reports(&rendered)?;
    log::info!(
        "{} queries over {} entities completed",
        query_filters.len(),
        library.len()
    );

    Ok(())
}

/// Level selected by the -v / -q flags
fn log_level(verbose: u8, quiet: bool) -> log::LevelFilter {
    use log::LevelFilter;

    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Initialize logging; `RUST_LOG` directives refine the flag-selected level per module
fn init_logging(verbose: u8, quiet: bool) {
    use std::io::Write;

    env_logger::Builder::new()
        .filter_level(log_level(verbose, quiet))
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:<5} {}] {}",
                record.level(),
                record.target().trim_start_matches("cfx_history::"),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn test_log_level_flags() {
        assert_eq!(log_level(0, false), LevelFilter::Info);
        assert_eq!(log_level(1, false), LevelFilter::Debug);
        assert_eq!(log_level(3, false), LevelFilter::Trace);
        assert_eq!(log_level(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["cfx-history", "-c", "config.toml", "-vv", "--sequential"]);
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert_eq!(args.verbose, 2);
        assert!(args.sequential);
        assert!(args.output.is_none());
    }
}
