//! # Trip Report CLI (`trip-report`)
//!
//! ```bash
//! # Collect a trip and build its report directory next to the cwd
//! trip-report /data/trips/2024-06-APS
//!
//! # Symlink side-files instead of copying, into a chosen directory
//! trip-report /data/trips/2024-06-APS --output /srv/reports --file-method symlink
//!
//! # Re-stage a previously collected data.json with a sample sheet
//! trip-report ./2024-06-APS_Trip_Report/data.json --json --correlation samples.csv
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use trip_report::config;
use trip_report::logging::{self, LogConfig};
use trip_report::materialize::TransferMethod;
use trip_report::report::{self, RunOptions};

const DEFAULT_CONFIG: &str = "./trip-report.toml";

/// Synchrotron data collector and report staging tool.
#[derive(Parser)]
#[command(
    name = "trip-report",
    about = "Synchrotron Data Collector and Report Generator",
    version
)]
struct Cli {
    /// Trip directory to collect, or a data JSON file with `--json`.
    base_directory: PathBuf,

    /// Treat BASE_DIRECTORY as a previously written data JSON file.
    #[arg(long = "json")]
    json_flag: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Parent directory for the report directory. Defaults to the working directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report directory name. Defaults to `{trip}_Trip_Report`.
    #[arg(long)]
    report_name: Option<String>,

    /// How side-files are staged: `copy` or `symlink`.
    #[arg(long, value_parser = parse_transfer_method)]
    file_method: Option<TransferMethod>,

    /// CSV sample sheet joined onto collections by container and slot.
    #[arg(long)]
    correlation: Option<PathBuf>,

    /// Walk sites concurrently.
    #[arg(long)]
    parallel: bool,

    /// Path to configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_transfer_method(s: &str) -> Result<TransferMethod, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cfg = config::load_or_default(&config_path, explicit)?;

    logging::init_logging(LogConfig {
        debug: cli.debug,
        log_file: cfg.logging.file.as_deref(),
    })?;

    let correlation_requested = cli.correlation.is_some();
    let opts = RunOptions {
        base: cli.base_directory,
        json_input: cli.json_flag,
        output: cli.output,
        report_name: cli.report_name,
        file_method: cli.file_method,
        correlation: cli.correlation,
        parallel: cli.parallel,
    };
    let outcome = report::run_report(&cfg, opts).await?;

    print!(
        "{}",
        outcome
            .data
            .processing_stats
            .summary(&outcome.data.trip_name, outcome.data.trip_data.len())
    );
    println!();
    println!("  Report:       {}", outcome.report_dir.display());
    println!(
        "  Staged files: {} ({} failed)",
        outcome.materialized.transferred, outcome.materialized.failed
    );
    if correlation_requested {
        println!(
            "  Correlation:  {}",
            if outcome.csv_loaded { "merged" } else { "no matches" }
        );
    }
    println!("ok");
    Ok(())
}
