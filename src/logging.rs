//! Process-wide tracing setup for the `trip-report` binary.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "trip_report=info";
const DEBUG_LOG_FILTER: &str = "trip_report=debug";

pub struct LogConfig<'a> {
    pub debug: bool,
    pub log_file: Option<&'a Path>,
}

/// Install a stderr layer and, when configured, an appending file layer.
/// `RUST_LOG` takes precedence over `--debug`.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let default_filter = if config.debug {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    };

    let file_layer = match config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_filter(filter()),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
