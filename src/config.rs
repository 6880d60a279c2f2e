use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::correlate::CorrelationColumns;
use crate::materialize::TransferMethod;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub correlation: CorrelationColumns,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Parent directory of the report directory. Defaults to the working directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_method: TransferMethod,
    #[serde(default = "default_json_file")]
    pub json_file: String,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            title: None,
            file_method: TransferMethod::default(),
            json_file: default_json_file(),
            parallel: false,
        }
    }
}

fn default_json_file() -> String {
    "data.json".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists. A missing file is only an error when the
/// caller named it explicitly.
pub fn load_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    let json_file = &config.report.json_file;
    if json_file.trim().is_empty() {
        anyhow::bail!("report.json_file must not be empty");
    }
    if json_file.contains('/') || json_file.contains('\\') {
        anyhow::bail!(
            "report.json_file must be a bare file name, got '{}'",
            json_file
        );
    }

    let columns = &config.correlation;
    for (name, value) in [
        ("container", &columns.container),
        ("slot", &columns.slot),
        ("project", &columns.project),
        ("comment", &columns.comment),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("correlation.{} must not be empty", name);
        }
    }
    Ok(())
}
