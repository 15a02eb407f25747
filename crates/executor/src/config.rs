use clap::ValueEnum;
use config::{Config as ConfigLoader, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fx_cycles_core::SearchLimits;

use super::error::Error;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    Http,
    Simulated,
}

/// Where rates come from. Only the fields of the selected `kind` are read.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub fluctuation_bps: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Unit whose rates are fetched first; every other unit is reached through it.
    pub base_unit: String,
    /// Units of interest. Rates to anything else are ignored.
    pub units: Vec<String>,
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearcherConfig {
    pub interval_seconds: u64,
    /// Number of refresh passes before the pipeline stops. Unset runs until interrupted.
    #[serde(default)]
    pub passes: Option<u64>,
    #[serde(default)]
    pub max_hops: Option<usize>,
    #[serde(default)]
    pub max_expansions: Option<usize>,
}

impl SearcherConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_hops: self.max_hops,
            max_expansions: self.max_expansions,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub acquisition: AcquisitionConfig,
    pub searcher: SearcherConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    fn validate(&self) -> Result<(), Error> {
        if self.acquisition.units.is_empty() {
            return Err(Error::ConfigLoadError(
                "acquisition.units must list at least one unit".to_string(),
            ));
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(Error::ConfigLoadError(
                "pipeline.channel_capacity must be positive".to_string(),
            ));
        }

        let source = &self.acquisition.source;
        match source.kind {
            SourceKind::Csv if source.path.is_none() => Err(Error::ConfigLoadError(
                "acquisition.source.path is required for the csv source".to_string(),
            )),
            SourceKind::Http if source.base_url.is_none() => Err(Error::ConfigLoadError(
                "acquisition.source.base_url is required for the http source".to_string(),
            )),
            _ if !(source.fluctuation_bps.is_finite() && source.fluctuation_bps >= 0.0) => {
                Err(Error::ConfigLoadError(
                    "acquisition.source.fluctuation_bps must be a non-negative number".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Loads configuration from a TOML file layered with `EXECUTOR_*` environment variables.
///
/// Nested keys use a double underscore, e.g. `EXECUTOR_ACQUISITION__SOURCE__API_KEY`.
pub fn load_config(config_file_path: &Path) -> Result<Config, Error> {
    if !config_file_path.exists() {
        return Err(Error::ConfigLoadError(format!(
            "Configuration file not found at path: {}",
            config_file_path.display()
        )));
    }

    let s = ConfigLoader::builder()
        .add_source(File::from(config_file_path).format(FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("EXECUTOR")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("acquisition.units")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| Error::ConfigLoadError(e.to_string()))?;

    let app_config: Config = s
        .try_deserialize()
        .map_err(|e| Error::ConfigLoadError(format!("Failed to deserialize config: {}", e)))?;

    app_config.validate()?;

    Ok(app_config)
}
