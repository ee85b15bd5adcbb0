//! ---
//! feeder_section: "01-core-functionality"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Shared primitives and utilities for the compiler workspace."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_seed() -> u64 {
    100
}

fn default_max_profile_draws() -> u32 {
    500
}

fn default_base_frequency_hz() -> f64 {
    50.0
}

fn default_voltage_bases_kv() -> Vec<f64> {
    vec![66.0, 22.0, 12.7, 0.400, 0.2309]
}

fn default_regulation_range() -> f64 {
    0.10
}

fn default_script_path() -> PathBuf {
    PathBuf::from("target/feeder/circuit.dss")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("target/feeder/reports")
}

/// Primary configuration object for a compile session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "FEEDER_CONFIG";

    /// Load configuration together with the effective source path, respecting
    /// the `FEEDER_CONFIG` override.
    ///
    /// Falls back to [`AppConfig::default`] with no source when neither the
    /// environment override nor any candidate exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    /// Read and validate a single TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.compile.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `FEEDER_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: default_log_level(),
        }
    }
}

/// Knobs for a single compile session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Seed of the session-wide pseudo-random source.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Explicit day-of-year (1-365). Drawn from the seeded source when absent.
    #[serde(default)]
    pub day: Option<u16>,
    /// Upper bound on commercial profile draws per load.
    #[serde(default = "default_max_profile_draws")]
    pub max_profile_draws: u32,
    #[serde(default = "default_base_frequency_hz")]
    pub base_frequency_hz: f64,
    #[serde(default = "default_voltage_bases_kv")]
    pub voltage_bases_kv: Vec<f64>,
    /// Regulation range of autotransformer regulators as a fraction (0.10 = 10%).
    #[serde(default = "default_regulation_range")]
    pub regulation_range: f64,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            day: None,
            max_profile_draws: default_max_profile_draws(),
            base_frequency_hz: default_base_frequency_hz(),
            voltage_bases_kv: default_voltage_bases_kv(),
            regulation_range: default_regulation_range(),
            source: SourceConfig::default(),
        }
    }
}

impl CompileConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(day) = self.day {
            if !(1..=365).contains(&day) {
                return Err(anyhow!("compile.day must be within 1..=365, got {}", day));
            }
        }
        if self.max_profile_draws == 0 {
            return Err(anyhow!("compile.max_profile_draws must be at least 1"));
        }
        if self.base_frequency_hz <= 0.0 {
            return Err(anyhow!(
                "compile.base_frequency_hz must be positive, got {}",
                self.base_frequency_hz
            ));
        }
        if self.voltage_bases_kv.is_empty() {
            return Err(anyhow!("compile.voltage_bases_kv cannot be empty"));
        }
        if !(self.regulation_range > 0.0 && self.regulation_range < 1.0) {
            return Err(anyhow!(
                "compile.regulation_range must be within (0, 1), got {}",
                self.regulation_range
            ));
        }
        Ok(())
    }
}

/// Thevenin equivalent of the upstream grid at the feeder head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub basekv: f64,
    pub pu: f64,
    pub angle: f64,
    pub r1: f64,
    pub x1: f64,
    pub r0: f64,
    pub x0: f64,
    /// Zero-sequence reactance for the vsource edit when it differs from the
    /// circuit definition. Falls back to `x0`.
    #[serde(default)]
    pub vsource_x0: Option<f64>,
}

impl SourceConfig {
    pub fn vsource_x0(&self) -> f64 {
        self.vsource_x0.unwrap_or(self.x0)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            basekv: 66.0,
            pu: 1.0,
            angle: 0.0,
            r1: 0.52824,
            x1: 2.113,
            r0: 0.59157,
            x0: 1.7747,
            vsource_x0: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_script_path")]
    pub script: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            script: default_script_path(),
            report_dir: default_report_dir(),
        }
    }
}
