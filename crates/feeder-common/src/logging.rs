//! ---
//! feeder_section: "01-core-functionality"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Shared primitives and utilities for the compiler workspace."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "FEEDER_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static STDERR_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Where the active filter directive came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSource {
    FeederLog,
    RustLog,
    Config,
}

/// Pick the filter directive: `FEEDER_LOG`, then `RUST_LOG`, then the
/// configured level. Blank variables count as unset.
pub fn select_directive(
    feeder_log: Option<&str>,
    rust_log: Option<&str>,
    configured: &str,
) -> (String, FilterSource) {
    let present = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned);
    if let Some(directive) = present(feeder_log) {
        (directive, FilterSource::FeederLog)
    } else if let Some(directive) = present(rust_log) {
        (directive, FilterSource::RustLog)
    } else {
        (configured.trim().to_owned(), FilterSource::Config)
    }
}

fn build_filter(config: &LoggingConfig) -> (EnvFilter, FilterSource) {
    let feeder_log = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (directive, source) = select_directive(feeder_log.as_deref(), rust_log.as_deref(), &config.level);
    match EnvFilter::try_new(&directive) {
        Ok(filter) => (filter, source),
        Err(err) => {
            eprintln!("ignoring log filter '{}' ({}); using '{}'", directive, err, config.level);
            (
                EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info")),
                FilterSource::Config,
            )
        }
    }
}

/// Log file name for a service: `<prefix>-<service>.log`, prefix defaulting
/// to the service itself.
pub fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    format!("{}-{}.log", prefix, service_name)
}

/// Install the global subscriber: console events on stderr (so a script
/// printed on stdout stays clean) plus a daily rolling JSON file.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;

    let file_appender = daily(&config.directory, log_file_name(service_name, config));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDERR_GUARD.set(stderr_guard);

    let (filter, filter_source) = build_filter(config);

    let console_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stderr_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stderr_writer)
            .boxed(),
    };

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        filter = ?filter_source,
        "tracing initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn feeder_log_beats_rust_log_and_config() {
        assert_eq!(
            select_directive(Some("feeder_compiler=debug"), Some("warn"), "info"),
            ("feeder_compiler=debug".to_owned(), FilterSource::FeederLog)
        );
        assert_eq!(
            select_directive(Some("  "), Some("warn"), "info"),
            ("warn".to_owned(), FilterSource::RustLog)
        );
        assert_eq!(
            select_directive(None, None, " error "),
            ("error".to_owned(), FilterSource::Config)
        );
    }

    #[test]
    fn file_name_uses_prefix_when_given() {
        let mut config = LoggingConfig::default();
        assert_eq!(log_file_name("feederctl", &config), "feederctl-feederctl.log");
        config.file_prefix = Some("rural".into());
        assert_eq!(log_file_name("feederctl", &config), "rural-feederctl.log");
    }

    #[test]
    fn init_creates_log_directory() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            format: LogFormat::Pretty,
            file_prefix: Some("unit".into()),
            level: "debug".into(),
        };
        init_tracing("feeder-test", &config).unwrap();
        assert!(config.directory.is_dir());
    }
}
