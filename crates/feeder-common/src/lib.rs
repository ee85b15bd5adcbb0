//! ---
//! feeder_section: "01-core-functionality"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Shared primitives and utilities for the compiler workspace."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! Shared primitives for the feeder compiler workspace.
//! This crate exposes configuration loading and tracing bootstrap
//! utilities consumed by the compiler library and the CLI.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CompileConfig, LoggingConfig, OutputConfig, SourceConfig};
pub use logging::{init_tracing, LogFormat};
