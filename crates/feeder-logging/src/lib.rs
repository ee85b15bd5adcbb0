//! ---
//! feeder_section: "03-logging"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Structured logging adapters and sinks."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the compiler and the CLI.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber writing human-readable lines to stderr.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Feeder (network) identifier being compiled.
    pub feeder: Option<&'a str>,
    /// Compile stage emitting the event.
    pub stage: Option<&'a str>,
    /// Source record index within the stage's table.
    pub record: Option<usize>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a feeder identifier.
    pub fn with_feeder(mut self, feeder: &'a str) -> Self {
        self.feeder = Some(feeder);
        self
    }

    /// Attach a stage name.
    pub fn with_stage(mut self, stage: &'a str) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attach a record index.
    pub fn with_record(mut self, record: usize) -> Self {
        self.record = Some(record);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event = %event,
            outcome = outcome.as_str(),
            feeder = ctx.feeder.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event = %event,
            outcome = outcome.as_str(),
            feeder = ctx.feeder.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_feeder("rural-1")
            .with_stage("lv_loads")
            .with_record(3);
        feeder_info!(context = ctx, "load bound");
        feeder_debug!("debug message");
        feeder_warn!(context = ctx, "record skipped: {}", "bad phase");
        feeder_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn context_builder_sets_fields() {
        let ctx = LogContext::new().with_stage("lines").with_record(9);
        assert_eq!(ctx.stage, Some("lines"));
        assert_eq!(ctx.record, Some(9));
        assert!(ctx.feeder.is_none());
    }

    #[test]
    fn system_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_feeder("urban-2");
        log_system_event(
            Some(&ctx),
            "compile.finished",
            "compile finished",
            SystemEventOutcome::Success,
        );
        log_system_event(
            None,
            "compile.aborted",
            "compile aborted",
            SystemEventOutcome::Fault,
        );
    }
}
