//! ---
//! feeder_section: "03-logging"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Structured logging adapters and sinks."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __feeder_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            feeder = ctx.feeder.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            record = ctx.record.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with compile context.
#[macro_export]
macro_rules! feeder_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with compile context.
#[macro_export]
macro_rules! feeder_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with compile context.
#[macro_export]
macro_rules! feeder_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with compile context.
#[macro_export]
macro_rules! feeder_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__feeder_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
