//! # Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem. Logs go to
//! stdout; colors are enabled only when stdout is a terminal.
//!
//! ## Environment variables
//!
//! - `WORKQUEUE_ENV` / `APP_ENV`: selects default verbosity (`production` logs
//!   at info, everything else at debug)
//! - `LOG_LEVEL`, then `RUST_LOG`: explicit filter, overrides the default
//! - `LOG_FORMAT=json`: one JSON object per event instead of plain text

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ConfigManager;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global console subscriber.
///
/// Safe to call more than once. If another subscriber is already installed
/// it is left in place.
///
/// ```rust
/// workqueue_core::logging::init_tracing();
/// tracing::info!("ready");
/// ```
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let use_json = wants_json(std::env::var("LOG_FORMAT").ok().as_deref());
        let use_ansi = !use_json && IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = if use_json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                ansi_colors = use_ansi,
                json = use_json,
                "Console logging initialized"
            );
        }
    });
}

fn get_environment() -> String {
    ConfigManager::detect_environment()
}

/// Get log level based on environment variables or environment defaults
fn get_log_level(environment: &str) -> String {
    resolve_log_level(
        environment,
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    )
}

fn resolve_log_level(
    environment: &str,
    log_level: Option<String>,
    rust_log: Option<String>,
) -> String {
    if let Some(level) = log_level.or(rust_log) {
        return level.to_lowercase();
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Log structured data for queue operations
pub fn log_queue_operation(
    operation: &str,
    queue_name: &str,
    iteration: Option<u64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        queue = %queue_name,
        iteration = iteration,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "QUEUE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(resolve_log_level("test", None, None), "debug");
        assert_eq!(resolve_log_level("development", None, None), "debug");
        assert_eq!(resolve_log_level("production", None, None), "info");
        assert_eq!(resolve_log_level("unknown", None, None), "debug");
    }

    #[test]
    fn test_log_level_overrides() {
        assert_eq!(
            resolve_log_level("production", Some("WARN".to_string()), None),
            "warn"
        );
        // LOG_LEVEL wins over RUST_LOG
        assert_eq!(
            resolve_log_level(
                "test",
                Some("error".to_string()),
                Some("trace".to_string())
            ),
            "error"
        );
        assert_eq!(
            resolve_log_level("test", None, Some("workqueue_core=TRACE".to_string())),
            "workqueue_core=trace"
        );
    }

    #[test]
    fn test_json_format_detection() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some("JSON")));
        assert!(!wants_json(Some("pretty")));
        assert!(!wants_json(None));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
        log_queue_operation("put", "batches", Some(3), "ok", None);
        log_error("queue", "get", "closed", Some("test"));
    }
}
