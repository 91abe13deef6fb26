//! Logging utilities for the decision tools.
//!
//! Logs are written to stderr so that tool output on stdout stays valid JSON.
//! The base level comes from configuration unless `RUST_LOG` is set.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Build the filter directives for a base level plus targets held at `warn`.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);
    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}

/// Build the EnvFilter, preferring `RUST_LOG` when it is set.
fn build_filter(log_level: &str, excluded_targets: &[String]) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(build_directives(log_level, excluded_targets))
}

/// Initialize logging with the given configuration.
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for human-readable
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Initialize logging, holding the given module targets at `warn`.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let filter = build_filter(log_level, excluded_targets);
    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(
        log_level = %log_level,
        log_format = %log_format,
        excluded = excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new run ID for correlating one tool invocation.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_directives() {
        assert_eq!(build_directives("info", &[]), "info");
        assert_eq!(
            build_directives("debug", &["short_decision::data".to_string()]),
            "debug,short_decision::data=warn"
        );
    }

    #[test]
    fn test_generate_run_id_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("info", "pretty");
        init_logging("debug", "json");
    }
}
