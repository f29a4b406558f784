//! Telemetry setup for GeminiBuddy
//!
//! Structured logging via `tracing`, written to stderr so stdout carries
//! only the model's answer.

use crate::cli::Verbosity;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` wins, otherwise the verbosity level
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)))
}

/// Dependencies stay at warn unless `RUST_LOG` asks for more
fn default_directives(verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Quiet => "error".to_string(),
        _ => format!("warn,geminibuddy={}", verbosity.log_level()),
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init_tracing(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_directives(Verbosity::Quiet), "error");
        assert_eq!(default_directives(Verbosity::Normal), "warn,geminibuddy=warn");
        assert_eq!(default_directives(Verbosity::VeryVerbose), "warn,geminibuddy=debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(Verbosity::Normal);
        init_tracing(Verbosity::Verbose);
    }
}
