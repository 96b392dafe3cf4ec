//! Logging initialization.
//!
//! Everything goes to stderr; stdout carries the analysis report.

use iris_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Resolved logging settings after CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl LogSettings {
    /// `--verbose` forces debug; `--json-logs` forces JSON. Otherwise the config wins.
    pub fn resolve(config: &LoggingConfig, verbose: bool, json_logs: bool) -> Self {
        let level = if verbose {
            "debug".to_string()
        } else {
            match config.level.to_lowercase().as_str() {
                level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
                _ => "info".to_string(),
            }
        };
        Self {
            level,
            json: json_logs || config.format.eq_ignore_ascii_case("json"),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the resolved level.
pub fn init(settings: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

pub fn init_from_config(config: &iris_core::Config, verbose: bool, json_logs: bool) {
    init(&LogSettings::resolve(&config.logging, verbose, json_logs));
}
