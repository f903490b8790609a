//! Logging Module
//!
//! Structured logging with file output for diagnostics.

use tracing_subscriber::{fmt, EnvFilter, prelude::*};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "glucotray.log";

/// Initialize logging with console and file output
pub fn init() {
    let log_dir = log_directory();

    // Ensure log directory exists
    let _ = std::fs::create_dir_all(&log_dir);

    // Create rolling file appender (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    // Create file layer
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_appender);

    // Create console layer (debug builds only)
    #[cfg(debug_assertions)]
    let console_layer = Some(fmt::layer().with_target(true).pretty());

    #[cfg(not(debug_assertions))]
    let console_layer: Option<fmt::Layer<_>> = None;

    // Set up filter, RUST_LOG wins over the defaults
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cfg!(debug_assertions))));

    // Build subscriber
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    // Set global subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Default filter: app crates at the build's level, HTTP stack quiet
fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("{level},glucotray={level},glucotray_lib={level},glucotray_core={level},hyper=warn,hyper_util=warn,reqwest=warn")
}

fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Glucotray")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        for debug in [true, false] {
            let directives = default_directives(debug);
            assert!(directives.contains("glucotray_core="));
            assert!(EnvFilter::try_new(&directives).is_ok());
        }
    }
}
