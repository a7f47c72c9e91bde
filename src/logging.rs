//! Tracing subscriber setup for the CLI

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Number of `-v` flags
    pub verbosity: u8,
    pub json: bool,
    /// Configured filter, used when no `-v` and no `RUST_LOG` are given
    pub level: Option<String>,
}

/// Filter directive for a verbosity count
pub fn filter_directive(verbosity: u8, level: Option<&str>) -> String {
    match verbosity {
        0 => level.unwrap_or("info").to_string(),
        1 => "debug".to_string(),
        2 => "trace".to_string(),
        // -vvv includes the HTTP stack
        _ => "trace,hyper=debug,tower=debug,reqwest=debug".to_string(),
    }
}

pub fn init_logging(options: &LogOptions) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if options.verbosity == 0 => filter,
        _ => EnvFilter::try_new(filter_directive(options.verbosity, options.level.as_deref()))
            .map_err(|e| anyhow!("Invalid log filter: {}", e))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(options.verbosity >= 2)
        .with_thread_ids(options.verbosity >= 3)
        .with_line_number(options.verbosity >= 3);

    let result = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
