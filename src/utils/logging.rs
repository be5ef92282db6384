//! Tracing setup for the ingestion binary.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `filter`; `verbose` raises the configured filter to
/// `debug`. With a log file the output is plain text without ANSI colours.
pub fn init_tracing(filter: &str, verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose { "debug" } else { filter };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_names(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .init();
        }
    }

    tracing::debug!("Tracing initialized with filter: {}", filter);
    Ok(())
}
