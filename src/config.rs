//! Runtime settings.
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! `WEATHER_INGEST_*` environment variables. Command-line overrides are
//! applied by the caller before [`Settings::validate`] runs.

use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::utils::constants::{
    CONFIG_FILE, DEFAULT_BATCH_SIZE, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CATALOG_URL,
    DEFAULT_DATABASE_PATH, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PROGRESS_INTERVAL_SECS,
    DEFAULT_YEARS_BACK, ENV_PREFIX,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    /// SQLite database file holding the ledger and the weather table
    #[validate(length(min = 1))]
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Base URL of the per-year directory listings
    #[validate(url)]
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Worker pool size
    #[validate(range(min = 1))]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Rows per multi-row insert
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How many years before the current one the catalog window reaches
    #[validate(range(min = 0, max = 100))]
    #[serde(default = "default_years_back")]
    pub years_back: i32,

    #[validate(range(min = 1))]
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[validate(range(min = 1))]
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_years_back() -> i32 {
    DEFAULT_YEARS_BACK
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_progress_interval_secs() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            catalog_url: default_catalog_url(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            years_back: default_years_back(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            busy_timeout_ms: default_busy_timeout_ms(),
            progress_interval_secs: default_progress_interval_secs(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// Without an explicit path `weather-ingest.toml` in the working
    /// directory is used if it exists.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file_source = match config_file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file_source)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Inclusive catalog year window ending at the current year.
    pub fn year_window(&self) -> std::ops::RangeInclusive<i32> {
        let current = Local::now().year();
        (current - self.years_back)..=current
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.batch_size, 100);
        assert!(settings.workers >= 1);
    }

    #[test]
    fn test_year_window_spans_eleven_years() {
        let settings = Settings::default();
        let window = settings.year_window();
        assert_eq!(window.end() - window.start(), 10);
        assert_eq!(*window.end(), Local::now().year());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let settings = Settings {
            batch_size: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            workers: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            catalog_url: "not a url".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_reads_explicit_file() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("ingest.toml");
        std::fs::write(&path, "batch_size = 25\nyears_back = 2\n")?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.years_back, 2);
        assert_eq!(settings.catalog_url, DEFAULT_CATALOG_URL);
        Ok(())
    }
}
