#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;
use weather_ingest::config::Settings;
use weather_ingest::models::SourceIdentifier;
use weather_ingest::readers::{PayloadFetcher, SourceCatalog};
use weather_ingest::{IngestError, Result};

pub const YEAR: i32 = 2020;

/// Catalog that lists the same fixed identifiers for every year it knows.
pub struct FixtureCatalog {
    years: HashMap<i32, Vec<SourceIdentifier>>,
}

impl FixtureCatalog {
    pub fn single_year(identifiers: &[&str]) -> Self {
        let mut years = HashMap::new();
        years.insert(
            YEAR,
            identifiers.iter().map(|id| SourceIdentifier::new(*id)).collect(),
        );
        Self { years }
    }
}

impl SourceCatalog for FixtureCatalog {
    fn list(&self, year: i32) -> Result<Vec<SourceIdentifier>> {
        self.years
            .get(&year)
            .cloned()
            .ok_or(IngestError::CatalogStatus { year, status: 404 })
    }
}

/// In-memory payloads keyed by identifier, counting every fetch.
#[derive(Clone, Default)]
pub struct FixtureFetcher {
    payloads: Arc<HashMap<String, Vec<u8>>>,
    fetches: Arc<AtomicUsize>,
}

impl FixtureFetcher {
    pub fn new(payloads: &[(&str, &[u8])]) -> Self {
        Self {
            payloads: Arc::new(
                payloads
                    .iter()
                    .map(|(id, bytes)| (id.to_string(), bytes.to_vec()))
                    .collect(),
            ),
            fetches: Arc::default(),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PayloadFetcher for FixtureFetcher {
    fn fetch(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| IngestError::FetchStatus {
                identifier: identifier.to_string(),
                status: 503,
            })
    }
}

pub fn settings(dir: &TempDir, workers: usize) -> Settings {
    Settings {
        database_path: dir
            .path()
            .join("weather.sqlite")
            .to_string_lossy()
            .into_owned(),
        workers,
        progress_interval_secs: 1,
        ..Settings::default()
    }
}

pub fn connect(settings: &Settings) -> Connection {
    Connection::open(Path::new(&settings.database_path)).unwrap()
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

/// `n` well-formed rows for one station.
pub fn station_csv(station: &str, n: usize) -> String {
    let mut csv = String::from("\"STATION\",\"DATE\",\"NAME\",\"TMP\",\"DEW\"\n");
    for hour in 0..n {
        csv.push_str(&format!(
            "\"{}\",\"2020-01-01T{:02}:51:00\",\"TEST STATION, US\",\"+{:04},1\",\"-0010,1\"\n",
            station,
            hour % 24,
            hour
        ));
    }
    csv
}
