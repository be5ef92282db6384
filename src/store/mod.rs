//! SQLite storage: connection setup, bootstrap DDL, ledger and column access.

pub mod columns;
pub mod ledger;

pub use columns::{add_column, is_valid_column_name, quote_identifier, table_columns};
pub use ledger::DedupLedger;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::utils::constants::{LEDGER_TABLE, WEATHER_TABLE};

/// Open a connection configured for concurrent writers.
pub fn open(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    Ok(conn)
}

/// Create the ledger and destination tables if they do not exist yet.
///
/// Also switches the file to WAL so readers never block the writer.
pub fn bootstrap(conn: &Connection) -> Result<()> {
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {ledger} (
            url TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            rows_loaded INTEGER NOT NULL DEFAULT 0,
            recorded_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {weather} (
            station TEXT,
            name TEXT,
            call_sign TEXT,
            timepoint TEXT,
            temp_c INTEGER,
            temp_q TEXT,
            dew_c INTEGER,
            dew_q TEXT
        );",
        ledger = LEDGER_TABLE,
        weather = WEATHER_TABLE,
    ))?;

    Ok(())
}
