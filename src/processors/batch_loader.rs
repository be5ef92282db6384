use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::models::ObservationRow;
use crate::store::quote_identifier;
use crate::utils::constants::MAX_BIND_PARAMETERS;

/// Buffers normalized rows and writes them as multi-row inserts.
///
/// Each flush is a single statement, so a failing batch leaves none of its
/// rows behind. Failed batches are reported, not retried.
pub struct BatchLoader<'conn> {
    conn: &'conn Connection,
    table: String,
    columns: Vec<String>,
    batch_size: usize,
    buffer: Vec<ObservationRow>,
    rows_loaded: u64,
    batches_loaded: u64,
}

impl<'conn> BatchLoader<'conn> {
    pub fn new(
        conn: &'conn Connection,
        table: &str,
        columns: Vec<String>,
        batch_size: usize,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(IngestError::Config("Batch loader needs at least one column".to_string()));
        }
        for column in &columns {
            quote_identifier(column)?;
        }

        // Stay under SQLite's bind parameter limit for very wide files
        let batch_size = batch_size.clamp(1, (MAX_BIND_PARAMETERS / columns.len()).max(1));

        Ok(Self {
            conn,
            table: table.to_string(),
            columns,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            rows_loaded: 0,
            batches_loaded: 0,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn rows_loaded(&self) -> u64 {
        self.rows_loaded
    }

    pub fn batches_loaded(&self) -> u64 {
        self.batches_loaded
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Queue a row, flushing when the batch is full.
    pub fn push(&mut self, row: ObservationRow) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Insert everything buffered as one statement. Returns the rows written.
    ///
    /// The buffer is cleared whether or not the insert succeeds.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let rows = std::mem::take(&mut self.buffer);
        let sql = insert_statement(&self.table, &self.columns, rows.len())?;
        let values = rows.iter().flat_map(|row| {
            let values = row.to_values();
            debug_assert_eq!(values.len(), self.columns.len());
            values
        });

        let written = {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(values))?
        };

        self.rows_loaded += written as u64;
        self.batches_loaded += 1;
        debug!(table = %self.table, rows = written, "Batch loaded");
        Ok(written)
    }

    /// Flush the final partial batch at end of file.
    pub fn finish(&mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.rows_loaded)
    }

    /// Drop buffered rows without writing them. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

/// `INSERT INTO "t" ("a", "b") VALUES (?, ?), (?, ?)` for `rows` rows.
pub fn insert_statement(table: &str, columns: &[String], rows: usize) -> Result<String> {
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders.as_str(); rows].join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table)?,
        column_list,
        values
    ))
}
