use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{LedgerEntry, LedgerStatus, LedgerSummary, SourceIdentifier};
use crate::utils::constants::LEDGER_TABLE;

/// Persistent set of identifiers already taken by some worker.
///
/// The in-memory snapshot is taken once per worker; identifiers claimed by
/// peers afterwards are caught by the point lookup in [`DedupLedger::contains`]
/// and, for true races, by the primary key behind [`DedupLedger::reserve`].
pub struct DedupLedger {
    snapshot: HashSet<String>,
}

impl DedupLedger {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(&format!("SELECT url FROM {}", LEDGER_TABLE))?;
        let snapshot = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;

        Ok(Self { snapshot })
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    /// Snapshot first, then the persistent ledger.
    pub fn contains(&self, conn: &Connection, identifier: &SourceIdentifier) -> Result<bool> {
        if self.snapshot.contains(identifier.as_str()) {
            return Ok(true);
        }

        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE url = ?1", LEDGER_TABLE),
                params![identifier.as_str()],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Claim `identifier` as `in_progress`. `false` means another worker got
    /// there first and this one must skip it.
    pub fn reserve(&mut self, conn: &Connection, identifier: &SourceIdentifier) -> Result<bool> {
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (url, status, rows_loaded, recorded_at) VALUES (?1, ?2, 0, ?3)",
                LEDGER_TABLE
            ),
            params![
                identifier.as_str(),
                LedgerStatus::InProgress.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;

        self.snapshot.insert(identifier.as_str().to_string());
        Ok(inserted == 1)
    }

    /// Record the final status. Meant to run inside the transaction that
    /// carries the file's rows.
    pub fn finalize(
        conn: &Connection,
        identifier: &SourceIdentifier,
        status: LedgerStatus,
        rows_loaded: u64,
    ) -> Result<()> {
        conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, rows_loaded = ?2, recorded_at = ?3 WHERE url = ?4",
                LEDGER_TABLE
            ),
            params![
                status.as_str(),
                rows_loaded as i64,
                Utc::now().to_rfc3339(),
                identifier.as_str()
            ],
        )?;
        Ok(())
    }

    /// Drop a reservation so a later run picks the identifier up again.
    pub fn release(&mut self, conn: &Connection, identifier: &SourceIdentifier) -> Result<()> {
        conn.execute(
            &format!("DELETE FROM {} WHERE url = ?1 AND status = ?2", LEDGER_TABLE),
            params![identifier.as_str(), LedgerStatus::InProgress.as_str()],
        )?;
        self.snapshot.remove(identifier.as_str());
        Ok(())
    }

    /// Delete reservations left behind by an interrupted run.
    ///
    /// Only safe before any worker of the current run has started, and only
    /// while a single ingestion process uses the database: a concurrent
    /// process would lose its live reservations and load those files twice.
    pub fn reclaim_stale(conn: &Connection) -> Result<usize> {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE status = ?1", LEDGER_TABLE),
            params![LedgerStatus::InProgress.as_str()],
        )?;
        Ok(removed)
    }

    pub fn summary(conn: &Connection) -> Result<LedgerSummary> {
        let mut stmt = conn.prepare(&format!(
            "SELECT status, COUNT(*), COALESCE(SUM(rows_loaded), 0) FROM {} GROUP BY status",
            LEDGER_TABLE
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = LedgerSummary::default();
        for (status, count, rows_loaded) in rows {
            summary.add(status.parse()?, count as u64);
            summary.rows_loaded += rows_loaded as u64;
        }
        Ok(summary)
    }

    /// Entries that were not loaded in full, oldest first.
    pub fn incomplete(conn: &Connection) -> Result<Vec<LedgerEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT url, status, rows_loaded, recorded_at FROM {} WHERE status != ?1 ORDER BY recorded_at",
            LEDGER_TABLE
        ))?;
        let rows = stmt
            .query_map(params![LedgerStatus::Complete.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(url, status, rows_loaded, recorded_at)| {
                Ok(LedgerEntry {
                    url,
                    status: status.parse()?,
                    rows_loaded: rows_loaded as u64,
                    recorded_at,
                })
            })
            .collect()
    }

    pub fn status_of(conn: &Connection, identifier: &SourceIdentifier) -> Result<Option<LedgerStatus>> {
        let status = conn
            .query_row(
                &format!("SELECT status FROM {} WHERE url = ?1", LEDGER_TABLE),
                params![identifier.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        status.map(|s| s.parse()).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bootstrap;

    fn ledger_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn
    }

    #[test]
    fn test_reserve_only_once() -> Result<()> {
        let conn = ledger_db();
        let id = SourceIdentifier::new("https://example.org/2020/a.csv");

        let mut first = DedupLedger::load(&conn)?;
        let mut second = DedupLedger::load(&conn)?;

        assert!(!first.contains(&conn, &id)?);
        assert!(first.reserve(&conn, &id)?);
        // A peer with an older snapshot still sees it through the point lookup
        assert!(second.contains(&conn, &id)?);
        assert!(!second.reserve(&conn, &id)?);
        Ok(())
    }

    #[test]
    fn test_finalize_and_summary() -> Result<()> {
        let conn = ledger_db();
        let mut ledger = DedupLedger::load(&conn)?;
        let a = SourceIdentifier::new("a");
        let b = SourceIdentifier::new("b");

        ledger.reserve(&conn, &a)?;
        ledger.reserve(&conn, &b)?;
        DedupLedger::finalize(&conn, &a, LedgerStatus::Complete, 120)?;
        DedupLedger::finalize(&conn, &b, LedgerStatus::Partial, 100)?;

        let summary = DedupLedger::summary(&conn)?;
        assert_eq!(summary.complete, 1);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.rows_loaded, 220);

        let incomplete = DedupLedger::incomplete(&conn)?;
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].url, "b");
        assert_eq!(incomplete[0].status, LedgerStatus::Partial);
        Ok(())
    }

    #[test]
    fn test_release_and_reclaim() -> Result<()> {
        let conn = ledger_db();
        let mut ledger = DedupLedger::load(&conn)?;
        let a = SourceIdentifier::new("a");
        let b = SourceIdentifier::new("b");
        let c = SourceIdentifier::new("c");

        ledger.reserve(&conn, &a)?;
        ledger.release(&conn, &a)?;
        assert!(!ledger.contains(&conn, &a)?);

        ledger.reserve(&conn, &b)?;
        ledger.reserve(&conn, &c)?;
        DedupLedger::finalize(&conn, &c, LedgerStatus::Complete, 1)?;

        assert_eq!(DedupLedger::reclaim_stale(&conn)?, 1);
        assert_eq!(DedupLedger::status_of(&conn, &b)?, None);
        assert_eq!(
            DedupLedger::status_of(&conn, &c)?,
            Some(LedgerStatus::Complete)
        );
        Ok(())
    }
}
