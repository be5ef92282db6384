use std::collections::{BTreeSet, HashSet};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{add_column, table_columns};
use crate::utils::constants::OPTIONAL_ELEMENT_CODES;

/// Keeps the destination table's columns a superset of what files declare.
///
/// Each worker holds its own registry. The cached column set may lag behind
/// columns added by peers; that only costs a redundant `ALTER`, which
/// [`add_column`] reports as "already existed".
pub struct SchemaRegistry {
    table: String,
    known: HashSet<String>,
}

impl SchemaRegistry {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            known: HashSet::new(),
        }
    }

    /// Columns a file with this header needs: its own header columns plus
    /// the pre-allocated optional element codes.
    pub fn required_columns(header_columns: &[String]) -> BTreeSet<String> {
        header_columns
            .iter()
            .cloned()
            .chain(OPTIONAL_ELEMENT_CODES.iter().map(|c| c.to_string()))
            .collect()
    }

    pub fn known_columns(&self) -> &HashSet<String> {
        &self.known
    }

    /// Re-read the table's column set from the database.
    pub fn refresh(&mut self, conn: &Connection) -> Result<()> {
        self.known = table_columns(conn, &self.table)?;
        Ok(())
    }

    /// Add every required column the table lacks. Returns the columns this
    /// call actually created.
    pub fn ensure_columns(
        &mut self,
        conn: &Connection,
        header_columns: &[String],
    ) -> Result<Vec<String>> {
        let required = Self::required_columns(header_columns);

        if required.iter().all(|c| self.known.contains(c)) {
            return Ok(Vec::new());
        }

        self.refresh(conn)?;

        let mut added = Vec::new();
        for column in required {
            if self.known.contains(&column) {
                continue;
            }

            if add_column(conn, &self.table, &column)? {
                info!(table = %self.table, %column, "Added column");
                added.push(column.clone());
            } else {
                debug!(table = %self.table, %column, "Column added concurrently");
            }
            self.known.insert(column);
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bootstrap;
    use crate::utils::constants::WEATHER_TABLE;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_required_columns_include_superset() {
        let required = SchemaRegistry::required_columns(&columns(&["station", "aa1", "ab1"]));
        assert!(required.contains("aa1"));
        assert!(required.contains("wa1"));
        assert_eq!(required.len(), OPTIONAL_ELEMENT_CODES.len() + 2);
    }

    #[test]
    fn test_ensure_columns_adds_once() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        bootstrap(&conn)?;

        let mut registry = SchemaRegistry::new(WEATHER_TABLE);
        let header = columns(&["station", "date", "aa1"]);

        let added = registry.ensure_columns(&conn, &header)?;
        assert!(added.contains(&"aa1".to_string()));
        assert!(added.contains(&"date".to_string()));
        assert!(!added.contains(&"station".to_string()));

        assert!(registry.ensure_columns(&conn, &header)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_stale_registries_tolerate_each_other() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("weather.sqlite");
        let first = Connection::open(&path)?;
        let second = Connection::open(&path)?;
        bootstrap(&first)?;

        let mut a = SchemaRegistry::new(WEATHER_TABLE);
        let mut b = SchemaRegistry::new(WEATHER_TABLE);
        a.refresh(&first)?;
        b.refresh(&second)?;

        let header = columns(&["station", "date", "gd1"]);
        assert!(!a.ensure_columns(&first, &header)?.is_empty());
        // b still believes gd1 is missing; the refresh inside ensure_columns
        // catches it without an error
        assert!(b.ensure_columns(&second, &header)?.is_empty());
        assert!(b.known_columns().contains("gd1"));
        Ok(())
    }
}
