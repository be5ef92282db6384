use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::{IngestError, Result};

/// Column names accepted for DDL: `[a-z][a-z0-9_]*`.
///
/// Identifiers cannot be bound as parameters, so anything reaching an
/// `ALTER TABLE` or a column list must pass this check first.
pub fn is_valid_column_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn quote_identifier(name: &str) -> Result<String> {
    if !is_valid_column_name(name) {
        return Err(IngestError::InvalidColumnName(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Current columns of `table`, read from a zero-row probe.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let stmt = conn.prepare(&format!("SELECT * FROM {} WHERE 0", quote_identifier(table)?))?;
    Ok(stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_ascii_lowercase())
        .collect())
}

/// Add a `TEXT` column. Returns `false` when the column already existed,
/// which happens when a peer connection added it first.
pub fn add_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} TEXT",
        quote_identifier(table)?,
        quote_identifier(column)?
    );

    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        Err(e) => {
            let error = IngestError::from(e);
            if error.is_duplicate_column() {
                Ok(false)
            } else {
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name_validation() {
        assert!(is_valid_column_name("aa1"));
        assert!(is_valid_column_name("call_sign"));
        assert!(!is_valid_column_name("AA1"));
        assert!(!is_valid_column_name("1aa"));
        assert!(!is_valid_column_name(""));
        assert!(!is_valid_column_name("aa1\"; DROP TABLE weather; --"));
    }

    #[test]
    fn test_add_column_tolerates_existing() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE weather (station TEXT)")?;

        assert!(add_column(&conn, "weather", "aa1")?);
        assert!(!add_column(&conn, "weather", "aa1")?);

        let columns = table_columns(&conn, "weather")?;
        assert!(columns.contains("aa1"));
        assert_eq!(columns.len(), 2);
        Ok(())
    }

    #[test]
    fn test_add_column_rejects_bad_name() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE weather (station TEXT)").unwrap();
        assert!(matches!(
            add_column(&conn, "weather", "bad name"),
            Err(IngestError::InvalidColumnName(_))
        ));
    }
}
