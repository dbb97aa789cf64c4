// ABOUTME: Source store access for the local SQLite database file
// ABOUTME: Read-only opening, table existence checks, and full-table reads

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::error::MigrateError;
use crate::migration::values::SqlValue;
use crate::utils;

/// All rows of one source table, in natural storage order.
#[derive(Debug, Clone)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Open the source database file read-only.
///
/// The file is never created here. SQLite defers reading the file header,
/// so a `sqlite_master` probe forces validation and rejects files that
/// are unreadable or not databases at open time.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| {
        MigrateError::Connection(format!(
            "Cannot open SQLite database at {}: {}",
            path.display(),
            e
        ))
    })?;

    conn.query_row("SELECT count(*) FROM sqlite_master", (), |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| {
        MigrateError::Connection(format!(
            "{} is not a valid SQLite database: {}",
            path.display(),
            e
        ))
    })?;

    Ok(conn)
}

/// Check whether a table exists in the source database.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to check existence of table '{}'", table))?;
    Ok(count > 0)
}

/// Read every row of a table, unfiltered, in natural storage order.
pub fn read_table(conn: &Connection, table: &str) -> Result<TableData> {
    utils::validate_identifier(table)?;

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM \"{}\"", table))
        .with_context(|| format!("Failed to read table '{}'", table))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt
        .query(())
        .with_context(|| format!("Failed to read table '{}'", table))?;

    let mut data = Vec::new();
    while let Some(row) = rows
        .next()
        .with_context(|| format!("Failed to read row from table '{}'", table))?
    {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(SqlValue::from(row.get_ref(idx)?));
        }
        data.push(values);
    }

    Ok(TableData {
        columns,
        rows: data,
    })
}

/// Row count for one table.
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    utils::validate_identifier(table)?;
    conn.query_row(&format!("SELECT count(*) FROM \"{}\"", table), (), |row| {
        row.get(0)
    })
    .with_context(|| format!("Failed to count rows in table '{}'", table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_db(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("grocery.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                stock INTEGER NOT NULL
             );
             INSERT INTO items (name, price, stock) VALUES ('milk', 1.99, 40);
             INSERT INTO items (name, price, stock) VALUES ('bread', 2.49, 12);
             CREATE TABLE empty_table (id INTEGER PRIMARY KEY, note TEXT);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = open(&dir.path().join("no-such.db"));
        assert!(result.is_err());
        // The file must not be created by the failed open
        assert!(!dir.path().join("no-such.db").exists());
    }

    #[test]
    fn test_open_rejects_non_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.db");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not a database, it is a text file padded well past the header")
            .unwrap();

        assert!(open(&path).is_err());
    }

    #[test]
    fn test_table_exists() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&fixture_db(&dir)).unwrap();

        assert!(table_exists(&conn, "items").unwrap());
        assert!(!table_exists(&conn, "salesorder").unwrap());
    }

    #[test]
    fn test_read_table_returns_columns_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&fixture_db(&dir)).unwrap();

        let data = read_table(&conn, "items").unwrap();
        assert_eq!(data.columns, vec!["id", "name", "price", "stock"]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(
            data.rows[0],
            vec![
                SqlValue::Integer(1),
                SqlValue::Text("milk".to_string()),
                SqlValue::Real(1.99),
                SqlValue::Integer(40),
            ]
        );
        assert_eq!(data.rows[1][1], SqlValue::Text("bread".to_string()));
    }

    #[test]
    fn test_read_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&fixture_db(&dir)).unwrap();

        let data = read_table(&conn, "empty_table").unwrap();
        assert_eq!(data.columns, vec!["id", "note"]);
        assert!(data.rows.is_empty());
    }

    #[test]
    fn test_count_rows() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&fixture_db(&dir)).unwrap();

        assert_eq!(count_rows(&conn, "items").unwrap(), 2);
        assert_eq!(count_rows(&conn, "empty_table").unwrap(), 0);
        assert!(count_rows(&conn, "missing").is_err());
    }

    #[test]
    fn test_read_table_rejects_hostile_name() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&fixture_db(&dir)).unwrap();

        assert!(read_table(&conn, "items; DROP TABLE items").is_err());
    }
}
