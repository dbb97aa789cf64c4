// ABOUTME: Per-table copy from the source SQLite file to the destination
// ABOUTME: Column selection, flag coercion, row-by-row inserts, and sequence reset

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;

use crate::config;
use crate::error::MigrateError;
use crate::migration::values::{self, SqlValue};
use crate::sqlite;
use crate::utils;

/// Indices of the source columns that go into the destination insert.
///
/// The auto-generated `id` column is skipped so the destination assigns
/// its own keys, except for tables whose ids are externally supplied.
pub fn insert_column_indices(table: &str, columns: &[String]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, col)| col.as_str() != "id" || config::uses_external_ids(table))
        .map(|(idx, _)| idx)
        .collect()
}

/// Build the parameterized insert statement for a table.
pub fn build_insert_sql(table: &str, insert_cols: &[&str]) -> String {
    let column_list = insert_cols
        .iter()
        .map(|col| format!("\"{}\"", col))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=insert_cols.len())
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table, column_list, placeholders
    )
}

/// Build the bind values for one row, in insert-column order, applying
/// the flag-column coercions.
pub fn bind_row(
    table: &str,
    columns: &[String],
    col_indices: &[usize],
    row: &[SqlValue],
) -> Vec<SqlValue> {
    col_indices
        .iter()
        .map(|&idx| values::transform_value(table, &columns[idx], row[idx].clone()))
        .collect()
}

/// Copy one table from source to destination.
///
/// Returns the number of rows inserted. A table missing from the source
/// or an empty table records zero rows and continues; a single failed
/// insert aborts the whole run with the offending row in the report.
pub async fn migrate_table(source: &Connection, dest: &Client, table: &str) -> Result<u64> {
    tracing::info!("Migrating table: {}", table);

    if !sqlite::table_exists(source, table)? {
        tracing::warn!("Table {} does not exist in the source database, skipping", table);
        return Ok(0);
    }

    let data = sqlite::read_table(source, table)?;
    if data.rows.is_empty() {
        tracing::info!("Table {} is empty", table);
        return Ok(0);
    }

    let col_indices = insert_column_indices(table, &data.columns);
    let insert_cols: Vec<&str> = col_indices
        .iter()
        .map(|&idx| data.columns[idx].as_str())
        .collect();
    for col in &insert_cols {
        utils::validate_identifier(col)?;
    }

    let stmt = dest
        .prepare(&build_insert_sql(table, &insert_cols))
        .await
        .with_context(|| format!("Failed to prepare insert for table '{}'", table))?;

    let progress = ProgressBar::new(data.rows.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );
    progress.set_message(table.to_string());

    // Rows are inserted one at a time, not batched, so a failure names
    // the exact row that caused it.
    let mut migrated = 0u64;
    for row in &data.rows {
        let bound = bind_row(table, &data.columns, &col_indices, row);
        let params: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        if let Err(e) = dest.execute(&stmt, &params).await {
            let rendered = values::format_row(&data.columns, row);
            tracing::error!("Error inserting row into {}: {}", table, e);
            tracing::error!("Row data: {}", rendered);
            progress.abandon();
            return Err(MigrateError::RowInsertion {
                table: table.to_string(),
                message: e.to_string(),
                row: rendered,
            }
            .into());
        }

        migrated += 1;
        progress.inc(1);
    }
    progress.finish_and_clear();

    tracing::info!("Migrated {} rows to {}", migrated, table);

    if !config::uses_external_ids(table) {
        reset_sequence(dest, table).await;
    }

    Ok(migrated)
}

/// Point the table's id sequence past the migrated rows so later
/// application-level inserts continue from the right value. A missing
/// sequence or empty table is informational only, never fatal.
async fn reset_sequence(dest: &Client, table: &str) {
    let sql = format!(
        "SELECT setval('{}_id_seq', (SELECT MAX(id) FROM \"{}\"), true)",
        table, table
    );
    match dest.execute(&sql, &[]).await {
        Ok(_) => tracing::info!("Reset sequence for {}", table),
        Err(e) => tracing::info!(
            "Could not reset sequence for {} (this is OK if the table is empty): {}",
            table,
            e
        ),
    }
}
