// ABOUTME: Typed error taxonomy for fatal migration failures
// ABOUTME: Distinguishes configuration, connection, schema, and row insertion errors

use thiserror::Error;

/// Fatal error classes for a migration run.
///
/// Every variant here aborts the run. Sequence-reset failures and
/// verification mismatches are logged warnings, not errors, and never
/// appear in this enum.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Required configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Either store unreachable, or the destination failed its liveness check
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema script invalid, conflicting objects, or table order violating foreign keys
    #[error("Schema error: {0}")]
    Schema(String),

    /// A single row failed to insert; the offending row is surfaced in the report
    #[error("Failed to insert row into {table}: {message}\n  Row: {row}")]
    RowInsertion {
        table: String,
        message: String,
        row: String,
    },
}
