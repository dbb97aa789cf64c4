// ABOUTME: Advisory row-count verification between source and destination
// ABOUTME: Compares per-table counts; mismatches warn but never fail the run

use anyhow::Result;
use rusqlite::Connection;
use tokio_postgres::Client;

use crate::config::TABLE_ORDER;
use crate::sqlite;
use crate::utils;

/// Outcome of verifying one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Source and destination counts agree.
    Match { table: String, rows: i64 },
    /// Counts disagree; the migration is suspect but the run continues.
    Mismatch {
        table: String,
        source: i64,
        destination: i64,
    },
    /// A count query failed on either side (e.g. the table does not
    /// exist in the destination).
    Unverifiable { table: String, reason: String },
}

impl VerificationOutcome {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, VerificationOutcome::Mismatch { .. })
    }
}

/// Number of mismatched tables in a set of outcomes.
pub fn mismatch_count(outcomes: &[VerificationOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_mismatch()).count()
}

async fn destination_count(dest: &Client, table: &str) -> Result<i64> {
    utils::validate_identifier(table)?;
    let row = dest
        .query_one(&format!("SELECT count(*) FROM \"{}\"", table), &[])
        .await?;
    Ok(row.get(0))
}

/// Compare one table's row count between source and destination.
/// Errors on either side become an `Unverifiable` outcome, not a failure.
pub async fn verify_table(source: &Connection, dest: &Client, table: &str) -> VerificationOutcome {
    let source_count = sqlite::count_rows(source, table);
    let dest_count = destination_count(dest, table).await;

    match (source_count, dest_count) {
        (Ok(s), Ok(d)) if s == d => VerificationOutcome::Match {
            table: table.to_string(),
            rows: s,
        },
        (Ok(s), Ok(d)) => VerificationOutcome::Mismatch {
            table: table.to_string(),
            source: s,
            destination: d,
        },
        (Err(e), _) | (_, Err(e)) => VerificationOutcome::Unverifiable {
            table: table.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Verify every table in migration order.
///
/// Verification is advisory, not a gate: it never fails the run, and
/// the outcomes only affect the printed report.
pub async fn verify_all(source: &Connection, dest: &Client) -> Vec<VerificationOutcome> {
    tracing::info!("Verifying migration...");

    let mut outcomes = Vec::with_capacity(TABLE_ORDER.len());
    for table in TABLE_ORDER {
        let outcome = verify_table(source, dest, table).await;
        match &outcome {
            VerificationOutcome::Match { table, rows } => {
                tracing::info!("✓ {}: SQLite={}, PostgreSQL={}", table, rows, rows);
            }
            VerificationOutcome::Mismatch {
                table,
                source,
                destination,
            } => {
                tracing::warn!(
                    "⚠ {}: row count mismatch: SQLite={}, PostgreSQL={}",
                    table,
                    source,
                    destination
                );
            }
            VerificationOutcome::Unverifiable { table, reason } => {
                tracing::warn!("⚠ {}: could not verify ({})", table, reason);
            }
        }
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mismatch() {
        let matched = VerificationOutcome::Match {
            table: "items".to_string(),
            rows: 12,
        };
        let mismatched = VerificationOutcome::Mismatch {
            table: "sales".to_string(),
            source: 40,
            destination: 39,
        };
        let unverifiable = VerificationOutcome::Unverifiable {
            table: "salesorder".to_string(),
            reason: "relation does not exist".to_string(),
        };

        assert!(!matched.is_mismatch());
        assert!(mismatched.is_mismatch());
        assert!(!unverifiable.is_mismatch());
    }

    #[test]
    fn test_mismatch_count() {
        let outcomes = vec![
            VerificationOutcome::Match {
                table: "items".to_string(),
                rows: 12,
            },
            VerificationOutcome::Mismatch {
                table: "stock_entries".to_string(),
                source: 40,
                destination: 0,
            },
            VerificationOutcome::Unverifiable {
                table: "users".to_string(),
                reason: "nope".to_string(),
            },
        ];
        assert_eq!(mismatch_count(&outcomes), 1);
        assert_eq!(mismatch_count(&[]), 0);
    }
}
