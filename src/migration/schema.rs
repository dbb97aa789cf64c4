// ABOUTME: Destination schema application and table-order validation
// ABOUTME: Runs the static schema script and checks the plan against declared foreign keys

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tokio_postgres::Client;

use crate::error::MigrateError;

/// Execute the schema-definition script verbatim against the destination.
///
/// The script is expected to run once against a fresh database. There is
/// no idempotency guarantee: rerunning against an already-migrated
/// destination fails on conflicting objects, and that error propagates.
pub async fn apply_schema(client: &Client, schema_path: &Path) -> Result<()> {
    tracing::info!("Creating PostgreSQL schema from {}", schema_path.display());

    let script = std::fs::read_to_string(schema_path).map_err(|e| {
        MigrateError::Schema(format!(
            "Cannot read schema script {}: {}",
            schema_path.display(),
            e
        ))
    })?;

    client
        .batch_execute(&script)
        .await
        .map_err(|e| MigrateError::Schema(format!("Schema script failed: {}", e)))?;

    tracing::info!("Schema created successfully");
    Ok(())
}

/// A foreign-key edge on the destination: (referencing table, referenced table).
pub type FkEdge = (String, String);

/// Read declared foreign keys between public tables on the destination.
pub async fn declared_foreign_keys(client: &Client) -> Result<Vec<FkEdge>> {
    let rows = client
        .query(
            "SELECT tc.table_name, ccu.table_name AS referenced
             FROM information_schema.table_constraints tc
             JOIN information_schema.constraint_column_usage ccu
               ON tc.constraint_name = ccu.constraint_name
              AND tc.table_schema = ccu.table_schema
             WHERE tc.constraint_type = 'FOREIGN KEY'
               AND tc.table_schema = 'public'",
            &[],
        )
        .await
        .context("Failed to read declared foreign keys from destination")?;

    Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
}

/// Check that `order` is a topological order of the foreign-key graph:
/// every referenced table appears before the tables referencing it.
///
/// Edges touching tables outside the migration order are ignored, and a
/// table referencing itself is fine.
pub fn check_topological_order(order: &[&str], edges: &[FkEdge]) -> Result<()> {
    let position: HashMap<&str, usize> =
        order.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    for (child, parent) in edges {
        if child == parent {
            continue;
        }
        let (Some(&child_pos), Some(&parent_pos)) =
            (position.get(child.as_str()), position.get(parent.as_str()))
        else {
            continue;
        };
        if parent_pos > child_pos {
            return Err(MigrateError::Schema(format!(
                "Table order violates foreign keys: '{}' references '{}' but would be migrated first",
                child, parent
            ))
            .into());
        }
    }

    Ok(())
}

/// Validate the configured migration order against the destination's
/// declared foreign keys. A violation would only surface later as insert
/// failures; catching it here names the offending edge instead.
pub async fn validate_table_order(client: &Client, order: &[&str]) -> Result<()> {
    let edges = declared_foreign_keys(client).await?;
    if edges.is_empty() {
        tracing::debug!("No foreign keys declared on destination; skipping order validation");
        return Ok(());
    }
    check_topological_order(order, &edges)
}
