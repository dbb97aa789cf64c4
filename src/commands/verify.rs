// ABOUTME: Verify command implementation - advisory row-count comparison
// ABOUTME: Re-checks an already-migrated destination without touching any data

use anyhow::Result;

use crate::config::MigratorConfig;
use crate::migration::{self, VerificationOutcome};
use crate::{postgres, sqlite};

/// Compare row counts between the source file and the destination.
///
/// Verification is advisory: mismatches and unverifiable tables are
/// reported but never cause a non-zero exit. Only failing to reach one
/// of the stores is an error.
pub async fn verify(config: &MigratorConfig) -> Result<()> {
    tracing::info!("Connecting to SQLite database...");
    let source = sqlite::open(&config.sqlite_path)?;

    tracing::info!("Connecting to PostgreSQL database...");
    let dest = postgres::connect(&config.database_url, config.tls).await?;

    let outcomes = migration::verify_all(&source, &dest).await;

    let matches = outcomes
        .iter()
        .filter(|o| matches!(o, VerificationOutcome::Match { .. }))
        .count();
    let mismatches = migration::verify::mismatch_count(&outcomes);
    let unverifiable = outcomes.len() - matches - mismatches;

    tracing::info!(
        "Verified {} tables: {} match, {} mismatch, {} could not be verified",
        outcomes.len(),
        matches,
        mismatches,
        unverifiable
    );

    Ok(())
}
