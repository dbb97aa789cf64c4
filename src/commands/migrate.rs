// ABOUTME: Migrate command implementation - full SQLite to PostgreSQL copy
// ABOUTME: Orchestrates connect, schema, per-table copy, verification, and summary

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use crate::config::{MigratorConfig, TABLE_ORDER};
use crate::migration::{self, verify::mismatch_count, VerificationOutcome};
use crate::{postgres, sqlite};

/// Run the full migration
///
/// Performs the one-time copy from the SQLite file to PostgreSQL in steps:
/// 1. Connects to the source file and the destination database
/// 2. Shows a pre-flight inventory and prompts for confirmation
///    (unless `skip_confirmation` is true)
/// 3. Applies the destination schema script
/// 4. Validates the table order against the declared foreign keys
/// 5. Copies each table in foreign-key dependency order
/// 6. Verifies row counts and prints a summary with next steps
///
/// Both connections are released by drop on every exit path.
///
/// # Errors
///
/// This function will return an error if:
/// - The source file is unreadable or not a SQLite database
/// - The destination is unreachable or fails its liveness check
/// - The schema script fails or the table order violates foreign keys
/// - Any single row fails to insert (the run stops at that row)
/// - The user declines the confirmation prompt
pub async fn migrate(config: &MigratorConfig, skip_confirmation: bool) -> Result<()> {
    tracing::info!("Connecting to SQLite database...");
    let source = sqlite::open(&config.sqlite_path)?;
    tracing::info!("Connected to SQLite at {}", config.sqlite_path.display());

    tracing::info!("Connecting to PostgreSQL database...");
    let dest = postgres::connect(&config.database_url, config.tls).await?;

    let inventory = source_inventory(&source)?;
    if !skip_confirmation && !confirm_migration(&inventory)? {
        bail!("Migration cancelled by user");
    }

    migration::apply_schema(&dest, &config.schema_path).await?;
    migration::validate_table_order(&dest, TABLE_ORDER).await?;

    tracing::info!("Starting data migration...");
    let mut stats: Vec<(&str, u64)> = Vec::with_capacity(TABLE_ORDER.len());
    for table in TABLE_ORDER {
        let migrated = migration::migrate_table(&source, &dest, table).await?;
        stats.push((table, migrated));
    }

    let outcomes = migration::verify_all(&source, &dest).await;

    print_summary(&stats, &outcomes);
    Ok(())
}

/// Per-table source row counts for the pre-flight prompt. Tables missing
/// from the source show as zero rows.
pub fn source_inventory(source: &Connection) -> Result<Vec<(&'static str, i64)>> {
    let mut inventory = Vec::with_capacity(TABLE_ORDER.len());
    for table in TABLE_ORDER {
        let rows = if sqlite::table_exists(source, table)? {
            sqlite::count_rows(source, table)?
        } else {
            0
        };
        inventory.push((*table, rows));
    }
    Ok(inventory)
}

/// Display the source inventory and prompt for confirmation.
fn confirm_migration(inventory: &[(&'static str, i64)]) -> Result<bool> {
    let total: i64 = inventory.iter().map(|(_, rows)| rows).sum();

    println!();
    println!("{:<25} {:>10}", "Table", "Rows");
    println!("{}", "-".repeat(36));
    for (table, rows) in inventory {
        println!("{:<25} {:>10}", table, rows);
    }
    println!("{}", "-".repeat(36));
    println!("Total: {} rows", total);
    println!();

    print!("Proceed with migration? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_summary(stats: &[(&str, u64)], outcomes: &[VerificationOutcome]) {
    let total: u64 = stats.iter().map(|(_, count)| count).sum();

    println!();
    println!("Migration Summary");
    println!("{}", "-".repeat(36));
    println!("Total rows migrated: {}", total);
    println!();
    println!("Rows per table:");
    for (table, count) in stats {
        println!("  - {}: {} rows", table, count);
    }

    let mismatches = mismatch_count(outcomes);
    if mismatches > 0 {
        println!();
        println!(
            "⚠ {} table(s) reported row-count mismatches; review the log above",
            mismatches
        );
    }

    println!();
    println!("✅ Migration completed successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Update your .env file: DB_TYPE=postgres");
    println!("  2. Back up your SQLite database");
    println!("  3. Restart your server: npm start");
    println!("  4. Test your application");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_inventory_reports_missing_tables_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grocery.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO items (name) VALUES ('milk'), ('bread'), ('eggs');",
        )
        .unwrap();

        let inventory = source_inventory(&conn).unwrap();
        assert_eq!(inventory.len(), TABLE_ORDER.len());
        assert_eq!(inventory[0], ("items", 3));
        // Everything else is absent from this source
        for (table, rows) in &inventory[1..] {
            assert_eq!(*rows, 0, "expected zero rows for missing table {}", table);
        }
    }
}
