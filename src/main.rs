// ABOUTME: CLI entry point for eazzymart-migrator
// ABOUTME: Parses commands and routes to appropriate handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eazzymart_migrator::commands;
use eazzymart_migrator::config::MigratorConfig;

const DEFAULT_SOURCE_DB: &str = "grocery.db";
const DEFAULT_SCHEMA: &str = "database/postgres-schema.sql";

#[derive(Parser)]
#[command(name = "eazzymart-migrator")]
#[command(about = "SQLite to PostgreSQL data migration for the EazzyMart backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy all data from the SQLite file into the PostgreSQL database
    Migrate {
        /// Path to the source SQLite database file
        #[arg(long, default_value = DEFAULT_SOURCE_DB)]
        source_db: PathBuf,
        /// Path to the destination schema-definition script
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Compare row counts between source and destination
    Verify {
        /// Path to the source SQLite database file
        #[arg(long, default_value = DEFAULT_SOURCE_DB)]
        source_db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            source_db,
            schema,
            yes,
        } => {
            let config = MigratorConfig::from_env(source_db, schema)?;
            commands::migrate(&config, yes).await
        }
        Commands::Verify { source_db } => {
            // The schema script is not touched by verify; the default
            // path just completes the config.
            let config = MigratorConfig::from_env(source_db, PathBuf::from(DEFAULT_SCHEMA))?;
            commands::verify(&config).await
        }
    }
}
