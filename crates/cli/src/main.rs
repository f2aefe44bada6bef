//! Mercato CLI - database migrations and maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! mercato migrate
//!
//! # Purge soft-deleted rows now instead of waiting for 02:00 UTC
//! mercato sweep --retention-days 60
//!
//! # Create the default reference categories (safe to re-run)
//! mercato seed-reference
//! ```
//!
//! All commands read `MERCATO_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mercato")]
#[command(author, version, about = "Mercato CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run the retention sweep once
    Sweep {
        /// Purge rows soft-deleted more than this many days ago
        #[arg(short, long, default_value_t = 60)]
        retention_days: u32,
    },
    /// Seed the reference registry with default categories
    SeedReference,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sweep { retention_days } => commands::sweep::run(retention_days).await?,
        Commands::SeedReference => commands::seed::run().await?,
    }
    Ok(())
}
