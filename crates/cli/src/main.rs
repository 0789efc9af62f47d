//! STES CLI - Database migrations and storefront management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending database migrations
//! stes-cli migrate
//!
//! # Upsert catalog products from YAML
//! stes-cli seed products crates/cli/data/products.yaml
//!
//! # Move an order along its lifecycle
//! stes-cli orders set-status STES-7K2QMX9A shipped --note "Remis au transporteur"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Seed the catalog from a YAML file
//! - `orders set-status` - Change an order's status

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stes-cli")]
#[command(author, version, about = "STES.tn storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert catalog products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Change an order's status and append a timeline entry
    SetStatus {
        /// Tracking code (case-insensitive)
        code: String,

        /// New status (`confirmed`, `processing`, `shipped`, `delivered`, `cancelled`)
        status: String,

        /// Note shown on the timeline entry
        #[arg(short, long)]
        note: Option<String>,
    },
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
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Orders { action } => match action {
            OrderAction::SetStatus { code, status, note } => {
                commands::orders::set_status(&code, &status, note.as_deref()).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_status() {
        let cli = Cli::try_parse_from([
            "stes-cli",
            "orders",
            "set-status",
            "STES-7K2QMX9A",
            "shipped",
            "--note",
            "Remis au transporteur",
        ])
        .map_err(|e| e.to_string());

        assert!(matches!(
            cli,
            Ok(Cli {
                command: Commands::Orders {
                    action: OrderAction::SetStatus { ref code, ref status, note: Some(ref note) }
                }
            }) if code == "STES-7K2QMX9A" && status == "shipped" && note == "Remis au transporteur"
        ));
    }

    #[test]
    fn test_seed_requires_file() {
        assert!(Cli::try_parse_from(["stes-cli", "seed", "products"]).is_err());
    }
}
