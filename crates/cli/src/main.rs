//! Stitchworks CLI - database migrations, catalog seeding and staff roles.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! sw-cli migrate
//!
//! # Seed an empty catalog with the bundled products and templates
//! sw-cli seed
//!
//! # Seed from a custom YAML file
//! sw-cli seed --file ./catalog.yaml
//!
//! # Grant or revoke a staff role
//! sw-cli staff set-role --user user_2abc --role designer
//! sw-cli staff set-role --user user_2abc --role none
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sw-cli")]
#[command(author, version, about = "Stitchworks CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed an empty catalog with products and design templates
    Seed {
        /// YAML file to load instead of the bundled catalog
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Manage staff accounts at the identity provider
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Set or clear a user's staff role
    SetRole {
        /// Identity provider user ID
        #[arg(short, long)]
        user: String,

        /// Role (`admin`, `designer`, `shipper`, or `none` to revoke)
        #[arg(short, long)]
        role: String,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file } => commands::seed::catalog(file.as_deref()).await?,
        Commands::Staff { action } => match action {
            StaffAction::SetRole { user, role } => {
                commands::staff::set_role(&user, &role).await?;
            }
        },
    }
    Ok(())
}
