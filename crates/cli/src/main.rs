//! Lumen Orders CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lumen-cli migrate
//!
//! # Create a staff account (a password is generated when -p is omitted)
//! lumen-cli user create -e owner@example.com -n "Store Owner" -r owner
//!
//! # Pull new orders from the configured Shopify store once
//! lumen-cli sync run
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lumen-cli")]
#[command(author, version, about = "Lumen Orders CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Shopify order sync
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new staff account
    Create {
        /// Email address (login)
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`owner`, `admin`, `manager`, `employee`, `packer`)
        #[arg(short, long, default_value = "employee")]
        role: String,

        /// Initial password; a random one is printed when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Fetch orders newer than the last synced one
    Run,
}

#[tokio::main]
async fn main() {
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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create_user(&email, &name, &role, password).await?;
            }
        },
        Commands::Sync { action } => match action {
            SyncAction::Run => commands::sync::run().await?,
        },
    }
    Ok(())
}
