//! Stockwise CLI - procurement insights from purchase history
//!
//! Usage:
//!   stockwise init                                Initialize database
//!   stockwise import --file CSV --account ID      Import purchase line items
//!   stockwise purchases --account ID              List recent purchases
//!   stockwise insights --account ID --view now    Show ranked insights
//!   stockwise config                              Show engine configuration

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { file, account } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, &account)?;
            Ok(())
        }
        Commands::Purchases { account, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_purchases_list(&db, &account, limit)
        }
        Commands::Insights {
            account,
            as_of,
            view,
            json,
            limit,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            let options = commands::InsightsOptions {
                as_of: as_of.as_deref(),
                view,
                json,
                limit,
            };
            commands::cmd_insights(db, config, &account, options).await
        }
        Commands::Config { path } => {
            commands::cmd_config(path.as_deref().or(cli.config.as_deref()))
        }
    }
}
