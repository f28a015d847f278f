//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Stockwise - Procurement insights from your purchase history
#[derive(Parser)]
#[command(name = "stockwise")]
#[command(about = "Reorder, pricing and spend insights for independent businesses", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "stockwise.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set STOCKWISE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Engine configuration file (defaults to the data-dir override, then built-in values)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import purchase line items from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account the purchases belong to
        #[arg(short, long)]
        account: String,
    },

    /// List recent purchases
    Purchases {
        /// Account to list
        #[arg(short, long)]
        account: String,

        /// Number of purchases to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Generate ranked insights for an account
    Insights {
        /// Account to analyze
        #[arg(short, long)]
        account: String,

        /// Analysis date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        as_of: Option<String>,

        /// Which feed to show
        #[arg(long, value_enum, default_value = "all")]
        view: InsightView,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Maximum number of insights to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the effective engine configuration
    Config {
        /// Configuration file to check (defaults to --config, then the data-dir override)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

/// Insight feed selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InsightView {
    /// Full ranked feed
    All,
    /// High urgency, or events within a day
    Now,
    /// Events within the week, or material impact
    Week,
}
