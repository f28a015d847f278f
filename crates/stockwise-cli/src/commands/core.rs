//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Shared utility to resolve the engine configuration
//! - `cmd_init` - Initialize the database
//! - `cmd_config` - Show the effective engine configuration

use std::path::Path;

use anyhow::{Context, Result};
use stockwise_core::config::default_config_path;
use stockwise_core::{Database, EngineConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load the engine configuration from an explicit file or the data-dir override
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(p) = path {
        if !p.exists() {
            anyhow::bail!("Config file not found: {}", p.display());
        }
    }
    EngineConfig::load(path).context("Failed to load engine configuration")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if db.is_encrypted()? {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import purchases: stockwise import --file purchases.csv --account my-store");
    println!("  2. See insights:     stockwise insights --account my-store");

    Ok(())
}

pub fn cmd_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    let source = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) if p.exists() => p.display().to_string(),
        _ => "built-in defaults".to_string(),
    };

    println!("# Source: {}", source);
    if let Some(p) = default_config_path() {
        println!("# Override location: {}", p.display());
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    );

    Ok(())
}
