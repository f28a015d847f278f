//! Purchase import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use stockwise_core::{import_csv, Database, ImportStats};

pub fn cmd_import(db: &Database, file: &Path, account: &str) -> Result<ImportStats> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing {} into account '{}'...", file.display(), account);

    let stats = import_csv(db, csv_file, account)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("   Found {} line items in {} purchases", stats.rows, stats.purchases);
    println!("✅ Import complete!");
    println!("   Imported: {}", stats.inserted);
    println!("   Skipped (duplicates): {}", stats.duplicates);

    if stats.inserted > 0 {
        println!();
        println!("Run 'stockwise insights --account {}' to see what changed.", account);
    }

    Ok(stats)
}
