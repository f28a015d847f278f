//! Purchase command implementations

use anyhow::Result;
use stockwise_core::models::PurchaseStatus;
use stockwise_core::{money, Database};

use super::truncate;

pub fn cmd_purchases_list(db: &Database, account: &str, limit: i64) -> Result<()> {
    let purchases = db.list_purchases(account, limit)?;

    if purchases.is_empty() {
        println!("No purchases found for '{}'. Import some with:", account);
        println!("  stockwise import --file purchases.csv --account {}", account);
        return Ok(());
    }

    let total = db.count_purchases(Some(account))?;

    println!();
    println!("🧾 Recent Purchases ({} of {})", purchases.len(), total);
    println!("   ─────────────────────────────────────────────────────────────");

    for purchase in purchases {
        let status = match purchase.status {
            PurchaseStatus::Completed => String::new(),
            other => format!(" \x1b[33m[{}]\x1b[0m", other),
        };
        let lines = db.get_line_items(purchase.id)?.len();

        println!(
            "   {} │ {:>12} │ {:>3} lines │ {}{}",
            purchase.order_date(),
            money::format_minor(purchase.total_amount),
            lines,
            truncate(&purchase.vendor, 32),
            status
        );
    }

    Ok(())
}
