//! CSV import of purchase line items
//!
//! One row per line item. Rows sharing date, vendor and order reference
//! form one purchase.
//!
//! ```text
//! date,vendor,order_ref,sku,description,quantity,unit_price,line_total,category,status
//! 2026-03-02,Sysco,INV-1001,EGG-12,Large eggs (dozen),20,3.25,65.00,Dairy,completed
//! ```
//!
//! `order_ref`, `sku`, `line_total`, `category` and `status` may be omitted;
//! a missing line total is computed from quantity and unit price and a
//! missing status means `completed`. Money columns are in major units
//! (`3.25`) and stored as minor units.

use std::collections::HashMap;
use std::io::Read;

use chrono::{NaiveDate, NaiveTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewLineItem, NewPurchase, PurchaseStatus};
use crate::money;

/// Outcome of one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Line-item rows read
    pub rows: usize,
    /// Purchases the rows grouped into
    pub purchases: usize,
    pub inserted: usize,
    /// Purchases skipped because they were imported before
    pub duplicates: usize,
}

#[derive(Debug, Deserialize)]
struct PurchaseRow {
    date: String,
    vendor: String,
    #[serde(default)]
    order_ref: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    description: String,
    quantity: String,
    unit_price: String,
    #[serde(default)]
    line_total: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Parse purchase rows for `account`, grouped into purchases in first-seen order
pub fn parse_purchases<R: Read>(reader: R, account: &str) -> Result<Vec<NewPurchase>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut purchases: Vec<NewPurchase> = Vec::new();
    let mut index: HashMap<(NaiveDate, String, String), usize> = HashMap::new();

    for (i, result) in rdr.deserialize::<PurchaseRow>().enumerate() {
        // Header is line 1
        let line_no = i + 2;
        let row = result?;

        let date = parse_date(&row.date).map_err(|e| at_line(line_no, e))?;
        let vendor = row.vendor.trim().to_string();
        if vendor.is_empty() {
            return Err(at_line(line_no, Error::Import("Missing vendor".into())));
        }
        let order_ref = non_empty(row.order_ref).unwrap_or_default();

        let quantity = parse_decimal(&row.quantity).map_err(|e| at_line(line_no, e))?;
        if quantity <= 0.0 {
            return Err(at_line(
                line_no,
                Error::Import(format!("Quantity must be positive: {}", row.quantity)),
            ));
        }
        let unit_price = parse_money(&row.unit_price).map_err(|e| at_line(line_no, e))?;
        let line_total = match non_empty(row.line_total) {
            Some(total) => parse_money(&total).map_err(|e| at_line(line_no, e))?,
            None => money::to_minor_units(quantity * unit_price as f64)?,
        };
        let status = match non_empty(row.status) {
            Some(s) => s
                .parse::<PurchaseStatus>()
                .map_err(|e| at_line(line_no, Error::Import(e)))?,
            None => PurchaseStatus::Completed,
        };

        let line = NewLineItem {
            sku: non_empty(row.sku),
            description: row.description.trim().to_string(),
            quantity,
            unit_price,
            line_total,
            category: non_empty(row.category),
        };

        let key = (date, vendor.clone(), order_ref);
        match index.get(&key) {
            Some(&pos) => purchases[pos].lines.push(line),
            None => {
                index.insert(key, purchases.len());
                purchases.push(NewPurchase {
                    vendor,
                    account: account.to_string(),
                    ordered_at: date.and_time(NaiveTime::MIN).and_utc(),
                    status,
                    import_hash: String::new(),
                    lines: vec![line],
                });
            }
        }
    }

    let refs: HashMap<usize, String> = index
        .into_iter()
        .map(|((_, _, order_ref), pos)| (pos, order_ref))
        .collect();
    for (pos, purchase) in purchases.iter_mut().enumerate() {
        let order_ref = refs.get(&pos).map(String::as_str).unwrap_or_default();
        purchase.import_hash = generate_hash(purchase, order_ref);
    }

    debug!(
        purchases = purchases.len(),
        account = account,
        "Parsed purchase CSV"
    );
    Ok(purchases)
}

/// Parse and store purchase rows, skipping purchases imported before
pub fn import_csv<R: Read>(db: &Database, reader: R, account: &str) -> Result<ImportStats> {
    if account.trim().is_empty() {
        return Err(Error::Import("Account must not be empty".into()));
    }

    let purchases = parse_purchases(reader, account)?;
    let mut stats = ImportStats {
        rows: purchases.iter().map(|p| p.lines.len()).sum(),
        purchases: purchases.len(),
        ..Default::default()
    };

    for purchase in &purchases {
        match db.insert_purchase(purchase)? {
            Some(_) => stats.inserted += 1,
            None => stats.duplicates += 1,
        }
    }

    info!(
        account = account,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        "Import complete"
    );
    Ok(stats)
}

/// Hash of everything that identifies a purchase, for de-duplication
fn generate_hash(purchase: &NewPurchase, order_ref: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(purchase.account.as_bytes());
    hasher.update(purchase.ordered_at.date_naive().to_string().as_bytes());
    hasher.update(purchase.vendor.as_bytes());
    hasher.update(order_ref.as_bytes());
    for line in &purchase.lines {
        hasher.update(line.sku.as_deref().unwrap_or("").as_bytes());
        hasher.update(line.description.as_bytes());
        hasher.update(line.quantity.to_be_bytes());
        hasher.update(line.unit_price.to_be_bytes());
        hasher.update(line.line_total.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

fn at_line(line_no: usize, err: Error) -> Error {
    let message = match err {
        Error::Import(message) => message,
        other => other.to_string(),
    };
    Error::Import(format!("line {}: {}", line_no, message))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a date string in various common formats
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let formats = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y"];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse a number, tolerating thousands separators and currency symbols
fn parse_decimal(s: &str) -> Result<f64> {
    let cleaned: String = s.trim().replace(['$', ',', ' '], "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Import(format!("Unable to parse number: {}", s)))
}

/// Parse a major-unit money string into minor units
fn parse_money(s: &str) -> Result<i64> {
    let amount = parse_decimal(s)?;
    money::to_minor_units(amount * 100.0)
}
