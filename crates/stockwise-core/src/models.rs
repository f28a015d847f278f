//! Domain models for Stockwise
//!
//! All money is carried as integer minor currency units (`i64`, e.g. cents).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a purchase. Only `Completed` purchases feed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Completed,
    Failed,
    Pending,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" | "complete" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("Unknown purchase status: {}", s)),
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchase (one invoice or order) from a vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: i64,
    pub vendor: String,
    /// Owning account; insight runs are scoped to one account
    pub account: String,
    pub ordered_at: DateTime<Utc>,
    pub total_amount: i64,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn order_date(&self) -> NaiveDate {
        self.ordered_at.date_naive()
    }
}

/// One line of a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub purchase_id: i64,
    /// Missing for free-text lines; per-SKU analyses skip those
    pub sku: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: i64,
    pub line_total: i64,
    pub category: Option<String>,
}

/// A purchase to be inserted
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub vendor: String,
    pub account: String,
    pub ordered_at: DateTime<Utc>,
    pub status: PurchaseStatus,
    /// Used to skip re-imports of the same purchase
    pub import_hash: String,
    pub lines: Vec<NewLineItem>,
}

impl NewPurchase {
    /// Sum of line totals, the stored purchase total
    pub fn total_amount(&self) -> i64 {
        self.lines.iter().map(|l| l.line_total).sum()
    }
}

/// A line item to be inserted
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub sku: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: i64,
    pub line_total: i64,
    pub category: Option<String>,
}

/// Denormalised read row: a completed line item with its purchase context.
///
/// This is what the history repository hands to the insight engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub purchase_id: i64,
    pub line_id: i64,
    pub vendor: String,
    pub order_date: NaiveDate,
    pub purchase_total: i64,
    pub sku: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: i64,
    pub line_total: i64,
    pub category: Option<String>,
}

impl PurchaseLine {
    /// SKU if present and non-blank
    pub fn sku_key(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Category name, or "Uncategorized"
    pub fn category_key(&self) -> &str {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNCATEGORIZED)
    }
}

/// Bucket for lines without a category
pub const UNCATEGORIZED: &str = "Uncategorized";
