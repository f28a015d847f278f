//! Test utilities for stockwise-core
//!
//! [`HistoryBuilder`] lays out purchases relative to an `as_of` date and turns
//! them into a snapshot, an analysis context or an in-memory repository.
//! [`FailingHistory`] is a repository whose every read fails.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::history::{
    DateWindow, HistoryRepository, HistorySnapshot, InMemoryHistory, VendorExclusionPolicy,
};
use crate::insights::AnalysisContext;
use crate::models::{NewLineItem, NewPurchase, PurchaseLine, PurchaseStatus};

/// Account used by fixtures unless another is given
pub const TEST_ACCOUNT: &str = "test-kitchen";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

/// Uncategorised line item; line total is quantity x unit price
pub fn item(sku: &str, quantity: f64, unit_price: i64) -> NewLineItem {
    NewLineItem {
        sku: Some(sku.to_string()),
        description: sku.to_string(),
        quantity,
        unit_price,
        line_total: (quantity * unit_price as f64).round() as i64,
        category: None,
    }
}

/// Line item with a category
pub fn categorized(sku: &str, quantity: f64, unit_price: i64, category: &str) -> NewLineItem {
    NewLineItem {
        category: Some(category.to_string()),
        ..item(sku, quantity, unit_price)
    }
}

/// Builds purchase histories for tests
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    as_of: NaiveDate,
    purchases: Vec<(NaiveDate, String, PurchaseStatus, Vec<NewLineItem>)>,
}

impl HistoryBuilder {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            purchases: Vec::new(),
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Single-line purchase placed `days_ago` days before `as_of`
    pub fn order(self, days_ago: i64, vendor: &str, sku: &str, quantity: f64, unit_price: i64) -> Self {
        self.purchase(days_ago, vendor, vec![item(sku, quantity, unit_price)])
    }

    /// Purchase with several lines placed `days_ago` days before `as_of`
    pub fn purchase(self, days_ago: i64, vendor: &str, lines: Vec<NewLineItem>) -> Self {
        let day = self.as_of - Duration::days(days_ago);
        self.purchase_on(day, vendor, lines)
    }

    /// Purchase on an absolute date
    pub fn purchase_on(mut self, day: NaiveDate, vendor: &str, lines: Vec<NewLineItem>) -> Self {
        self.purchases
            .push((day, vendor.to_string(), PurchaseStatus::Completed, lines));
        self
    }

    /// Purchase with an explicit status
    pub fn purchase_with_status(
        mut self,
        days_ago: i64,
        vendor: &str,
        status: PurchaseStatus,
        lines: Vec<NewLineItem>,
    ) -> Self {
        let day = self.as_of - Duration::days(days_ago);
        self.purchases.push((day, vendor.to_string(), status, lines));
        self
    }

    /// Purchases as they would be inserted for `account`
    pub fn new_purchases(&self, account: &str) -> Vec<NewPurchase> {
        self.purchases
            .iter()
            .enumerate()
            .map(|(i, (day, vendor, status, lines))| NewPurchase {
                vendor: vendor.clone(),
                account: account.to_string(),
                ordered_at: day.and_time(NaiveTime::MIN).and_utc(),
                status: *status,
                import_hash: format!("fixture-{}", i),
                lines: lines.clone(),
            })
            .collect()
    }

    /// Completed lines, as a repository would return them
    pub fn lines(&self) -> Vec<PurchaseLine> {
        let mut line_id = 0;
        let mut rows = Vec::new();
        for (i, purchase) in self.new_purchases(TEST_ACCOUNT).iter().enumerate() {
            if purchase.status != PurchaseStatus::Completed {
                continue;
            }
            let total = purchase.total_amount();
            for line in &purchase.lines {
                line_id += 1;
                rows.push(PurchaseLine {
                    purchase_id: i as i64 + 1,
                    line_id,
                    vendor: purchase.vendor.clone(),
                    order_date: purchase.ordered_at.date_naive(),
                    purchase_total: total,
                    sku: line.sku.clone(),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                    category: line.category.clone(),
                });
            }
        }
        rows
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::from_lines(self.as_of, self.lines(), &VendorExclusionPolicy::default())
    }

    /// Context with the default configuration
    pub fn context(&self) -> AnalysisContext {
        self.context_with(EngineConfig::default())
    }

    pub fn context_with(&self, config: EngineConfig) -> AnalysisContext {
        let exclusions = VendorExclusionPolicy::from_config(&config);
        let history = HistorySnapshot::from_lines(self.as_of, self.lines(), &exclusions);
        AnalysisContext::new(TEST_ACCOUNT, self.as_of, Arc::new(config), history)
    }

    /// In-memory repository holding these purchases for `account`
    pub fn into_memory(&self, account: &str) -> InMemoryHistory {
        let memory = InMemoryHistory::new();
        for purchase in self.new_purchases(account) {
            memory.insert(&purchase).expect("fixture insert");
        }
        memory
    }
}

/// Repository whose reads always fail
#[derive(Debug, Default)]
pub struct FailingHistory;

impl HistoryRepository for FailingHistory {
    fn completed_lines(
        &self,
        _user_id: &str,
        _window: DateWindow,
        _exclusions: &VendorExclusionPolicy,
    ) -> Result<Vec<PurchaseLine>> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "history store unavailable",
        )))
    }
}
