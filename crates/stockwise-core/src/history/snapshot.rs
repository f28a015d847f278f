//! Per-run immutable history snapshot and its windowed queries

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use super::{DateWindow, HistoryRepository, VendorExclusionPolicy};
use crate::models::PurchaseLine;

/// Key used to group lines for aggregate queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Sku,
    Vendor,
    Category,
    /// Every line in one bucket
    Global,
}

impl GroupBy {
    /// Grouping key of a line; `None` for SKU grouping of lines without a SKU
    pub fn key_of(&self, line: &PurchaseLine) -> Option<String> {
        match self {
            GroupBy::Sku => line.sku_key().map(str::to_string),
            GroupBy::Vendor => Some(line.vendor.clone()),
            GroupBy::Category => Some(line.category_key().to_string()),
            GroupBy::Global => Some(GLOBAL_KEY.to_string()),
        }
    }
}

/// Bucket name used by [`GroupBy::Global`]
pub const GLOBAL_KEY: &str = "all";

/// Aggregated orders for one key on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyOrder {
    pub date: NaiveDate,
    pub quantity: f64,
    pub spend: i64,
    /// Distinct purchases contributing on this day
    pub orders: usize,
}

/// One observed unit price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub purchase_id: i64,
    pub vendor: String,
    pub unit_price: i64,
    pub quantity: f64,
}

/// Totals for one key over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodTotal {
    pub spend: i64,
    pub quantity: f64,
    /// Distinct purchases
    pub orders: usize,
    pub lines: usize,
    pub unit_price_sum: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub vendors: BTreeSet<String>,
}

impl PeriodTotal {
    /// Mean of the line unit prices
    pub fn average_unit_price(&self) -> Option<f64> {
        if self.lines == 0 {
            return None;
        }
        Some(self.unit_price_sum as f64 / self.lines as f64)
    }
}

/// One purchase, summarised
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub purchase_id: i64,
    pub vendor: String,
    pub date: NaiveDate,
    /// Invoice total as recorded on the purchase
    pub total: i64,
    pub lines: usize,
    pub quantity: f64,
}

/// Completed, exclusion-filtered history for one account as of one date.
///
/// Built once per engine run; every detector reads the same snapshot.
/// Purchase-level money (`orders`, `daily_spend`, `total_spend`) uses the
/// recorded invoice totals, key-level totals use line totals.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    as_of: NaiveDate,
    lines: Vec<PurchaseLine>,
}

impl HistorySnapshot {
    /// Load `lookback_days` of history ending at `as_of`.
    ///
    /// A repository failure is logged and yields an empty snapshot: detectors
    /// then find nothing to report rather than failing the run.
    pub fn load(
        repository: &dyn HistoryRepository,
        user_id: &str,
        as_of: NaiveDate,
        lookback_days: i64,
        exclusions: &VendorExclusionPolicy,
    ) -> Self {
        let window = DateWindow::ending(as_of, lookback_days);
        match repository.completed_lines(user_id, window, exclusions) {
            Ok(lines) => {
                debug!(
                    user = user_id,
                    window = %window,
                    lines = lines.len(),
                    "Loaded history snapshot"
                );
                Self::from_lines(as_of, lines, exclusions)
            }
            Err(e) => {
                warn!(
                    user = user_id,
                    window = %window,
                    error = %e,
                    "History query failed, analysing an empty snapshot"
                );
                Self::empty(as_of)
            }
        }
    }

    /// Build from already-fetched lines. Lines dated after `as_of` or from
    /// excluded vendors are dropped.
    pub fn from_lines(
        as_of: NaiveDate,
        lines: Vec<PurchaseLine>,
        exclusions: &VendorExclusionPolicy,
    ) -> Self {
        let mut lines: Vec<PurchaseLine> = lines
            .into_iter()
            .filter(|l| l.order_date <= as_of && !exclusions.is_excluded(&l.vendor))
            .collect();
        lines.sort_by(|a, b| {
            a.order_date
                .cmp(&b.order_date)
                .then(a.purchase_id.cmp(&b.purchase_id))
                .then(a.line_id.cmp(&b.line_id))
        });
        Self { as_of, lines }
    }

    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            lines: Vec::new(),
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Lines ordered within `window`, chronologically
    pub fn lines(&self, window: DateWindow) -> impl Iterator<Item = &PurchaseLine> {
        self.lines.iter().filter(move |l| window.contains(l.order_date))
    }

    /// Per-key, per-day order aggregates, days ascending
    pub fn daily_orders(
        &self,
        window: DateWindow,
        group: GroupBy,
    ) -> BTreeMap<String, Vec<DailyOrder>> {
        let mut acc: BTreeMap<String, BTreeMap<NaiveDate, (f64, i64, BTreeSet<i64>)>> =
            BTreeMap::new();
        for line in self.lines(window) {
            let Some(key) = group.key_of(line) else {
                continue;
            };
            let day = acc
                .entry(key)
                .or_default()
                .entry(line.order_date)
                .or_insert_with(|| (0.0, 0, BTreeSet::new()));
            day.0 += line.quantity;
            day.1 += line.line_total;
            day.2.insert(line.purchase_id);
        }

        acc.into_iter()
            .map(|(key, days)| {
                let days = days
                    .into_iter()
                    .map(|(date, (quantity, spend, orders))| DailyOrder {
                        date,
                        quantity,
                        spend,
                        orders: orders.len(),
                    })
                    .collect();
                (key, days)
            })
            .collect()
    }

    /// Per-SKU, per-day order aggregates
    pub fn sku_daily_orders(&self, window: DateWindow) -> BTreeMap<String, Vec<DailyOrder>> {
        self.daily_orders(window, GroupBy::Sku)
    }

    /// Per-SKU unit price time series, chronological
    pub fn sku_price_series(&self, window: DateWindow) -> BTreeMap<String, Vec<PricePoint>> {
        let mut series: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
        for line in self.lines(window) {
            let Some(sku) = line.sku_key() else {
                continue;
            };
            series.entry(sku.to_string()).or_default().push(PricePoint {
                date: line.order_date,
                purchase_id: line.purchase_id,
                vendor: line.vendor.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }
        series
    }

    /// Per-key totals over `window`
    pub fn totals(&self, window: DateWindow, group: GroupBy) -> BTreeMap<String, PeriodTotal> {
        let mut acc: BTreeMap<String, (PeriodTotal, BTreeSet<i64>)> = BTreeMap::new();
        for line in self.lines(window) {
            let Some(key) = group.key_of(line) else {
                continue;
            };
            let (total, purchases) = acc.entry(key).or_default();
            total.spend += line.line_total;
            total.quantity += line.quantity;
            total.lines += 1;
            total.unit_price_sum += line.unit_price;
            total.first_date = Some(
                total
                    .first_date
                    .map_or(line.order_date, |d| d.min(line.order_date)),
            );
            total.last_date = Some(
                total
                    .last_date
                    .map_or(line.order_date, |d| d.max(line.order_date)),
            );
            total.vendors.insert(line.vendor.clone());
            purchases.insert(line.purchase_id);
        }

        acc.into_iter()
            .map(|(key, (mut total, purchases))| {
                total.orders = purchases.len();
                (key, total)
            })
            .collect()
    }

    pub fn sku_totals(&self, window: DateWindow) -> BTreeMap<String, PeriodTotal> {
        self.totals(window, GroupBy::Sku)
    }

    pub fn vendor_totals(&self, window: DateWindow) -> BTreeMap<String, PeriodTotal> {
        self.totals(window, GroupBy::Vendor)
    }

    pub fn category_totals(&self, window: DateWindow) -> BTreeMap<String, PeriodTotal> {
        self.totals(window, GroupBy::Category)
    }

    /// Purchases ordered within `window`, by date then id
    pub fn orders(&self, window: DateWindow) -> Vec<OrderSummary> {
        let mut orders: BTreeMap<(NaiveDate, i64), OrderSummary> = BTreeMap::new();
        for line in self.lines(window) {
            let order = orders
                .entry((line.order_date, line.purchase_id))
                .or_insert_with(|| OrderSummary {
                    purchase_id: line.purchase_id,
                    vendor: line.vendor.clone(),
                    date: line.order_date,
                    total: line.purchase_total,
                    lines: 0,
                    quantity: 0.0,
                });
            order.lines += 1;
            order.quantity += line.quantity;
        }
        orders.into_values().collect()
    }

    /// Invoice totals summed per day
    pub fn daily_spend(&self, window: DateWindow) -> BTreeMap<NaiveDate, i64> {
        let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for order in self.orders(window) {
            *days.entry(order.date).or_insert(0) += order.total;
        }
        days
    }

    pub fn total_spend(&self, window: DateWindow) -> i64 {
        self.orders(window).iter().map(|o| o.total).sum()
    }

    /// Most recent description recorded for a SKU, falling back to the SKU itself
    pub fn sku_label(&self, sku: &str) -> String {
        self.lines
            .iter()
            .rev()
            .find(|l| l.sku_key() == Some(sku))
            .map(|l| l.description.clone())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| sku.to_string())
    }

    /// Most recent category recorded for a SKU
    pub fn sku_category(&self, sku: &str) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find(|l| l.sku_key() == Some(sku))
            .map(|l| l.category_key().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNCATEGORIZED;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn line(
        purchase_id: i64,
        line_id: i64,
        day: u32,
        vendor: &str,
        sku: Option<&str>,
        qty: f64,
        price: i64,
        purchase_total: i64,
    ) -> PurchaseLine {
        PurchaseLine {
            purchase_id,
            line_id,
            vendor: vendor.to_string(),
            order_date: date(day),
            purchase_total,
            sku: sku.map(str::to_string),
            description: sku.unwrap_or("misc").to_string(),
            quantity: qty,
            unit_price: price,
            line_total: (qty * price as f64) as i64,
            category: None,
        }
    }

    fn snapshot() -> HistorySnapshot {
        HistorySnapshot::from_lines(
            date(20),
            vec![
                line(2, 1, 5, "Sysco", Some("EGG"), 10.0, 300, 3_000),
                line(1, 2, 5, "Sysco", Some("MILK"), 4.0, 250, 2_600),
                line(1, 3, 5, "Sysco", Some("EGG"), 5.0, 320, 2_600),
                line(3, 4, 9, "Party Rentals", Some("EGG"), 1.0, 999, 999),
                line(4, 5, 12, "US Foods", None, 1.0, 1_000, 1_000),
                line(5, 6, 25, "Sysco", Some("EGG"), 1.0, 300, 300),
            ],
            &VendorExclusionPolicy::new(["rental"]),
        )
    }

    #[test]
    fn test_future_and_excluded_lines_are_dropped() {
        let snap = snapshot();
        assert_eq!(snap.len(), 4);
        assert!(snap.lines(DateWindow::ending(date(20), 30)).all(|l| l.vendor != "Party Rentals"));
    }

    #[test]
    fn test_sku_daily_orders_merge_same_day() {
        let snap = snapshot();
        let daily = snap.sku_daily_orders(DateWindow::ending(date(20), 30));
        let egg = &daily["EGG"];
        assert_eq!(egg.len(), 1);
        assert_eq!(egg[0].quantity, 15.0);
        assert_eq!(egg[0].orders, 2);
        assert_eq!(egg[0].spend, 4_600);
        // Lines without SKU are skipped
        assert_eq!(daily.len(), 2);
    }

    #[test]
    fn test_totals_and_orders() {
        let snap = snapshot();
        let window = DateWindow::ending(date(20), 30);
        let vendors = snap.vendor_totals(window);
        assert_eq!(vendors["Sysco"].orders, 2);
        assert_eq!(vendors["Sysco"].lines, 3);
        assert_eq!(vendors["US Foods"].spend, 1_000);

        let categories = snap.category_totals(window);
        assert_eq!(categories[UNCATEGORIZED].orders, 3);

        let orders = snap.orders(window);
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].purchase_id, 1);
        assert_eq!(snap.total_spend(window), 2_600 + 3_000 + 1_000);
    }

    #[test]
    fn test_price_series_is_chronological() {
        let snap = snapshot();
        let series = snap.sku_price_series(DateWindow::ending(date(20), 30));
        let egg: Vec<i64> = series["EGG"].iter().map(|p| p.unit_price).collect();
        assert_eq!(egg, vec![320, 300]);
    }

    #[test]
    fn test_average_unit_price() {
        let total = PeriodTotal {
            lines: 2,
            unit_price_sum: 650,
            ..Default::default()
        };
        assert_eq!(total.average_unit_price(), Some(325.0));
        assert_eq!(PeriodTotal::default().average_unit_price(), None);
    }
}
