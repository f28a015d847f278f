//! Order size and consolidation detectors

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::OrderSummary;
use crate::insights::builders::{percent, round2};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency};
use crate::models::UNCATEGORIZED;
use crate::money;

/// Purchases in `window`, grouped by vendor, each vendor's list by date
fn orders_by_vendor(ctx: &AnalysisContext, days: i64) -> BTreeMap<String, Vec<OrderSummary>> {
    let mut by_vendor: BTreeMap<String, Vec<OrderSummary>> = BTreeMap::new();
    for order in ctx.history.orders(ctx.window(days)) {
        by_vendor.entry(order.vendor.clone()).or_default().push(order);
    }
    by_vendor
}

pub fn bulk_buying(config: &EngineConfig) -> Arc<dyn Detector> {
    let o = &config.ordering;
    Arc::new(BulkBuying {
        window_days: o.window_days,
        min_orders: o.bulk_min_orders,
        min_small_orders: o.bulk_min_small_orders,
        small_ratio: o.bulk_small_order_ratio,
        discount_rate: o.bulk_discount_rate,
    })
}

/// SKUs bought in many small orders
struct BulkBuying {
    window_days: i64,
    min_orders: usize,
    min_small_orders: usize,
    small_ratio: f64,
    discount_rate: f64,
}

impl Detector for BulkBuying {
    fn insight_type(&self) -> InsightType {
        InsightType::BulkBuying
    }

    fn name(&self) -> &'static str {
        "Bulk buying"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_orders
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (sku, days) in ctx.history.sku_daily_orders(ctx.window(self.window_days)) {
            if days.len() < self.min_orders {
                continue;
            }
            let largest = days.iter().map(|d| d.quantity).fold(0.0, f64::max);
            let cutoff = largest * self.small_ratio;
            let small: Vec<_> = days.iter().filter(|d| d.quantity <= cutoff).collect();
            if small.len() < self.min_small_orders {
                continue;
            }
            let small_spend: i64 = small.iter().map(|d| d.spend).sum();
            let savings = money::apply_rate(small_spend, self.discount_rate)?;

            let label = ctx.history.sku_label(&sku);
            drafts.push(
                InsightDraft::new(
                    InsightType::BulkBuying,
                    InsightScope::Sku(sku.clone()),
                    format!("Buy {} in bulk", label),
                    format!(
                        "{} of your {} orders of {} were at most {} of your largest order. Buying in bulk could save around {}.",
                        small.len(),
                        days.len(),
                        label,
                        percent(self.small_ratio),
                        money::format_minor(savings)
                    ),
                )
                .with_confidence((45.0 + small.len() as f64 * 5.0).min(85.0))
                .with_value(savings)
                .with_quantity(largest)
                .with_reason("order_count", days.len() as u64)
                .with_reason("small_order_count", small.len() as u64)
                .with_reason("largest_quantity", round2(largest))
                .with_reason("small_order_spend", small_spend)
                .with_reason("discount_rate", self.discount_rate),
            );
        }
        Ok(drafts)
    }
}

pub fn vendor_consolidation(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(VendorConsolidation {
        window_days: config.ordering.window_days,
        min_vendors: config.ordering.consolidation_min_vendors,
        admin_cost: config.ordering.admin_cost_per_order,
    })
}

/// Categories spread across many vendors
struct VendorConsolidation {
    window_days: i64,
    min_vendors: usize,
    admin_cost: i64,
}

#[derive(Default)]
struct VendorShare {
    spend: i64,
    purchases: BTreeSet<i64>,
}

impl Detector for VendorConsolidation {
    fn insight_type(&self) -> InsightType {
        InsightType::VendorConsolidation
    }

    fn name(&self) -> &'static str {
        "Vendor consolidation"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut categories: BTreeMap<&str, BTreeMap<&str, VendorShare>> = BTreeMap::new();
        for line in ctx.history.lines(ctx.window(self.window_days)) {
            let share = categories
                .entry(line.category_key())
                .or_default()
                .entry(line.vendor.as_str())
                .or_default();
            share.spend += line.line_total;
            share.purchases.insert(line.purchase_id);
        }

        let mut drafts = Vec::new();
        for (category, vendors) in categories {
            if category == UNCATEGORIZED || vendors.len() < self.min_vendors {
                continue;
            }
            // Highest spend; the first vendor by name wins a tie
            let mut primary: Option<(&str, i64)> = None;
            for (vendor, share) in &vendors {
                if primary.map_or(true, |(_, spend)| share.spend > spend) {
                    primary = Some((*vendor, share.spend));
                }
            }
            let Some((primary, _)) = primary else {
                continue;
            };
            let other_orders: usize = vendors
                .iter()
                .filter(|(vendor, _)| **vendor != primary)
                .map(|(_, share)| share.purchases.len())
                .sum();
            let savings = self.admin_cost * other_orders as i64;

            drafts.push(
                InsightDraft::new(
                    InsightType::VendorConsolidation,
                    InsightScope::Category(category.to_string()),
                    format!("Consolidate {} vendors", category),
                    format!(
                        "{} is bought from {} vendors. Moving the {} orders placed outside {} to one supplier would cut ordering overhead.",
                        category,
                        vendors.len(),
                        other_orders,
                        primary
                    ),
                )
                .with_confidence((50.0 + vendors.len() as f64 * 5.0).min(80.0))
                .with_value(savings)
                .with_reason("vendor_count", vendors.len() as u64)
                .with_reason("primary_vendor", primary)
                .with_reason("other_vendor_orders", other_orders as u64)
                .with_reason("admin_cost_per_order", self.admin_cost),
            );
        }
        Ok(drafts)
    }
}

pub fn order_consolidation(config: &EngineConfig) -> Arc<dyn Detector> {
    let o = &config.ordering;
    Arc::new(OrderConsolidation {
        window_days: o.order_consolidation_window_days,
        gap_days: o.order_consolidation_gap_days,
        min_pairs: o.order_consolidation_min_pairs,
        admin_cost: o.admin_cost_per_order,
    })
}

/// Orders to one vendor placed close enough together to merge
struct OrderConsolidation {
    window_days: i64,
    gap_days: i64,
    min_pairs: usize,
    admin_cost: i64,
}

/// Greedily pair consecutive dates no more than `gap_days` apart
fn mergeable_pairs(dates: &[NaiveDate], gap_days: i64) -> usize {
    let mut pairs = 0;
    let mut i = 0;
    while i + 1 < dates.len() {
        if (dates[i + 1] - dates[i]).num_days() <= gap_days {
            pairs += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    pairs
}

impl Detector for OrderConsolidation {
    fn insight_type(&self) -> InsightType {
        InsightType::OrderConsolidation
    }

    fn name(&self) -> &'static str {
        "Order consolidation"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_pairs * 2
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (vendor, orders) in orders_by_vendor(ctx, self.window_days) {
            let dates: Vec<NaiveDate> = orders.iter().map(|o| o.date).collect();
            let pairs = mergeable_pairs(&dates, self.gap_days);
            if pairs < self.min_pairs {
                continue;
            }
            let savings = self.admin_cost * pairs as i64;
            drafts.push(
                InsightDraft::new(
                    InsightType::OrderConsolidation,
                    InsightScope::Vendor(vendor.clone()),
                    format!("Combine {} orders", vendor),
                    format!(
                        "{} times in the last {} days you ordered from {} twice within {} days.",
                        pairs, self.window_days, vendor, self.gap_days
                    ),
                )
                .with_confidence((50.0 + pairs as f64 * 8.0).min(85.0))
                .with_value(savings)
                .with_reason("order_count", orders.len() as u64)
                .with_reason("mergeable_pairs", pairs as u64)
                .with_reason("gap_days", self.gap_days)
                .with_reason("admin_cost_per_order", self.admin_cost),
            );
        }
        Ok(drafts)
    }
}

pub fn small_order(config: &EngineConfig) -> Arc<dyn Detector> {
    let o = &config.ordering;
    Arc::new(SmallOrder {
        window_days: o.window_days,
        ratio: o.small_order_ratio,
        min_count: o.small_order_min_count,
        admin_cost: o.admin_cost_per_order,
    })
}

/// Vendors receiving repeated orders far below their usual size
struct SmallOrder {
    window_days: i64,
    ratio: f64,
    min_count: usize,
    admin_cost: i64,
}

impl Detector for SmallOrder {
    fn insight_type(&self) -> InsightType {
        InsightType::SmallOrder
    }

    fn name(&self) -> &'static str {
        "Small order"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_count
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (vendor, orders) in orders_by_vendor(ctx, self.window_days) {
            let totals: Vec<i64> = orders.iter().map(|o| o.total).collect();
            let Some(average) = money::average(&totals) else {
                continue;
            };
            let cutoff = average as f64 * self.ratio;
            let small = totals.iter().filter(|&&t| (t as f64) < cutoff).count();
            if small < self.min_count {
                continue;
            }
            let savings = self.admin_cost * small as i64;
            drafts.push(
                InsightDraft::new(
                    InsightType::SmallOrder,
                    InsightScope::Vendor(vendor.clone()),
                    format!("Small orders to {}", vendor),
                    format!(
                        "{} orders to {} were under {} of your average order of {}.",
                        small,
                        vendor,
                        percent(self.ratio),
                        money::format_minor(average)
                    ),
                )
                .with_confidence((45.0 + small as f64 * 5.0).min(80.0))
                .with_value(savings)
                .with_reason("order_count", orders.len() as u64)
                .with_reason("small_order_count", small as u64)
                .with_reason("average_order_total", average)
                .with_reason("admin_cost_per_order", self.admin_cost),
            );
        }
        Ok(drafts)
    }
}

pub fn duplicate_order(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(DuplicateOrder {
        window_days: config.ordering.duplicate_window_days,
        gap_days: config.ordering.duplicate_gap_days,
    })
}

/// The same SKU ordered from the same vendor on two purchases days apart
struct DuplicateOrder {
    window_days: i64,
    gap_days: i64,
}

impl Detector for DuplicateOrder {
    fn insight_type(&self) -> InsightType {
        InsightType::DuplicateOrder
    }

    fn name(&self) -> &'static str {
        "Duplicate order"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        2
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        // (vendor, sku) -> purchase id -> (date, quantity, spend)
        let mut seen: BTreeMap<(&str, &str), BTreeMap<i64, (NaiveDate, f64, i64)>> =
            BTreeMap::new();
        for line in ctx.history.lines(ctx.window(self.window_days)) {
            let Some(sku) = line.sku_key() else {
                continue;
            };
            let entry = seen
                .entry((line.vendor.as_str(), sku))
                .or_default()
                .entry(line.purchase_id)
                .or_insert((line.order_date, 0.0, 0));
            entry.1 += line.quantity;
            entry.2 += line.line_total;
        }

        let mut drafts = Vec::new();
        for ((vendor, sku), purchases) in seen {
            let mut purchases: Vec<_> = purchases.into_iter().collect();
            purchases.sort_by_key(|(id, (date, _, _))| (*date, *id));

            // Latest pair within the gap
            let duplicate = purchases
                .windows(2)
                .rev()
                .find(|w| (w[1].1 .0 - w[0].1 .0).num_days() <= self.gap_days);
            let Some([(first_id, first), (second_id, second)]) = duplicate.map(|w| [w[0], w[1]])
            else {
                continue;
            };

            let label = ctx.history.sku_label(sku);
            let urgency = if second.0 == ctx.as_of {
                Urgency::High
            } else {
                Urgency::Medium
            };
            drafts.push(
                InsightDraft::new(
                    InsightType::DuplicateOrder,
                    InsightScope::Sku(sku.to_string()),
                    format!("Possible duplicate order of {}", label),
                    format!(
                        "{} was ordered from {} on {} and again on {}. Check the second order was intended.",
                        label, vendor, first.0, second.0
                    ),
                )
                .with_urgency(urgency)
                .with_confidence(70.0)
                .with_value(second.2)
                .with_reason("vendor", vendor)
                .with_reason("first_purchase_id", first_id)
                .with_reason("first_order_date", first.0.to_string())
                .with_reason("second_purchase_id", second_id)
                .with_reason("second_order_date", second.0.to_string())
                .with_reason("second_quantity", round2(second.1))
                .with_reason("gap_days", (second.0 - first.0).num_days()),
            );
        }
        Ok(drafts)
    }
}
