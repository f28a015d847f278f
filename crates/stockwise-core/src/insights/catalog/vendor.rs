//! Vendor risk and diversity detectors

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::GroupBy;
use crate::insights::builders::{
    percent, round2, FirstSeen, FirstSeenParams, Inactivity, InactivityParams, PresenceFinding,
};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency};
use crate::models::UNCATEGORIZED;
use crate::money;
use crate::stats;

pub fn vendor_concentration(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(VendorConcentration {
        window_days: config.vendors.window_days,
        max_share: config.vendors.concentration_share,
        medium_share: config.vendors.concentration_medium_share,
        min_orders: config.vendors.concentration_min_orders,
    })
}

/// One vendor taking most of the spend
struct VendorConcentration {
    window_days: i64,
    max_share: f64,
    medium_share: f64,
    min_orders: usize,
}

impl Detector for VendorConcentration {
    fn insight_type(&self) -> InsightType {
        InsightType::VendorConcentration
    }

    fn name(&self) -> &'static str {
        "Vendor concentration"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let totals = ctx.history.vendor_totals(ctx.window(self.window_days));
        let spend: i64 = totals.values().map(|t| t.spend).sum();
        let orders: usize = totals.values().map(|t| t.orders).sum();
        if totals.len() < 2 && orders < self.min_orders {
            return Ok(Vec::new());
        }

        let mut drafts = Vec::new();
        for (vendor, total) in &totals {
            let Some(share) = stats::share(total.spend as f64, spend as f64) else {
                continue;
            };
            if share <= self.max_share {
                continue;
            }
            let urgency = if share >= self.medium_share {
                Urgency::Medium
            } else {
                Urgency::Low
            };
            drafts.push(
                InsightDraft::new(
                    InsightType::VendorConcentration,
                    InsightScope::Vendor(vendor.clone()),
                    format!("{} takes {} of your spend", vendor, percent(share)),
                    format!(
                        "{} of {} spent in the last {} days went to {}. A second supplier would reduce the risk of a disruption.",
                        money::format_minor(total.spend),
                        money::format_minor(spend),
                        self.window_days,
                        vendor
                    ),
                )
                .with_urgency(urgency)
                .with_confidence(50.0 + share * 40.0)
                .with_reason("vendor_spend", total.spend)
                .with_reason("total_spend", spend)
                .with_reason("share_pct", round2(share * 100.0))
                .with_reason("vendor_count", totals.len() as u64)
                .with_reason("order_count", orders as u64),
            );
        }
        Ok(drafts)
    }
}

pub fn single_source_item(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(SingleSource {
        insight_type: InsightType::SingleSourceItem,
        name: "Single-source item",
        group: GroupBy::Sku,
        window_days: config.vendors.window_days,
        min_orders: config.vendors.single_source_min_orders,
        min_spend: config.materiality_threshold,
    })
}

pub fn category_single_source(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(SingleSource {
        insight_type: InsightType::CategorySingleSource,
        name: "Category single source",
        group: GroupBy::Category,
        window_days: config.vendors.window_days,
        min_orders: config.vendors.single_source_min_orders,
        min_spend: config.materiality_threshold,
    })
}

/// Material SKUs or categories supplied by exactly one vendor
struct SingleSource {
    insight_type: InsightType,
    name: &'static str,
    group: GroupBy,
    window_days: i64,
    min_orders: usize,
    min_spend: i64,
}

impl Detector for SingleSource {
    fn insight_type(&self) -> InsightType {
        self.insight_type
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_orders
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (key, total) in ctx.history.totals(ctx.window(self.window_days), self.group) {
            if self.group == GroupBy::Category && key == UNCATEGORIZED {
                continue;
            }
            if total.orders < self.min_orders || total.spend < self.min_spend {
                continue;
            }
            let Some(vendor) = total.vendors.iter().next() else {
                continue;
            };
            if total.vendors.len() != 1 {
                continue;
            }

            let (scope, label) = match self.group {
                GroupBy::Sku => (InsightScope::Sku(key.clone()), ctx.history.sku_label(&key)),
                _ => (InsightScope::Category(key.clone()), key.clone()),
            };
            drafts.push(
                InsightDraft::new(
                    self.insight_type,
                    scope,
                    format!("{} comes only from {}", label, vendor),
                    format!(
                        "All {} orders of {} in the last {} days went to {}. Line up a backup supplier.",
                        total.orders, label, self.window_days, vendor
                    ),
                )
                .with_confidence((55.0 + total.orders as f64 * 3.0).min(85.0))
                .with_reason("vendor", vendor.as_str())
                .with_reason("order_count", total.orders as u64)
                .with_reason("spend", total.spend),
            );
        }
        Ok(drafts)
    }
}

pub fn vendor_inactive(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(Inactivity::new(InactivityParams {
        insight_type: InsightType::VendorInactive,
        name: "Vendor inactive",
        group: GroupBy::Vendor,
        window_days: config.inventory.inactivity_window_days,
        inactive_days: config.vendors.inactive_days,
        min_orders: config.vendors.inactive_min_orders,
        render: render_vendor_inactive,
    }))
}

fn render_vendor_inactive(f: &PresenceFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::VendorInactive,
            InsightScope::Vendor(f.key.clone()),
            format!("No orders from {} lately", f.key),
            format!(
                "You ordered from {} {} times but not in the last {} days.",
                f.key, f.total.orders, f.days_since_last
            ),
        ))
        .with_confidence((50.0 + f.total.orders as f64 * 4.0).min(85.0)))
}

pub fn new_vendor(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(FirstSeen::new(FirstSeenParams {
        insight_type: InsightType::NewVendor,
        name: "New vendor",
        group: GroupBy::Vendor,
        window_days: config.inventory.inactivity_window_days,
        recent_days: config.vendors.new_vendor_days,
        min_spend: 0,
        render: render_new_vendor,
    }))
}

fn render_new_vendor(f: &PresenceFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::NewVendor,
            InsightScope::Vendor(f.key.clone()),
            format!("New vendor: {}", f.key),
            format!(
                "First order from {} on {}; {} spent so far.",
                f.key,
                f.first_date,
                money::format_minor(f.total.spend)
            ),
        ))
        .with_confidence(60.0))
}
