//! Reorder timing detectors

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, Weekday};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::GroupBy;
use crate::insights::builders::{round2, CycleDetector, CycleFinding, CycleParams, CycleWindow};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency, DAYS_UNTIL_EVENT};
use crate::money;

use super::describe_days;

fn cycle(
    config: &EngineConfig,
    insight_type: InsightType,
    name: &'static str,
    group: GroupBy,
    emit: CycleWindow,
    render: fn(&CycleFinding, &AnalysisContext) -> Result<InsightDraft>,
) -> Arc<dyn Detector> {
    let r = &config.reorder;
    Arc::new(CycleDetector::new(CycleParams {
        insight_type,
        name,
        group,
        window_days: r.window_days,
        min_orders: r.min_orders,
        max_gap_days: r.max_gap_days,
        max_cov: r.max_cov,
        confidence_cap: r.confidence_cap,
        lead_days: r.lead_days,
        emit,
        render,
    }))
}

pub fn reorder_prediction(config: &EngineConfig) -> Arc<dyn Detector> {
    let emit = CycleWindow {
        from: -config.reorder.days_before,
        to: config.reorder.days_after,
    };
    cycle(
        config,
        InsightType::ReorderPrediction,
        "Reorder prediction",
        GroupBy::Sku,
        emit,
        render_reorder,
    )
}

fn render_reorder(f: &CycleFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let draft = InsightDraft::new(
        InsightType::ReorderPrediction,
        InsightScope::Sku(f.key.clone()),
        format!("Time to reorder {}", label),
        format!(
            "{} is ordered about every {:.0} days; the next order is due {} (order by {}).",
            label,
            f.mean_gap_days,
            describe_days(f.days_until),
            f.reorder_by
        ),
    );
    Ok(f.explain(draft)
        .with_urgency(f.urgency)
        .with_confidence(f.confidence)
        .with_value(f.mean_spend)
        .with_quantity(f.mean_quantity))
}

pub fn vendor_order_cycle(config: &EngineConfig) -> Arc<dyn Detector> {
    let emit = CycleWindow {
        from: -config.reorder.days_before,
        to: config.reorder.days_after,
    };
    cycle(
        config,
        InsightType::VendorOrderCycle,
        "Vendor order cycle",
        GroupBy::Vendor,
        emit,
        render_vendor_cycle,
    )
}

fn render_vendor_cycle(f: &CycleFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    let draft = InsightDraft::new(
        InsightType::VendorOrderCycle,
        InsightScope::Vendor(f.key.clone()),
        format!("{} order coming up", f.key),
        format!(
            "You order from {} about every {:.0} days; the next order is due {}.",
            f.key,
            f.mean_gap_days,
            describe_days(f.days_until)
        ),
    );
    Ok(f.explain(draft)
        .with_urgency(f.urgency)
        .with_confidence(f.confidence)
        .with_value(f.mean_spend))
}

pub fn missed_reorder(config: &EngineConfig) -> Arc<dyn Detector> {
    let emit = CycleWindow {
        from: -config.reorder.missed_max_days,
        to: -config.reorder.missed_min_days,
    };
    cycle(
        config,
        InsightType::MissedReorder,
        "Missed reorder",
        GroupBy::Sku,
        emit,
        render_missed,
    )
}

fn render_missed(f: &CycleFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let draft = InsightDraft::new(
        InsightType::MissedReorder,
        InsightScope::Sku(f.key.clone()),
        format!("{} not reordered", label),
        format!(
            "{} was due around {} and has not been ordered since {}. Forgotten, or switched?",
            label, f.predicted, f.last_order
        ),
    );
    Ok(f.explain(draft)
        .with_urgency(Urgency::Medium)
        .with_confidence(f.confidence * 0.8)
        .with_value(f.mean_spend)
        .with_quantity(f.mean_quantity))
}

pub fn order_day_pattern(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(OrderDayPattern {
        window_days: config.reorder.window_days,
        min_orders: config.reorder.order_day_min_orders,
        min_share: config.reorder.order_day_min_share,
    })
}

/// Vendors ordered mostly on one weekday, when that weekday is tomorrow
struct OrderDayPattern {
    window_days: i64,
    min_orders: usize,
    min_share: f64,
}

impl Detector for OrderDayPattern {
    fn insight_type(&self) -> InsightType {
        InsightType::OrderDayPattern
    }

    fn name(&self) -> &'static str {
        "Order day pattern"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_orders
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let tomorrow = (ctx.as_of + Duration::days(1)).weekday();

        let mut by_vendor: BTreeMap<String, Vec<(Weekday, i64)>> = BTreeMap::new();
        for order in ctx.history.orders(ctx.window(self.window_days)) {
            by_vendor
                .entry(order.vendor)
                .or_default()
                .push((order.date.weekday(), order.total));
        }

        let mut drafts = Vec::new();
        for (vendor, orders) in by_vendor {
            if orders.len() < self.min_orders {
                continue;
            }
            let mut counts = [0usize; 7];
            for (weekday, _) in &orders {
                counts[weekday.num_days_from_monday() as usize] += 1;
            }
            // First weekday wins a tie
            let mut usual = 0;
            for day in 1..7 {
                if counts[day] > counts[usual] {
                    usual = day;
                }
            }
            if usual != tomorrow.num_days_from_monday() as usize {
                continue;
            }
            let share = counts[usual] as f64 / orders.len() as f64;
            if share < self.min_share {
                continue;
            }

            let totals: Vec<i64> = orders.iter().map(|(_, total)| *total).collect();
            let average = money::average(&totals).unwrap_or(0);
            let draft = InsightDraft::new(
                InsightType::OrderDayPattern,
                InsightScope::Vendor(vendor.clone()),
                format!("Tomorrow is your usual {} order day", vendor),
                format!(
                    "{} of your last {} orders with {} were placed on a {}.",
                    counts[usual],
                    orders.len(),
                    vendor,
                    tomorrow
                ),
            )
            .with_urgency(Urgency::Medium)
            .with_confidence(40.0 + share * 50.0)
            .with_value(average)
            .with_reason("order_count", orders.len() as u64)
            .with_reason("weekday", tomorrow.to_string())
            .with_reason("weekday_orders", counts[usual] as u64)
            .with_reason("share_pct", round2(share * 100.0))
            .with_reason("average_order_total", average)
            .with_reason(DAYS_UNTIL_EVENT, 1);
            drafts.push(draft);
        }
        Ok(drafts)
    }
}
