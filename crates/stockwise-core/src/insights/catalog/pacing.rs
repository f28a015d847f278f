//! Budget pacing and order-rate detectors

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::GroupBy;
use crate::insights::builders::{
    percent, Baseline, Bound, DeltaFinding, DeltaParams, Direction, Metric, OutlierFinding,
    OutlierParams, PacingDetector, PacingFinding, PacingParams, Period, Subject, TrailingOutlier,
    WindowDelta,
};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency};
use crate::money;

use super::reaches_multiple;

fn pacing(
    config: &EngineConfig,
    insight_type: InsightType,
    name: &'static str,
    period: Period,
) -> Arc<dyn Detector> {
    let p = &config.pacing;
    Arc::new(PacingDetector::new(PacingParams {
        insight_type,
        name,
        period,
        trailing_days: p.trailing_days,
        overage_threshold: p.overage_threshold,
        min_elapsed_days: p.min_elapsed_days,
        render: render_pacing,
    }))
}

pub fn budget_pacing(config: &EngineConfig) -> Arc<dyn Detector> {
    pacing(config, InsightType::BudgetPacing, "Budget pacing", Period::Month)
}

pub fn weekly_pacing(config: &EngineConfig) -> Arc<dyn Detector> {
    pacing(config, InsightType::WeeklyPacing, "Weekly pacing", Period::IsoWeek)
}

fn render_pacing(f: &PacingFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let insight_type = match f.period {
        Period::Month => InsightType::BudgetPacing,
        Period::IsoWeek => InsightType::WeeklyPacing,
    };
    let high_multiple = ctx.config.pacing.overage_high_multiple;
    let urgency = if reaches_multiple(f.overage, f.threshold, high_multiple) {
        Urgency::High
    } else {
        Urgency::Medium
    };
    Ok(f
        .explain(InsightDraft::new(
            insight_type,
            InsightScope::Global,
            format!("Spending {} ahead this {}", percent(f.overage), f.period.as_str()),
            format!(
                "{} spent in the first {} days puts this {} on course for {}, against a typical {}.",
                money::format_minor(f.to_date),
                f.elapsed_days,
                f.period.as_str(),
                money::format_minor(f.projected),
                money::format_minor(f.typical)
            ),
        ))
        .with_urgency(urgency)
        .with_confidence(f.confidence)
        .with_value(f.excess()))
}

pub fn order_frequency_change(config: &EngineConfig) -> Arc<dyn Detector> {
    let p = &config.pacing;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type: InsightType::OrderFrequencyChange,
        name: "Order frequency change",
        group: GroupBy::Global,
        metric: Metric::Orders,
        recent_days: p.order_frequency_days,
        baseline: Baseline::Preceding(p.order_frequency_days),
        direction: Direction::Increase,
        threshold: p.order_frequency_threshold,
        bound: Bound::AtLeast,
        filter: None,
        gate: None,
        render: render_order_frequency,
    }))
}

fn render_order_frequency(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let extra = f.recent.orders.saturating_sub(f.baseline.orders) as i64;
    let admin_cost = ctx.config.ordering.admin_cost_per_order;
    Ok(f
        .explain(InsightDraft::new(
            InsightType::OrderFrequencyChange,
            InsightScope::Global,
            format!("Ordering {} more often", f.change_label()),
            format!(
                "You placed {} orders in the last {} days, against {} the period before.",
                f.recent.orders,
                f.recent_window.days(),
                f.baseline.orders
            ),
        ))
        .with_confidence(f.confidence)
        .with_value(admin_cost * extra)
        .with_reason("extra_orders", extra)
        .with_reason("admin_cost_per_order", admin_cost))
}

pub fn large_purchase(config: &EngineConfig) -> Arc<dyn Detector> {
    let p = &config.pacing;
    Arc::new(TrailingOutlier::new(OutlierParams {
        insight_type: InsightType::LargePurchase,
        name: "Large purchase",
        subject: Subject::OrderTotal,
        window_days: config.ordering.window_days,
        trailing: p.large_purchase_trailing_orders,
        min_history: p.large_purchase_min_history,
        recent_days: p.large_purchase_recent_days,
        threshold: p.large_purchase_threshold,
        latest_only: false,
        render: render_large_purchase,
    }))
}

fn render_large_purchase(f: &OutlierFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    let vendor = f.observation.vendor.clone().unwrap_or_default();
    let total = money::to_minor_units(f.observation.value)?;
    let mut draft = f
        .explain(InsightDraft::new(
            InsightType::LargePurchase,
            InsightScope::Vendor(vendor.clone()),
            format!("Unusually large order from {}", vendor),
            format!(
                "The {} order from {} came to {}, {} above your recent average of {}.",
                f.observation.date,
                vendor,
                money::format_minor(total),
                percent(f.change),
                money::format_minor(money::to_minor_units(f.trailing_average)?)
            ),
        ))
        .with_urgency(Urgency::Medium)
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(f.excess())?);
    if let Some(id) = f.observation.purchase_id {
        draft = draft.with_reason("purchase_id", id);
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{date, item, HistoryBuilder};

    fn june() -> AnalysisContext {
        HistoryBuilder::new(date(2026, 6, 10))
            .purchase_on(date(2026, 3, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 5, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 6, 5), "Sysco", vec![item("BULK", 1.0, 400_000)])
            .context()
    }

    #[test]
    fn test_budget_pacing_scenario() {
        let ctx = june();
        let drafts = budget_pacing(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.insight_type, InsightType::BudgetPacing);
        assert_eq!(draft.urgency, Urgency::Medium);
        assert_eq!(draft.estimated_value, 200_000);
        assert_eq!(draft.reasoning["typical_spend"], 1_000_000);
        assert_eq!(draft.reasoning["projected_spend"], 1_200_000);
    }

    #[test]
    fn test_budget_pacing_high_at_double_threshold() {
        let ctx = HistoryBuilder::new(date(2026, 6, 10))
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 3_000_000)])
            .purchase_on(date(2026, 6, 5), "Sysco", vec![item("BULK", 1.0, 500_000)])
            .context();
        let drafts = budget_pacing(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].urgency, Urgency::High);
    }

    #[test]
    fn test_budget_pacing_high_multiple_is_configurable() {
        let mut config = EngineConfig::default();
        config.pacing.overage_high_multiple = 1.2;
        let ctx = HistoryBuilder::new(date(2026, 6, 10))
            .purchase_on(date(2026, 3, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 5, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 6, 5), "Sysco", vec![item("BULK", 1.0, 400_000)])
            .context_with(config);
        let drafts = budget_pacing(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts[0].urgency, Urgency::High);
    }

    #[test]
    fn test_weekly_pacing() {
        // Wednesday; the week started Monday 2026-06-08
        let mut b = HistoryBuilder::new(date(2026, 6, 10));
        for days_ago in (10..100).step_by(10) {
            b = b.order(days_ago, "Sysco", "BULK", 1.0, 70_000);
        }
        let ctx = b.order(1, "Sysco", "BULK", 1.0, 100_000).context();
        let drafts = weekly_pacing(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].insight_type, InsightType::WeeklyPacing);
    }

    #[test]
    fn test_order_frequency_change() {
        let mut b = HistoryBuilder::new(date(2026, 6, 30));
        for days_ago in [50, 40] {
            b = b.order(days_ago, "Sysco", "EGG", 1.0, 300);
        }
        for days_ago in [25, 20, 15, 10] {
            b = b.order(days_ago, "Sysco", "EGG", 1.0, 300);
        }
        let ctx = b.context();
        let drafts = order_frequency_change(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 5_000);
    }

    #[test]
    fn test_order_frequency_counts_exactly_fifty_percent() {
        let mut b = HistoryBuilder::new(date(2026, 6, 30));
        for days_ago in [50, 40, 25, 20, 15] {
            b = b.order(days_ago, "Sysco", "EGG", 1.0, 300);
        }
        let ctx = b.context();
        assert_eq!(order_frequency_change(&ctx.config).analyze(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_large_purchase_at_exactly_triple_is_not_flagged() {
        let mut b = HistoryBuilder::new(date(2026, 6, 30));
        for days_ago in [60, 50, 40, 30, 20] {
            b = b.order(days_ago, "Sysco", "EGG", 10.0, 1_000);
        }
        let ctx = b.order(2, "Metro", "OVEN", 1.0, 30_000).context();
        assert!(large_purchase(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_large_purchase() {
        let mut b = HistoryBuilder::new(date(2026, 6, 30));
        for days_ago in [60, 50, 40, 30, 20] {
            b = b.order(days_ago, "Sysco", "EGG", 10.0, 1_000);
        }
        let ctx = b.order(2, "Metro", "OVEN", 1.0, 40_000).context();
        let drafts = large_purchase(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Vendor("Metro".to_string()));
        assert_eq!(drafts[0].estimated_value, 30_000);
    }
}
