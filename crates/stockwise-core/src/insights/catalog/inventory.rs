//! Usage, waste and inventory detectors

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::GroupBy;
use crate::insights::builders::{
    percent, round2, Baseline, Bound, DeltaFinding, DeltaParams, Direction, FirstSeen,
    FirstSeenParams, Inactivity, InactivityParams, Metric, OutlierFinding, OutlierParams,
    PresenceFinding, Subject, TrailingOutlier, WindowDelta,
};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency};
use crate::money;

use super::reaches_multiple;

fn quantity_delta(
    insight_type: InsightType,
    name: &'static str,
    group: GroupBy,
    days: i64,
    direction: Direction,
    threshold: f64,
) -> DeltaParams {
    DeltaParams {
        insight_type,
        name,
        group,
        metric: Metric::Quantity,
        recent_days: days,
        baseline: Baseline::Preceding(days),
        direction,
        threshold,
        bound: Bound::AtLeast,
        filter: None,
        gate: None,
        render: render_usage_increase,
    }
}

pub fn usage_increase(config: &EngineConfig) -> Arc<dyn Detector> {
    let inv = &config.inventory;
    Arc::new(WindowDelta::new(DeltaParams {
        gate: Some(outpaces_ordering),
        render: render_usage_increase,
        ..quantity_delta(
            InsightType::UsageIncrease,
            "Usage increase",
            GroupBy::Sku,
            inv.usage_comparison_days,
            Direction::Increase,
            inv.usage_increase_threshold,
        )
    }))
}

/// Quantity growing while order count does not keep up
fn outpaces_ordering(f: &DeltaFinding) -> bool {
    f.change_in(Metric::Orders)
        .map_or(false, |orders| orders < f.change / 2.0)
}

fn render_usage_increase(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let price = f.recent.average_unit_price().unwrap_or(0.0);
    let extra = f.recent.quantity - f.baseline.quantity;
    let inv = &ctx.config.inventory;
    let urgency = if reaches_multiple(
        f.change,
        inv.usage_increase_threshold,
        inv.usage_increase_medium_multiple,
    ) {
        Urgency::Medium
    } else {
        Urgency::Low
    };
    Ok(f
        .explain(InsightDraft::new(
            InsightType::UsageIncrease,
            InsightScope::Sku(f.key.clone()),
            format!("{} usage up {}", label, f.change_label()),
            format!(
                "You bought {} units of {} in the last {} days against {} before, without ordering more often. Watch for stockouts.",
                round2(f.recent.quantity),
                label,
                f.recent_window.days(),
                round2(f.baseline.quantity)
            ),
        ))
        .with_urgency(urgency)
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(extra * price)?)
        .with_reason("recent_orders", f.recent.orders as u64)
        .with_reason("baseline_orders", f.baseline.orders as u64))
}

pub fn usage_decrease(config: &EngineConfig) -> Arc<dyn Detector> {
    let inv = &config.inventory;
    Arc::new(WindowDelta::new(DeltaParams {
        render: render_usage_decrease,
        ..quantity_delta(
            InsightType::UsageDecrease,
            "Usage decrease",
            GroupBy::Sku,
            inv.usage_comparison_days,
            Direction::Decrease,
            inv.usage_decrease_threshold,
        )
    }))
}

fn render_usage_decrease(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let price = f.baseline.average_unit_price().unwrap_or(0.0);
    let drop = f.baseline.quantity - f.recent.quantity;
    Ok(f
        .explain(InsightDraft::new(
            InsightType::UsageDecrease,
            InsightScope::Sku(f.key.clone()),
            format!("{} usage down {}", label, f.change_label()),
            format!(
                "You bought {} units of {} in the last {} days against {} before. Check for overstock before the next order.",
                round2(f.recent.quantity),
                label,
                f.recent_window.days(),
                round2(f.baseline.quantity)
            ),
        ))
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(drop * price)?))
}

pub fn over_ordering(config: &EngineConfig) -> Arc<dyn Detector> {
    let inv = &config.inventory;
    Arc::new(TrailingOutlier::new(OutlierParams {
        insight_type: InsightType::OverOrdering,
        name: "Over-ordering",
        subject: Subject::SkuQuantity,
        window_days: config.ordering.window_days,
        trailing: usize::MAX,
        min_history: inv.over_ordering_min_history,
        recent_days: inv.over_ordering_recent_days,
        threshold: inv.over_ordering_threshold,
        latest_only: true,
        render: render_over_ordering,
    }))
}

fn render_over_ordering(f: &OutlierFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let price = ctx
        .history
        .sku_totals(ctx.window(ctx.config.ordering.window_days))
        .get(&f.key)
        .and_then(|t| t.average_unit_price())
        .unwrap_or(0.0);
    Ok(f
        .explain(InsightDraft::new(
            InsightType::OverOrdering,
            InsightScope::Sku(f.key.clone()),
            format!("Large order of {}", label),
            format!(
                "The {} order of {} was {} units, {} above your usual {}.",
                f.observation.date,
                label,
                round2(f.observation.value),
                percent(f.change),
                round2(f.trailing_average)
            ),
        ))
        .with_urgency(Urgency::Medium)
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(f.excess() * price)?)
        .with_quantity(f.trailing_average))
}

pub fn inactive_item(config: &EngineConfig) -> Arc<dyn Detector> {
    let inv = &config.inventory;
    Arc::new(Inactivity::new(InactivityParams {
        insight_type: InsightType::InactiveItem,
        name: "Inactive item",
        group: GroupBy::Sku,
        window_days: inv.inactivity_window_days,
        inactive_days: inv.inactive_days,
        min_orders: inv.inactive_min_orders,
        render: render_inactive_item,
    }))
}

fn render_inactive_item(f: &PresenceFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    Ok(f
        .explain(InsightDraft::new(
            InsightType::InactiveItem,
            InsightScope::Sku(f.key.clone()),
            format!("{} not ordered lately", label),
            format!(
                "{} was ordered {} times but not in the last {} days. Still on the menu?",
                label, f.total.orders, f.days_since_last
            ),
        ))
        .with_confidence((50.0 + f.total.orders as f64 * 5.0).min(85.0)))
}

pub fn waste_risk(config: &EngineConfig) -> Arc<dyn Detector> {
    let inv = &config.inventory;
    Arc::new(WindowDelta::new(DeltaParams {
        bound: Bound::Exceeds,
        filter: Some(is_perishable),
        render: render_waste_risk,
        ..quantity_delta(
            InsightType::WasteRisk,
            "Waste risk",
            GroupBy::Category,
            inv.usage_comparison_days,
            Direction::Increase,
            inv.waste_risk_threshold,
        )
    }))
}

fn is_perishable(category: &str, ctx: &AnalysisContext) -> bool {
    ctx.config
        .inventory
        .perishable_categories
        .iter()
        .any(|p| p.eq_ignore_ascii_case(category))
}

fn render_waste_risk(f: &DeltaFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    let price = f.recent.spend as f64 / f.recent.quantity.max(1.0);
    let extra = f.recent.quantity - f.baseline.quantity;
    Ok(f
        .explain(InsightDraft::new(
            InsightType::WasteRisk,
            InsightScope::Category(f.key.clone()),
            format!("{} volume up {}", f.key, f.change_label()),
            format!(
                "{} is perishable and you bought {} more of it than the period before. Check it is being used before it spoils.",
                f.key,
                f.change_label()
            ),
        ))
        .with_urgency(Urgency::Medium)
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(extra * price)?))
}

pub fn new_item(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(FirstSeen::new(FirstSeenParams {
        insight_type: InsightType::NewItem,
        name: "New item",
        group: GroupBy::Sku,
        window_days: config.inventory.inactivity_window_days,
        recent_days: config.inventory.new_item_days,
        min_spend: config.materiality_threshold,
        render: render_new_item,
    }))
}

fn render_new_item(f: &PresenceFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    Ok(f
        .explain(InsightDraft::new(
            InsightType::NewItem,
            InsightScope::Sku(f.key.clone()),
            format!("New item: {}", label),
            format!(
                "{} was first ordered on {} and has cost {} so far.",
                label,
                f.first_date,
                money::format_minor(f.total.spend)
            ),
        ))
        .with_confidence(60.0)
        .with_value(f.total.spend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{categorized, date, HistoryBuilder};

    fn builder() -> HistoryBuilder {
        HistoryBuilder::new(date(2026, 6, 30))
    }

    #[test]
    fn test_usage_increase_without_more_orders() {
        let ctx = builder()
            .order(50, "Sysco", "FRIES", 5.0, 400)
            .order(40, "Sysco", "FRIES", 5.0, 400)
            .order(20, "Sysco", "FRIES", 10.0, 400)
            .order(10, "Sysco", "FRIES", 10.0, 400)
            .context();
        let drafts = usage_increase(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 4_000);
        assert_eq!(drafts[0].urgency, Urgency::Medium);
    }

    #[test]
    fn test_usage_increase_counts_exactly_twenty_percent() {
        let ctx = builder()
            .order(50, "Sysco", "FRIES", 5.0, 400)
            .order(40, "Sysco", "FRIES", 5.0, 400)
            .order(20, "Sysco", "FRIES", 6.0, 400)
            .order(10, "Sysco", "FRIES", 6.0, 400)
            .context();
        let drafts = usage_increase(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].urgency, Urgency::Low);
    }

    #[test]
    fn test_usage_increase_medium_multiple_is_configurable() {
        let mut config = EngineConfig::default();
        config.inventory.usage_increase_medium_multiple = 6.0;
        let ctx = builder()
            .order(50, "Sysco", "FRIES", 5.0, 400)
            .order(40, "Sysco", "FRIES", 5.0, 400)
            .order(20, "Sysco", "FRIES", 10.0, 400)
            .order(10, "Sysco", "FRIES", 10.0, 400)
            .context_with(config);
        let drafts = usage_increase(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts[0].urgency, Urgency::Low);
    }

    #[test]
    fn test_usage_increase_from_more_orders_is_not_flagged() {
        let ctx = builder()
            .order(50, "Sysco", "FRIES", 5.0, 400)
            .order(20, "Sysco", "FRIES", 5.0, 400)
            .order(15, "Sysco", "FRIES", 5.0, 400)
            .context();
        assert!(usage_increase(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_usage_decrease() {
        let ctx = builder()
            .order(45, "Sysco", "CREAM", 20.0, 500)
            .order(10, "Sysco", "CREAM", 10.0, 500)
            .context();
        let drafts = usage_decrease(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 5_000);
    }

    #[test]
    fn test_over_ordering() {
        let ctx = builder()
            .order(60, "Sysco", "LETTUCE", 10.0, 200)
            .order(40, "Sysco", "LETTUCE", 10.0, 200)
            .order(20, "Sysco", "LETTUCE", 10.0, 200)
            .order(3, "Sysco", "LETTUCE", 25.0, 200)
            .context();
        let drafts = over_ordering(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].suggested_quantity, Some(10.0));
        assert_eq!(drafts[0].estimated_value, 3_000);
    }

    #[test]
    fn test_inactive_item() {
        let ctx = builder()
            .order(150, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(120, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(90, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(5, "Sysco", "EGG", 1.0, 300)
            .context();
        let drafts = inactive_item(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Sku("SAFFRON".to_string()));
        assert_eq!(drafts[0].estimated_value, 0);
    }

    #[test]
    fn test_waste_risk_only_for_perishables() {
        let ctx = builder()
            .purchase(45, "Sysco", vec![categorized("LETTUCE", 10.0, 200, "Produce")])
            .purchase(5, "Sysco", vec![categorized("LETTUCE", 20.0, 200, "Produce")])
            .purchase(45, "Sysco", vec![categorized("RICE", 10.0, 200, "Dry Goods")])
            .purchase(5, "Sysco", vec![categorized("RICE", 20.0, 200, "Dry Goods")])
            .context();
        let drafts = waste_risk(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Category("Produce".to_string()));
        assert_eq!(drafts[0].estimated_value, 2_000);
    }

    #[test]
    fn test_waste_risk_at_exactly_forty_percent_is_not_flagged() {
        let ctx = builder()
            .purchase(45, "Sysco", vec![categorized("LETTUCE", 10.0, 200, "Produce")])
            .purchase(5, "Sysco", vec![categorized("LETTUCE", 14.0, 200, "Produce")])
            .context();
        assert!(waste_risk(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_new_item_needs_material_spend() {
        let ctx = builder()
            .order(10, "Sysco", "TRUFFLE", 1.0, 20_000)
            .order(10, "Sysco", "CHIVES", 1.0, 200)
            .order(100, "Sysco", "EGG", 1.0, 300)
            .order(5, "Sysco", "EGG", 1.0, 300)
            .context();
        let drafts = new_item(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Sku("TRUFFLE".to_string()));
        assert_eq!(drafts[0].estimated_value, 20_000);
    }
}
