//! Aggregation views over the ranked feed
//!
//! Views only filter; they keep the master ranking order and never re-score.

use super::types::{Insight, InsightType, Urgency};

/// Time-sensitive types always shown in the now-relevant view
pub const NOW_RELEVANT_TYPES: &[InsightType] = &[
    InsightType::ReorderPrediction,
    InsightType::PriceDrop,
    InsightType::DuplicateOrder,
    InsightType::OrderDayPattern,
    InsightType::BudgetPacing,
    InsightType::WeeklyPacing,
];

/// Planning types always shown in the week-planning view
pub const WEEK_PLANNING_TYPES: &[InsightType] = &[
    InsightType::ReorderPrediction,
    InsightType::VendorOrderCycle,
    InsightType::MissedReorder,
    InsightType::PriceDrop,
    InsightType::BulkBuying,
    InsightType::OrderConsolidation,
    InsightType::VendorConsolidation,
    InsightType::UsageIncrease,
    InsightType::InactiveItem,
    InsightType::UsageForecast,
    InsightType::SpendForecast,
    InsightType::SeasonalDemand,
    InsightType::BudgetPacing,
    InsightType::WeeklyPacing,
];

pub fn is_now_relevant(insight: &Insight) -> bool {
    NOW_RELEVANT_TYPES.contains(&insight.insight_type)
        || insight.urgency == Urgency::High
        || insight.days_until_event().is_some_and(|days| days <= 1)
}

pub fn is_week_planning(insight: &Insight, materiality_threshold: i64) -> bool {
    WEEK_PLANNING_TYPES.contains(&insight.insight_type)
        || matches!(insight.urgency, Urgency::Medium | Urgency::High)
        || insight.estimated_value_minor_units >= materiality_threshold
}

pub fn now_relevant(ranked: &[Insight]) -> Vec<Insight> {
    ranked.iter().filter(|i| is_now_relevant(i)).cloned().collect()
}

pub fn week_planning(ranked: &[Insight], materiality_threshold: i64) -> Vec<Insight> {
    ranked
        .iter()
        .filter(|i| is_week_planning(i, materiality_threshold))
        .cloned()
        .collect()
}
