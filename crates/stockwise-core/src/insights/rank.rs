//! Deterministic feed ordering

use std::cmp::Ordering;

use super::types::Insight;

/// Total order: urgency (high first), confidence descending, then detector
/// registration index and emission index ascending.
pub fn compare(a: &Insight, b: &Insight) -> Ordering {
    a.urgency
        .rank()
        .cmp(&b.urgency.rank())
        .then_with(|| b.confidence_score.cmp(&a.confidence_score))
        .then_with(|| a.origin.cmp(&b.origin))
}

/// Sort in place (stable, idempotent)
pub fn rank(insights: &mut [Insight]) {
    insights.sort_by(compare);
}
