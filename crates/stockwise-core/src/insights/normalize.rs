//! Detector output normalisation
//!
//! Turns [`InsightDraft`]s into [`Insight`]s with a uniform contract:
//! integer confidence in 0..=100, non-negative impact, non-empty reasoning.

use tracing::{debug, warn};

use super::types::{Insight, InsightDraft, Origin};

/// Round and clamp a raw confidence to 0..=100; non-finite values score 0
pub fn confidence_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Normalise one draft. Drafts without reasoning are rejected.
pub(crate) fn normalize(draft: InsightDraft, detector: usize, sequence: usize) -> Option<Insight> {
    if draft.reasoning.is_empty() {
        warn!(
            insight = draft.insight_type.as_str(),
            scope = %draft.scope,
            "Rejected insight without reasoning"
        );
        return None;
    }

    let estimated_value = if draft.estimated_value < 0 {
        debug!(
            insight = draft.insight_type.as_str(),
            scope = %draft.scope,
            value = draft.estimated_value,
            "Clamped negative impact to zero"
        );
        0
    } else {
        draft.estimated_value
    };

    Some(Insight {
        insight_type: draft.insight_type,
        scope: draft.scope,
        title: draft.title,
        detail: draft.detail,
        urgency: draft.urgency,
        suggested_quantity: draft.suggested_quantity.filter(|q| q.is_finite() && *q > 0.0),
        estimated_value_minor_units: estimated_value,
        confidence_score: confidence_score(draft.confidence),
        reasoning: draft.reasoning,
        origin: Origin {
            detector,
            sequence,
        },
    })
}

/// Normalise one detector's drafts, keeping emission order
pub(crate) fn normalize_all(drafts: Vec<InsightDraft>, detector: usize) -> Vec<Insight> {
    drafts
        .into_iter()
        .enumerate()
        .filter_map(|(sequence, draft)| normalize(draft, detector, sequence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::types::{InsightScope, InsightType, Urgency};

    fn draft() -> InsightDraft {
        InsightDraft::new(
            InsightType::PriceDrop,
            InsightScope::Sku("EGG".into()),
            "Eggs are cheaper",
            "detail",
        )
        .with_reason("recent_average", 850)
    }

    #[test]
    fn test_confidence_is_clamped_and_rounded() {
        assert_eq!(confidence_score(72.5), 73);
        assert_eq!(confidence_score(-4.0), 0);
        assert_eq!(confidence_score(180.0), 100);
        assert_eq!(confidence_score(f64::NAN), 0);
        assert_eq!(confidence_score(f64::INFINITY), 0);
    }

    #[test]
    fn test_negative_value_clamped() {
        let insight = normalize(draft().with_value(-500), 0, 0).unwrap();
        assert_eq!(insight.estimated_value_minor_units, 0);
    }

    #[test]
    fn test_empty_reasoning_rejected() {
        let mut d = draft();
        d.reasoning.clear();
        assert!(normalize(d, 0, 0).is_none());
    }

    #[test]
    fn test_origin_tracks_emission_order() {
        let mut empty = draft();
        empty.reasoning.clear();
        let insights = normalize_all(
            vec![draft(), empty, draft().with_urgency(Urgency::High)],
            4,
        );
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].origin, Origin { detector: 4, sequence: 0 });
        assert_eq!(insights[1].origin, Origin { detector: 4, sequence: 2 });
    }

    #[test]
    fn test_non_positive_quantity_dropped() {
        let insight = normalize(draft().with_quantity(0.0), 0, 0).unwrap();
        assert_eq!(insight.suggested_quantity, None);
    }
}
