//! Parameterised detector shapes shared by the catalog
//!
//! - [`CycleDetector`] - regularity of per-key order dates
//! - [`WindowDelta`] - one window against another, per key
//! - [`TrailingOutlier`] - an observation against its trailing average
//! - [`Inactivity`] / [`FirstSeen`] - keys that went quiet or just appeared
//! - [`PacingDetector`] - period-to-date run rate against a trailing baseline
//!
//! Each builder computes a finding and hands it to a plain `fn` supplied by
//! the catalog, which turns it into an [`InsightDraft`](super::InsightDraft).

mod cycle;
mod delta;
mod inactivity;
mod outlier;
mod pacing;

pub use cycle::{CycleDetector, CycleFinding, CycleParams, CycleWindow};
pub use delta::{Baseline, Bound, DeltaFinding, DeltaParams, Direction, Metric, WindowDelta};
pub use inactivity::{FirstSeen, FirstSeenParams, Inactivity, InactivityParams, PresenceFinding};
pub use outlier::{Observation, OutlierFinding, OutlierParams, Subject, TrailingOutlier};
pub use pacing::{PacingDetector, PacingFinding, PacingParams, Period};

use super::types::Urgency;

/// Confidence from how far past its threshold a change is and how much data backs it.
/// Ranges 45..=95.
pub fn strength_confidence(change: f64, threshold: f64, observations: usize) -> f64 {
    let strength = if threshold > 0.0 {
        (change.abs() / threshold).min(3.0)
    } else {
        1.0
    };
    45.0 + strength * 10.0 + observations.min(10) as f64 * 2.0
}

/// Urgency from days left before something must happen
pub fn urgency_for_days(days_left: i64) -> Urgency {
    if days_left <= 0 {
        Urgency::High
    } else if days_left <= 3 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

/// Percentage with one decimal, e.g. `0.1534` -> `"15.3%"`
pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Two-decimal rounding for reasoning values
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_confidence_bounds() {
        assert_eq!(strength_confidence(0.10, 0.10, 0), 55.0);
        assert_eq!(strength_confidence(5.0, 0.10, 50), 95.0);
    }

    #[test]
    fn test_urgency_for_days() {
        assert_eq!(urgency_for_days(-2), Urgency::High);
        assert_eq!(urgency_for_days(0), Urgency::High);
        assert_eq!(urgency_for_days(2), Urgency::Medium);
        assert_eq!(urgency_for_days(4), Urgency::Low);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.1534), "15.3%");
        assert_eq!(round2(1.23456), 1.23);
    }
}
