//! The standard detector catalog
//!
//! Registration order here is the final ranking tie-break, and matches
//! [`InsightType::all`](super::InsightType::all).
//!
//! Detectors built from the shared shapes in [`super::builders`] only supply
//! parameters and a render function; the rest are small structs implementing
//! [`Detector`] directly.

mod forecasting;
mod inventory;
mod ordering;
mod pacing;
mod pricing;
mod timing;
mod vendor;

use std::sync::Arc;

use crate::config::EngineConfig;

use super::engine::Detector;
use super::types::Urgency;

/// Build every standard detector from `config`.
///
/// Thresholds are copied out of the configuration here; later changes to a
/// config value do not affect detectors already built.
pub fn standard(config: &EngineConfig) -> Vec<Arc<dyn Detector>> {
    vec![
        // Timing
        timing::reorder_prediction(config),
        timing::vendor_order_cycle(config),
        timing::missed_reorder(config),
        timing::order_day_pattern(config),
        // Pricing
        pricing::price_anomaly(config),
        pricing::price_drop(config),
        pricing::price_trend(config),
        pricing::price_volatility(config),
        pricing::vendor_price_comparison(config),
        pricing::vendor_price_increase(config),
        pricing::category_spend_spike(config),
        pricing::category_spend_drop(config),
        pricing::vendor_spend_spike(config),
        pricing::rebate_opportunity(config),
        // Ordering
        ordering::bulk_buying(config),
        ordering::vendor_consolidation(config),
        ordering::order_consolidation(config),
        ordering::small_order(config),
        ordering::duplicate_order(config),
        // Inventory
        inventory::usage_increase(config),
        inventory::usage_decrease(config),
        inventory::over_ordering(config),
        inventory::inactive_item(config),
        inventory::waste_risk(config),
        inventory::new_item(config),
        // Vendor
        vendor::vendor_concentration(config),
        vendor::single_source_item(config),
        vendor::category_single_source(config),
        vendor::vendor_inactive(config),
        vendor::new_vendor(config),
        // Forecasting
        forecasting::usage_forecast(config),
        forecasting::spend_forecast(config),
        forecasting::seasonal_demand(config),
        forecasting::year_over_year(config),
        // Pacing
        pacing::budget_pacing(config),
        pacing::weekly_pacing(config),
        pacing::order_frequency_change(config),
        pacing::large_purchase(config),
    ]
}

/// "overdue by 3 days", "today", "tomorrow", "in 5 days"
pub(crate) fn describe_days(days: i64) -> String {
    match days {
        d if d < -1 => format!("overdue by {} days", -d),
        -1 => "overdue by 1 day".to_string(),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d => format!("in {} days", d),
    }
}

/// Slack for changes that land on a multiple but round just under it
const MULTIPLE_EPSILON: f64 = 1e-9;

/// Whether a change is at least `multiple` times its threshold
pub(crate) fn reaches_multiple(change: f64, threshold: f64, multiple: f64) -> bool {
    threshold > 0.0 && change.abs() >= threshold * multiple - MULTIPLE_EPSILON
}

/// Urgency from how many times over its threshold a change is
pub(crate) fn severity_urgency(
    change: f64,
    threshold: f64,
    medium_multiple: f64,
    high_multiple: f64,
) -> Urgency {
    if reaches_multiple(change, threshold, high_multiple) {
        Urgency::High
    } else if reaches_multiple(change, threshold, medium_multiple) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightType;

    #[test]
    fn test_standard_catalog_order() {
        let detectors = standard(&EngineConfig::default());
        let types: Vec<InsightType> = detectors.iter().map(|d| d.insight_type()).collect();
        assert_eq!(types.len(), 38);
        assert_eq!(types, InsightType::all().to_vec());
    }

    #[test]
    fn test_detector_names_are_unique() {
        let detectors = standard(&EngineConfig::default());
        let mut names: Vec<&str> = detectors.iter().map(|d| d.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 38);
    }

    #[test]
    fn test_lookbacks_are_positive() {
        for detector in standard(&EngineConfig::default()) {
            assert!(detector.lookback_days() > 0, "{}", detector.name());
        }
    }

    #[test]
    fn test_describe_days() {
        assert_eq!(describe_days(-3), "overdue by 3 days");
        assert_eq!(describe_days(-1), "overdue by 1 day");
        assert_eq!(describe_days(0), "today");
        assert_eq!(describe_days(1), "tomorrow");
        assert_eq!(describe_days(6), "in 6 days");
    }

    #[test]
    fn test_severity_urgency() {
        assert_eq!(severity_urgency(0.10, 0.10, 1.5, 3.0), Urgency::Low);
        assert_eq!(severity_urgency(0.149, 0.10, 1.5, 3.0), Urgency::Low);
        assert_eq!(severity_urgency(0.15, 0.10, 1.5, 3.0), Urgency::Medium);
        assert_eq!(severity_urgency(-0.30, 0.10, 1.5, 3.0), Urgency::High);
        assert_eq!(severity_urgency(0.20, 0.10, 2.0, 4.0), Urgency::Medium);
        assert_eq!(severity_urgency(0.30, 0.10, 2.0, 4.0), Urgency::Medium);
        assert_eq!(severity_urgency(0.50, 0.0, 1.5, 3.0), Urgency::Low);
    }

    #[test]
    fn test_reaches_multiple_on_inexact_products() {
        // boundaries must not depend on how f64 rounds the product
        assert!(reaches_multiple(0.15, 0.10, 1.5));
        assert!(reaches_multiple(0.30, 0.15, 2.0));
        assert!(reaches_multiple(0.75, 0.25, 3.0));
        // 0.7 - 0.4 is 0.29999999999999993 while 0.1 * 3.0 is 0.30000000000000004
        assert!(reaches_multiple(0.7 - 0.4, 0.1, 3.0));
        assert!(!reaches_multiple(0.29, 0.15, 2.0));
    }
}
