//! Engine configuration
//!
//! Every threshold a detector compares against is a named field here;
//! detectors copy the values they need when the catalog is built.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an explicit path, or the override in the data dir
//!    (~/.local/share/stockwise/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Files may be partial; missing keys take their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Impact (minor units) at which an insight is considered material
    pub materiality_threshold: i64,
    /// Case-insensitive vendor-name substrings removed from every analysis
    pub excluded_vendors: Vec<String>,
    pub reorder: ReorderConfig,
    pub pricing: PricingConfig,
    pub ordering: OrderingConfig,
    pub inventory: InventoryConfig,
    pub vendors: VendorConfig,
    pub forecast: ForecastConfig,
    pub pacing: PacingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 5_000,
            excluded_vendors: vec!["rental".to_string(), "leasing".to_string()],
            reorder: ReorderConfig::default(),
            pricing: PricingConfig::default(),
            ordering: OrderingConfig::default(),
            inventory: InventoryConfig::default(),
            vendors: VendorConfig::default(),
            forecast: ForecastConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Reorder-cycle prediction and ordering-day thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    pub window_days: i64,
    pub min_orders: usize,
    /// Gaps longer than this are treated as outliers and dropped
    pub max_gap_days: i64,
    /// Cycles with a higher coefficient of variation are too irregular to predict
    pub max_cov: f64,
    /// Emit when the predicted date is at most this many days in the past
    pub days_before: i64,
    /// Emit when the predicted date is at most this many days ahead
    pub days_after: i64,
    /// Days between placing an order and needing the goods
    pub lead_days: i64,
    pub confidence_cap: f64,
    pub missed_min_days: i64,
    pub missed_max_days: i64,
    pub order_day_min_orders: usize,
    pub order_day_min_share: f64,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            min_orders: 3,
            max_gap_days: 120,
            max_cov: 0.6,
            days_before: 14,
            days_after: 7,
            lead_days: 2,
            confidence_cap: 95.0,
            missed_min_days: 15,
            missed_max_days: 45,
            order_day_min_orders: 6,
            order_day_min_share: 0.7,
        }
    }
}

/// Price and spend thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub window_days: i64,
    pub anomaly_threshold: f64,
    pub anomaly_trailing_orders: usize,
    pub anomaly_min_history: usize,
    pub anomaly_recent_days: i64,
    /// Multiples of a price threshold at which urgency becomes Medium and High
    pub severity_medium_multiple: f64,
    pub severity_high_multiple: f64,
    pub drop_threshold: f64,
    pub drop_recent_days: i64,
    pub drop_baseline_days: i64,
    pub drop_restock_multiplier: f64,
    pub trend_threshold: f64,
    pub trend_recent_days: i64,
    pub trend_baseline_days: i64,
    pub trend_medium_multiple: f64,
    pub volatility_max_cov: f64,
    pub volatility_min_points: usize,
    pub vendor_gap_threshold: f64,
    pub vendor_gap_medium_multiple: f64,
    pub vendor_increase_threshold: f64,
    pub spend_comparison_days: i64,
    pub spend_spike_threshold: f64,
    pub spend_spike_medium_multiple: f64,
    pub rebate_rate: f64,
    pub rebate_min_annual_spend: i64,
    pub rebate_window_days: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            anomaly_threshold: 0.10,
            anomaly_trailing_orders: 10,
            anomaly_min_history: 3,
            anomaly_recent_days: 30,
            severity_medium_multiple: 1.5,
            severity_high_multiple: 3.0,
            drop_threshold: 0.08,
            drop_recent_days: 14,
            drop_baseline_days: 90,
            drop_restock_multiplier: 2.0,
            trend_threshold: 0.05,
            trend_recent_days: 30,
            trend_baseline_days: 60,
            trend_medium_multiple: 3.0,
            volatility_max_cov: 0.2,
            volatility_min_points: 5,
            vendor_gap_threshold: 0.10,
            vendor_gap_medium_multiple: 2.0,
            vendor_increase_threshold: 0.05,
            spend_comparison_days: 30,
            spend_spike_threshold: 0.25,
            spend_spike_medium_multiple: 2.0,
            rebate_rate: 0.02,
            rebate_min_annual_spend: 5_000_000,
            rebate_window_days: 365,
        }
    }
}

/// Order-size and consolidation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    pub window_days: i64,
    pub bulk_min_orders: usize,
    pub bulk_min_small_orders: usize,
    /// An order is "small" at or below this fraction of the SKU's largest order
    pub bulk_small_order_ratio: f64,
    /// Assumed discount for buying in bulk
    pub bulk_discount_rate: f64,
    /// Assumed administrative cost of processing one order (minor units)
    pub admin_cost_per_order: i64,
    pub consolidation_min_vendors: usize,
    pub order_consolidation_window_days: i64,
    pub order_consolidation_gap_days: i64,
    pub order_consolidation_min_pairs: usize,
    pub small_order_ratio: f64,
    pub small_order_min_count: usize,
    pub duplicate_window_days: i64,
    pub duplicate_gap_days: i64,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            bulk_min_orders: 4,
            bulk_min_small_orders: 3,
            bulk_small_order_ratio: 0.5,
            bulk_discount_rate: 0.07,
            admin_cost_per_order: 2_500,
            consolidation_min_vendors: 3,
            order_consolidation_window_days: 30,
            order_consolidation_gap_days: 3,
            order_consolidation_min_pairs: 2,
            small_order_ratio: 0.25,
            small_order_min_count: 3,
            duplicate_window_days: 14,
            duplicate_gap_days: 2,
        }
    }
}

/// Usage, waste and inactivity thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub usage_comparison_days: i64,
    pub usage_increase_threshold: f64,
    pub usage_increase_medium_multiple: f64,
    pub usage_decrease_threshold: f64,
    pub over_ordering_threshold: f64,
    pub over_ordering_min_history: usize,
    pub over_ordering_recent_days: i64,
    pub inactivity_window_days: i64,
    pub inactive_days: i64,
    pub inactive_min_orders: usize,
    pub waste_risk_threshold: f64,
    pub perishable_categories: Vec<String>,
    pub new_item_days: i64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            usage_comparison_days: 30,
            usage_increase_threshold: 0.20,
            usage_increase_medium_multiple: 2.0,
            usage_decrease_threshold: 0.30,
            over_ordering_threshold: 0.50,
            over_ordering_min_history: 3,
            over_ordering_recent_days: 14,
            inactivity_window_days: 180,
            inactive_days: 60,
            inactive_min_orders: 3,
            waste_risk_threshold: 0.40,
            perishable_categories: ["produce", "dairy", "meat", "seafood", "bakery"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            new_item_days: 30,
        }
    }
}

/// Vendor risk and diversity thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub window_days: i64,
    pub concentration_share: f64,
    /// Share at which concentration becomes Medium urgency
    pub concentration_medium_share: f64,
    pub concentration_min_orders: usize,
    pub single_source_min_orders: usize,
    pub inactive_days: i64,
    pub inactive_min_orders: usize,
    pub new_vendor_days: i64,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            concentration_share: 0.60,
            concentration_medium_share: 0.90,
            concentration_min_orders: 5,
            single_source_min_orders: 4,
            inactive_days: 45,
            inactive_min_orders: 4,
            new_vendor_days: 30,
        }
    }
}

/// Forecast, seasonality and year-over-year thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub comparison_days: i64,
    /// Fraction of observed growth carried into a projection
    pub dampening: f64,
    pub min_growth: f64,
    pub horizon_days: i64,
    pub trailing_days: i64,
    /// Half-width of the last-year lookup around a seasonal date
    pub seasonal_window_days: i64,
    /// Seasonal events this close are Medium urgency
    pub seasonal_urgent_days: i64,
    /// Confidence when last year's spend backs the reminder
    pub seasonal_history_confidence: f64,
    pub seasonal_reminder_confidence: f64,
    pub year_over_year_days: i64,
    pub year_over_year_threshold: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            comparison_days: 30,
            dampening: 0.6,
            min_growth: 0.20,
            horizon_days: 30,
            trailing_days: 90,
            seasonal_window_days: 7,
            seasonal_urgent_days: 7,
            seasonal_history_confidence: 70.0,
            seasonal_reminder_confidence: 30.0,
            year_over_year_days: 365,
            year_over_year_threshold: 0.25,
        }
    }
}

/// Budget pacing and order-rate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub trailing_days: i64,
    /// Flag when projected spend exceeds typical by more than this fraction
    pub overage_threshold: f64,
    /// Multiple of the overage threshold at which pacing becomes High urgency
    pub overage_high_multiple: f64,
    pub min_elapsed_days: i64,
    pub order_frequency_days: i64,
    pub order_frequency_threshold: f64,
    pub large_purchase_threshold: f64,
    pub large_purchase_recent_days: i64,
    pub large_purchase_min_history: usize,
    pub large_purchase_trailing_orders: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            trailing_days: 90,
            overage_threshold: 0.15,
            overage_high_multiple: 2.0,
            min_elapsed_days: 3,
            order_frequency_days: 30,
            order_frequency_threshold: 0.50,
            large_purchase_threshold: 2.0,
            large_purchase_recent_days: 7,
            large_purchase_min_history: 5,
            large_purchase_trailing_orders: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration (explicit path or data-dir override first, then embedded default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let content = match path {
            Some(p) if p.exists() => {
                tracing::debug!(path = %p.display(), "Loading engine config override");
                fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?
            }
            _ => DEFAULT_CONFIG.to_string(),
        };

        Self::from_toml(&content)
    }

    /// The embedded default document
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG
    }

    /// Reject windows and thresholds no detector can work with
    pub fn validate(&self) -> Result<()> {
        non_negative("materiality_threshold", self.materiality_threshold)?;
        for vendor in &self.excluded_vendors {
            if vendor.trim().is_empty() {
                return Err(Error::Config(
                    "excluded_vendors entries must not be blank".to_string(),
                ));
            }
        }

        let r = &self.reorder;
        positive_days("reorder.window_days", r.window_days)?;
        positive_days("reorder.max_gap_days", r.max_gap_days)?;
        day_offset("reorder.days_before", r.days_before)?;
        day_offset("reorder.days_after", r.days_after)?;
        day_offset("reorder.lead_days", r.lead_days)?;
        at_least("reorder.min_orders", r.min_orders, 2)?;
        fraction("reorder.max_cov", r.max_cov, 10.0)?;
        fraction("reorder.confidence_cap", r.confidence_cap, 100.0)?;
        positive_days("reorder.missed_min_days", r.missed_min_days)?;
        positive_days("reorder.missed_max_days", r.missed_max_days)?;
        if r.missed_max_days <= r.missed_min_days {
            return Err(Error::Config(
                "reorder.missed_max_days must exceed reorder.missed_min_days".to_string(),
            ));
        }
        at_least("reorder.order_day_min_orders", r.order_day_min_orders, 2)?;
        fraction("reorder.order_day_min_share", r.order_day_min_share, 1.0)?;

        let p = &self.pricing;
        positive_days("pricing.window_days", p.window_days)?;
        fraction("pricing.anomaly_threshold", p.anomaly_threshold, 10.0)?;
        at_least("pricing.anomaly_trailing_orders", p.anomaly_trailing_orders, 1)?;
        at_least("pricing.anomaly_min_history", p.anomaly_min_history, 1)?;
        positive_days("pricing.anomaly_recent_days", p.anomaly_recent_days)?;
        escalation(
            "pricing.severity_medium_multiple",
            p.severity_medium_multiple,
            "pricing.severity_high_multiple",
            p.severity_high_multiple,
        )?;
        fraction("pricing.drop_threshold", p.drop_threshold, 1.0)?;
        positive_days("pricing.drop_recent_days", p.drop_recent_days)?;
        positive_days("pricing.drop_baseline_days", p.drop_baseline_days)?;
        if p.drop_baseline_days <= p.drop_recent_days {
            return Err(Error::Config(
                "pricing.drop_baseline_days must exceed pricing.drop_recent_days".to_string(),
            ));
        }
        fraction("pricing.drop_restock_multiplier", p.drop_restock_multiplier, 100.0)?;
        fraction("pricing.trend_threshold", p.trend_threshold, 10.0)?;
        positive_days("pricing.trend_recent_days", p.trend_recent_days)?;
        positive_days("pricing.trend_baseline_days", p.trend_baseline_days)?;
        multiple("pricing.trend_medium_multiple", p.trend_medium_multiple)?;
        fraction("pricing.volatility_max_cov", p.volatility_max_cov, 10.0)?;
        at_least("pricing.volatility_min_points", p.volatility_min_points, 2)?;
        fraction("pricing.vendor_gap_threshold", p.vendor_gap_threshold, 10.0)?;
        multiple("pricing.vendor_gap_medium_multiple", p.vendor_gap_medium_multiple)?;
        fraction("pricing.vendor_increase_threshold", p.vendor_increase_threshold, 10.0)?;
        positive_days("pricing.spend_comparison_days", p.spend_comparison_days)?;
        fraction("pricing.spend_spike_threshold", p.spend_spike_threshold, 10.0)?;
        multiple("pricing.spend_spike_medium_multiple", p.spend_spike_medium_multiple)?;
        fraction("pricing.rebate_rate", p.rebate_rate, 1.0)?;
        non_negative("pricing.rebate_min_annual_spend", p.rebate_min_annual_spend)?;
        positive_days("pricing.rebate_window_days", p.rebate_window_days)?;

        let o = &self.ordering;
        positive_days("ordering.window_days", o.window_days)?;
        at_least("ordering.bulk_min_orders", o.bulk_min_orders, 2)?;
        at_least("ordering.bulk_min_small_orders", o.bulk_min_small_orders, 1)?;
        fraction("ordering.bulk_small_order_ratio", o.bulk_small_order_ratio, 1.0)?;
        fraction("ordering.bulk_discount_rate", o.bulk_discount_rate, 1.0)?;
        non_negative("ordering.admin_cost_per_order", o.admin_cost_per_order)?;
        at_least("ordering.consolidation_min_vendors", o.consolidation_min_vendors, 2)?;
        positive_days(
            "ordering.order_consolidation_window_days",
            o.order_consolidation_window_days,
        )?;
        day_offset("ordering.order_consolidation_gap_days", o.order_consolidation_gap_days)?;
        at_least(
            "ordering.order_consolidation_min_pairs",
            o.order_consolidation_min_pairs,
            1,
        )?;
        fraction("ordering.small_order_ratio", o.small_order_ratio, 1.0)?;
        at_least("ordering.small_order_min_count", o.small_order_min_count, 1)?;
        positive_days("ordering.duplicate_window_days", o.duplicate_window_days)?;
        day_offset("ordering.duplicate_gap_days", o.duplicate_gap_days)?;

        let i = &self.inventory;
        positive_days("inventory.usage_comparison_days", i.usage_comparison_days)?;
        fraction("inventory.usage_increase_threshold", i.usage_increase_threshold, 10.0)?;
        multiple(
            "inventory.usage_increase_medium_multiple",
            i.usage_increase_medium_multiple,
        )?;
        fraction("inventory.usage_decrease_threshold", i.usage_decrease_threshold, 1.0)?;
        fraction("inventory.over_ordering_threshold", i.over_ordering_threshold, 100.0)?;
        at_least("inventory.over_ordering_min_history", i.over_ordering_min_history, 1)?;
        positive_days("inventory.over_ordering_recent_days", i.over_ordering_recent_days)?;
        positive_days("inventory.inactivity_window_days", i.inactivity_window_days)?;
        positive_days("inventory.inactive_days", i.inactive_days)?;
        if i.inactive_days >= i.inactivity_window_days {
            return Err(Error::Config(
                "inventory.inactive_days must be shorter than inventory.inactivity_window_days"
                    .to_string(),
            ));
        }
        at_least("inventory.inactive_min_orders", i.inactive_min_orders, 1)?;
        fraction("inventory.waste_risk_threshold", i.waste_risk_threshold, 10.0)?;
        positive_days("inventory.new_item_days", i.new_item_days)?;

        let v = &self.vendors;
        positive_days("vendors.window_days", v.window_days)?;
        fraction("vendors.concentration_share", v.concentration_share, 1.0)?;
        fraction("vendors.concentration_medium_share", v.concentration_medium_share, 1.0)?;
        if v.concentration_medium_share < v.concentration_share {
            return Err(Error::Config(
                "vendors.concentration_medium_share must not be below vendors.concentration_share"
                    .to_string(),
            ));
        }
        at_least("vendors.single_source_min_orders", v.single_source_min_orders, 1)?;
        positive_days("vendors.inactive_days", v.inactive_days)?;
        at_least("vendors.inactive_min_orders", v.inactive_min_orders, 1)?;
        positive_days("vendors.new_vendor_days", v.new_vendor_days)?;

        let f = &self.forecast;
        positive_days("forecast.comparison_days", f.comparison_days)?;
        fraction("forecast.dampening", f.dampening, 1.0)?;
        fraction("forecast.min_growth", f.min_growth, 10.0)?;
        positive_days("forecast.horizon_days", f.horizon_days)?;
        positive_days("forecast.trailing_days", f.trailing_days)?;
        day_offset("forecast.seasonal_window_days", f.seasonal_window_days)?;
        day_offset("forecast.seasonal_urgent_days", f.seasonal_urgent_days)?;
        fraction(
            "forecast.seasonal_history_confidence",
            f.seasonal_history_confidence,
            100.0,
        )?;
        fraction(
            "forecast.seasonal_reminder_confidence",
            f.seasonal_reminder_confidence,
            100.0,
        )?;
        positive_days("forecast.year_over_year_days", f.year_over_year_days)?;
        fraction("forecast.year_over_year_threshold", f.year_over_year_threshold, 10.0)?;

        let pc = &self.pacing;
        positive_days("pacing.trailing_days", pc.trailing_days)?;
        fraction("pacing.overage_threshold", pc.overage_threshold, 10.0)?;
        multiple("pacing.overage_high_multiple", pc.overage_high_multiple)?;
        positive_days("pacing.min_elapsed_days", pc.min_elapsed_days)?;
        positive_days("pacing.order_frequency_days", pc.order_frequency_days)?;
        fraction("pacing.order_frequency_threshold", pc.order_frequency_threshold, 10.0)?;
        fraction("pacing.large_purchase_threshold", pc.large_purchase_threshold, 100.0)?;
        positive_days("pacing.large_purchase_recent_days", pc.large_purchase_recent_days)?;
        at_least("pacing.large_purchase_min_history", pc.large_purchase_min_history, 1)?;
        at_least(
            "pacing.large_purchase_trailing_orders",
            pc.large_purchase_trailing_orders,
            1,
        )?;

        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("stockwise").join("config").join("engine.toml"))
}

/// Longest window or offset any setting may name (about ten years)
pub const MAX_DAYS: i64 = 3_650;

fn positive_days(name: &str, value: i64) -> Result<()> {
    if value <= 0 || value > MAX_DAYS {
        return Err(Error::Config(format!(
            "{} must be a number of days in 1..={} (got {})",
            name, MAX_DAYS, value
        )));
    }
    Ok(())
}

/// A day count that may be zero
fn day_offset(name: &str, value: i64) -> Result<()> {
    if !(0..=MAX_DAYS).contains(&value) {
        return Err(Error::Config(format!(
            "{} must be a number of days in 0..={} (got {})",
            name, MAX_DAYS, value
        )));
    }
    Ok(())
}

fn non_negative(name: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::Config(format!(
            "{} must not be negative (got {})",
            name, value
        )));
    }
    Ok(())
}

fn at_least(name: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(Error::Config(format!(
            "{} must be at least {} (got {})",
            name, min, value
        )));
    }
    Ok(())
}

/// Finite, strictly positive and no larger than `max`
fn fraction(name: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > max {
        return Err(Error::Config(format!(
            "{} must be in (0, {}] (got {})",
            name, max, value
        )));
    }
    Ok(())
}

/// An urgency escalation factor applied to a base threshold
fn multiple(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(1.0..=100.0).contains(&value) {
        return Err(Error::Config(format!(
            "{} must be in [1, 100] (got {})",
            name, value
        )));
    }
    Ok(())
}

fn escalation(medium_name: &str, medium: f64, high_name: &str, high: f64) -> Result<()> {
    multiple(medium_name, medium)?;
    multiple(high_name, high)?;
    if high < medium {
        return Err(Error::Config(format!(
            "{} must not be below {}",
            high_name, medium_name
        )));
    }
    Ok(())
}
