//! Core types for the Insight Engine

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reasoning key holding the signed number of days until the event an
/// insight is about (negative when overdue). Read by the now-relevant view.
pub const DAYS_UNTIL_EVENT: &str = "days_until_event";

/// Exact numeric inputs behind an insight, keyed by name (ordered for stable output)
pub type Reasoning = BTreeMap<String, serde_json::Value>;

macro_rules! insight_types {
    ($( $(#[$doc:meta])* $variant:ident => $name:literal, $category:ident; )+) => {
        /// Types of insights that can be generated, one per detector
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum InsightType {
            $( $(#[$doc])* $variant, )+
        }

        impl InsightType {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( InsightType::$variant => $name, )+
                }
            }

            pub fn category(&self) -> DetectorCategory {
                match self {
                    $( InsightType::$variant => DetectorCategory::$category, )+
                }
            }

            /// Every insight type, in catalog order
            pub fn all() -> &'static [InsightType] {
                &[ $( InsightType::$variant, )+ ]
            }
        }

        impl FromStr for InsightType {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(InsightType::$variant), )+
                    _ => Err(format!("Unknown insight type: {}", s)),
                }
            }
        }
    };
}

insight_types! {
    /// Predicted next order of a regularly reordered SKU
    ReorderPrediction => "reorder_prediction", Timing;
    /// Predicted next order with a regularly used vendor
    VendorOrderCycle => "vendor_order_cycle", Timing;
    /// Regular SKU whose predicted reorder passed weeks ago
    MissedReorder => "missed_reorder", Timing;
    /// Tomorrow is the vendor's usual ordering weekday
    OrderDayPattern => "order_day_pattern", Timing;
    /// Latest price well above the SKU's trailing average
    PriceAnomaly => "price_anomaly", Pricing;
    /// Recent price well below the SKU's baseline
    PriceDrop => "price_drop", Pricing;
    /// Sustained upward drift in a SKU's price
    PriceTrend => "price_trend", Pricing;
    /// Unstable unit price
    PriceVolatility => "price_volatility", Pricing;
    /// Same SKU cheaper at another vendor
    VendorPriceComparison => "vendor_price_comparison", Pricing;
    /// Vendor-wide price increase
    VendorPriceIncrease => "vendor_price_increase", Pricing;
    /// Category spend up versus the prior period
    CategorySpendSpike => "category_spend_spike", Pricing;
    /// Category spend down versus the prior period
    CategorySpendDrop => "category_spend_drop", Pricing;
    /// Vendor spend up versus the prior period
    VendorSpendSpike => "vendor_spend_spike", Pricing;
    /// Annual vendor spend large enough to ask for a rebate
    RebateOpportunity => "rebate_opportunity", Pricing;
    /// Many small orders of a SKU that could be bought in bulk
    BulkBuying => "bulk_buying", Ordering;
    /// A category spread across several vendors
    VendorConsolidation => "vendor_consolidation", Ordering;
    /// Orders to one vendor placed days apart that could be merged
    OrderConsolidation => "order_consolidation", Ordering;
    /// Repeated orders far below the vendor's usual size
    SmallOrder => "small_order", Ordering;
    /// Same SKU ordered twice within a couple of days
    DuplicateOrder => "duplicate_order", Ordering;
    /// Usage growing faster than ordering frequency (stockout risk)
    UsageIncrease => "usage_increase", Inventory;
    /// Usage falling (overstock risk)
    UsageDecrease => "usage_decrease", Inventory;
    /// Latest order much larger than usual (waste risk)
    OverOrdering => "over_ordering", Inventory;
    /// Regular SKU not ordered for a long time
    InactiveItem => "inactive_item", Inventory;
    /// Perishable category quantity rising sharply
    WasteRisk => "waste_risk", Inventory;
    /// SKU bought for the first time recently
    NewItem => "new_item", Inventory;
    /// One vendor dominates spend
    VendorConcentration => "vendor_concentration", Vendor;
    /// Material SKU bought from a single vendor
    SingleSourceItem => "single_source_item", Vendor;
    /// Material category bought from a single vendor
    CategorySingleSource => "category_single_source", Vendor;
    /// Regular vendor not used recently
    VendorInactive => "vendor_inactive", Vendor;
    /// Vendor used for the first time recently
    NewVendor => "new_vendor", Vendor;
    /// Dampened projection of a SKU's usage
    UsageForecast => "usage_forecast", Forecasting;
    /// Projected spend for the coming period
    SpendForecast => "spend_forecast", Forecasting;
    /// Fixed calendar date approaching
    SeasonalDemand => "seasonal_demand", Forecasting;
    /// Category spend versus the same period last year
    YearOverYear => "year_over_year", Forecasting;
    /// Month-to-date spend running ahead of typical
    BudgetPacing => "budget_pacing", Pacing;
    /// Week-to-date spend running ahead of typical
    WeeklyPacing => "weekly_pacing", Pacing;
    /// Number of orders up versus the prior period
    OrderFrequencyChange => "order_frequency_change", Pacing;
    /// Single purchase far above the usual order value
    LargePurchase => "large_purchase", Pacing;
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detector families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorCategory {
    Timing,
    Pricing,
    Ordering,
    Inventory,
    Vendor,
    Forecasting,
    Pacing,
}

impl DetectorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorCategory::Timing => "timing",
            DetectorCategory::Pricing => "pricing",
            DetectorCategory::Ordering => "ordering",
            DetectorCategory::Inventory => "inventory",
            DetectorCategory::Vendor => "vendor",
            DetectorCategory::Forecasting => "forecasting",
            DetectorCategory::Pacing => "pacing",
        }
    }
}

/// Priority band of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }

    /// Sort rank (lower sorts first)
    pub fn rank(&self) -> u8 {
        match self {
            Urgency::High => 0,
            Urgency::Medium => 1,
            Urgency::Low => 2,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            _ => Err(format!("Unknown urgency: {}", s)),
        }
    }
}

/// What an insight is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum InsightScope {
    Sku(String),
    Vendor(String),
    Category(String),
    Global,
}

impl InsightScope {
    pub fn key(&self) -> Option<&str> {
        match self {
            InsightScope::Sku(k) | InsightScope::Vendor(k) | InsightScope::Category(k) => Some(k),
            InsightScope::Global => None,
        }
    }
}

impl fmt::Display for InsightScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightScope::Sku(k) => write!(f, "sku:{}", k),
            InsightScope::Vendor(k) => write!(f, "vendor:{}", k),
            InsightScope::Category(k) => write!(f, "category:{}", k),
            InsightScope::Global => write!(f, "global"),
        }
    }
}

/// Detector output before normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct InsightDraft {
    pub insight_type: InsightType,
    pub scope: InsightScope,
    pub title: String,
    pub detail: String,
    pub urgency: Urgency,
    /// Raw score; the normaliser rounds and clamps it to 0..=100
    pub confidence: f64,
    pub estimated_value: i64,
    pub suggested_quantity: Option<f64>,
    pub reasoning: Reasoning,
}

impl InsightDraft {
    pub fn new(
        insight_type: InsightType,
        scope: InsightScope,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            insight_type,
            scope,
            title: title.into(),
            detail: detail.into(),
            urgency: Urgency::Low,
            confidence: 0.0,
            estimated_value: 0,
            suggested_quantity: None,
            reasoning: Reasoning::new(),
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Estimated monetary impact in minor units
    pub fn with_value(mut self, value: i64) -> Self {
        self.estimated_value = value;
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.suggested_quantity = Some(quantity);
        self
    }

    /// Record one numeric input used to score this insight
    pub fn with_reason(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.reasoning.insert(key.to_string(), value.into());
        self
    }
}

/// Position of an insight in detector output, used as the final ranking tie-break
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Origin {
    /// Detector registration index
    pub detector: usize,
    /// Emission index within that detector's output
    pub sequence: usize,
}

/// A normalised, scored advisory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub scope: InsightScope,
    pub title: String,
    pub detail: String,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_quantity: Option<f64>,
    pub estimated_value_minor_units: i64,
    pub confidence_score: u8,
    pub reasoning: Reasoning,
    #[serde(skip)]
    pub(crate) origin: Origin,
}

impl Insight {
    /// Signed days until the event this insight concerns, when it has one
    pub fn days_until_event(&self) -> Option<i64> {
        self.reasoning.get(DAYS_UNTIL_EVENT).and_then(|v| v.as_i64())
    }

    /// Whether the insight names `vendor` in its scope, title, detail or reasoning
    pub fn mentions_vendor(&self, vendor: &str) -> bool {
        let needle = vendor.to_lowercase();
        let scope_hit = matches!(&self.scope, InsightScope::Vendor(v) if v.to_lowercase() == needle);
        scope_hit
            || self.title.to_lowercase().contains(&needle)
            || self.detail.to_lowercase().contains(&needle)
            || self
                .reasoning
                .values()
                .any(|v| v.to_string().to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_type_round_trip() {
        for t in InsightType::all() {
            assert_eq!(InsightType::from_str(t.as_str()).unwrap(), *t);
        }
        assert_eq!(InsightType::all().len(), 38);
        assert!(InsightType::from_str("crystal_ball").is_err());
    }

    #[test]
    fn test_urgency_rank() {
        assert!(Urgency::High.rank() < Urgency::Medium.rank());
        assert!(Urgency::Medium.rank() < Urgency::Low.rank());
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_value(InsightScope::Sku("EGG-12".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "sku", "key": "EGG-12"}));
        let json = serde_json::to_value(InsightScope::Global).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "global"}));
    }

    #[test]
    fn test_draft_builder() {
        let draft = InsightDraft::new(
            InsightType::PriceAnomaly,
            InsightScope::Sku("EGG".into()),
            "Title",
            "Detail",
        )
        .with_urgency(Urgency::High)
        .with_confidence(72.4)
        .with_value(1_500)
        .with_reason("average_price", 1_000);

        assert_eq!(draft.urgency, Urgency::High);
        assert_eq!(draft.estimated_value, 1_500);
        assert_eq!(draft.reasoning["average_price"], 1_000);
    }
}
