//! Window-over-window change per key

use std::collections::BTreeSet;

use crate::error::Result;
use crate::history::{DateWindow, GroupBy, PeriodTotal};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightType};
use crate::stats;

use super::{percent, round2, strength_confidence};

/// Quantity compared between the two windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Spend,
    Quantity,
    /// Distinct purchases
    Orders,
    AverageUnitPrice,
}

impl Metric {
    pub fn value(&self, total: &PeriodTotal) -> Option<f64> {
        match self {
            Metric::Spend => Some(total.spend as f64),
            Metric::Quantity => Some(total.quantity),
            Metric::Orders => Some(total.orders as f64),
            Metric::AverageUnitPrice => total.average_unit_price(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::Quantity => "quantity",
            Metric::Orders => "orders",
            Metric::AverageUnitPrice => "average_unit_price",
        }
    }
}

/// Which way the change must go to be flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    Either,
}

/// Whether a change equal to the threshold is flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Strictly past the threshold
    Exceeds,
    /// The threshold itself counts
    AtLeast,
}

/// Comparison window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// The given number of days right before the recent window
    Preceding(i64),
    /// The recent window shifted back by the given number of days
    ShiftedBack(i64),
}

#[derive(Debug, Clone)]
pub struct DeltaParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub group: GroupBy,
    pub metric: Metric,
    pub recent_days: i64,
    pub baseline: Baseline,
    pub direction: Direction,
    /// Relative change, as a fraction of the baseline value
    pub threshold: f64,
    pub bound: Bound,
    /// Keys to consider; `None` considers every key
    pub filter: Option<fn(&str, &AnalysisContext) -> bool>,
    /// Extra condition a finding must pass
    pub gate: Option<fn(&DeltaFinding) -> bool>,
    pub render: fn(&DeltaFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// A key whose metric moved past the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaFinding {
    pub key: String,
    pub metric: Metric,
    pub recent_window: DateWindow,
    pub baseline_window: DateWindow,
    pub recent: PeriodTotal,
    pub baseline: PeriodTotal,
    pub recent_value: f64,
    pub baseline_value: f64,
    /// (recent - baseline) / baseline
    pub change: f64,
    pub confidence: f64,
}

impl DeltaFinding {
    /// Attach window values and change to a draft's reasoning
    pub fn explain(&self, draft: InsightDraft) -> InsightDraft {
        draft
            .with_reason("metric", self.metric.as_str())
            .with_reason("recent_window", self.recent_window.to_string())
            .with_reason("baseline_window", self.baseline_window.to_string())
            .with_reason("recent_value", round2(self.recent_value))
            .with_reason("baseline_value", round2(self.baseline_value))
            .with_reason("change_pct", round2(self.change * 100.0))
    }

    /// Change as a display percentage
    pub fn change_label(&self) -> String {
        percent(self.change.abs())
    }

    /// Relative change of a different metric between the same windows
    pub fn change_in(&self, metric: Metric) -> Option<f64> {
        let recent = metric.value(&self.recent)?;
        let baseline = metric.value(&self.baseline)?;
        stats::relative_change(recent, baseline)
    }
}

pub struct WindowDelta {
    params: DeltaParams,
}

impl WindowDelta {
    pub fn new(params: DeltaParams) -> Self {
        Self { params }
    }

    fn windows(&self, ctx: &AnalysisContext) -> (DateWindow, DateWindow) {
        let recent = ctx.window(self.params.recent_days);
        let baseline = match self.params.baseline {
            Baseline::Preceding(days) => recent.preceding(days),
            Baseline::ShiftedBack(days) => recent.shifted_back(days),
        };
        (recent, baseline)
    }

    fn passes(&self, change: f64) -> bool {
        let t = self.params.threshold;
        let magnitude = match self.params.direction {
            Direction::Increase => change,
            Direction::Decrease => -change,
            Direction::Either => change.abs(),
        };
        match self.params.bound {
            Bound::Exceeds => magnitude > t,
            Bound::AtLeast => magnitude >= t,
        }
    }

    pub fn findings(&self, ctx: &AnalysisContext) -> Vec<DeltaFinding> {
        let p = &self.params;
        let (recent_window, baseline_window) = self.windows(ctx);
        let recent = ctx.history.totals(recent_window, p.group);
        let baseline = ctx.history.totals(baseline_window, p.group);

        let keys: BTreeSet<&String> = recent.keys().chain(baseline.keys()).collect();
        let mut findings = Vec::new();
        for key in keys {
            if let Some(filter) = p.filter {
                if !filter(key, ctx) {
                    continue;
                }
            }
            let recent_total = recent.get(key).cloned().unwrap_or_default();
            let baseline_total = baseline.get(key).cloned().unwrap_or_default();
            let recent_value = p.metric.value(&recent_total).unwrap_or(0.0);
            let Some(baseline_value) = p.metric.value(&baseline_total) else {
                continue;
            };
            // Average prices need observations on both sides
            if p.metric == Metric::AverageUnitPrice && recent_total.lines == 0 {
                continue;
            }
            let Some(change) = stats::relative_change(recent_value, baseline_value) else {
                continue;
            };
            if !self.passes(change) {
                continue;
            }

            let observations = recent_total.orders + baseline_total.orders;
            let finding = DeltaFinding {
                key: key.clone(),
                metric: p.metric,
                recent_window,
                baseline_window,
                recent: recent_total,
                baseline: baseline_total,
                recent_value,
                baseline_value,
                change,
                confidence: strength_confidence(change, p.threshold, observations),
            };
            if let Some(gate) = p.gate {
                if !gate(&finding) {
                    continue;
                }
            }
            findings.push(finding);
        }
        findings
    }
}

impl Detector for WindowDelta {
    fn insight_type(&self) -> InsightType {
        self.params.insight_type
    }

    fn name(&self) -> &'static str {
        self.params.name
    }

    fn lookback_days(&self) -> i64 {
        match self.params.baseline {
            Baseline::Preceding(days) => self.params.recent_days + days,
            Baseline::ShiftedBack(days) => days + self.params.recent_days,
        }
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        self.findings(ctx)
            .iter()
            .map(|finding| (self.params.render)(finding, ctx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::types::InsightScope;
    use crate::test_utils::{categorized, date, HistoryBuilder};

    fn render(f: &DeltaFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
        Ok(f.explain(InsightDraft::new(
            InsightType::CategorySpendSpike,
            InsightScope::Category(f.key.clone()),
            "t",
            "d",
        )))
    }

    fn spend_delta(direction: Direction) -> WindowDelta {
        spend_delta_bounded(direction, Bound::Exceeds)
    }

    fn spend_delta_bounded(direction: Direction, bound: Bound) -> WindowDelta {
        WindowDelta::new(DeltaParams {
            insight_type: InsightType::CategorySpendSpike,
            name: "test delta",
            group: GroupBy::Category,
            metric: Metric::Spend,
            recent_days: 30,
            baseline: Baseline::Preceding(30),
            direction,
            threshold: 0.25,
            bound,
            filter: None,
            gate: None,
            render,
        })
    }

    fn history() -> HistoryBuilder {
        HistoryBuilder::new(date(2026, 5, 31))
            .purchase(40, "Sysco", vec![categorized("EGG", 10.0, 1_000, "Dairy")])
            .purchase(5, "Sysco", vec![categorized("EGG", 15.0, 1_000, "Dairy")])
            .purchase(45, "Sysco", vec![categorized("FLOUR", 10.0, 1_000, "Dry")])
            .purchase(3, "Sysco", vec![categorized("FLOUR", 5.0, 1_000, "Dry")])
            .purchase(2, "Sysco", vec![categorized("BASIL", 5.0, 100, "Herbs")])
    }

    #[test]
    fn test_increase_flags_only_growth_with_baseline() {
        let findings = spend_delta(Direction::Increase).findings(&history().context());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key, "Dairy");
        assert!((findings[0].change - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decrease_and_either() {
        let ctx = history().context();
        let down = spend_delta(Direction::Decrease).findings(&ctx);
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].key, "Dry");

        let either = spend_delta(Direction::Either).findings(&ctx);
        assert_eq!(either.len(), 2);
    }

    #[test]
    fn test_change_equal_to_threshold_respects_bound() {
        let ctx = HistoryBuilder::new(date(2026, 5, 31))
            .purchase(40, "Sysco", vec![categorized("EGG", 4.0, 1_000, "Dairy")])
            .purchase(5, "Sysco", vec![categorized("EGG", 5.0, 1_000, "Dairy")])
            .context();

        assert!(spend_delta(Direction::Increase).findings(&ctx).is_empty());
        assert!(spend_delta(Direction::Either).findings(&ctx).is_empty());

        let inclusive = spend_delta_bounded(Direction::Increase, Bound::AtLeast).findings(&ctx);
        assert_eq!(inclusive.len(), 1);
        assert!((inclusive[0].change - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_change_in_other_metric() {
        let findings = spend_delta(Direction::Increase).findings(&history().context());
        assert_eq!(findings[0].change_in(Metric::Orders), Some(0.0));
    }
}
