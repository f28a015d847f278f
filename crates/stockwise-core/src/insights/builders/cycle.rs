//! Order-cycle regularity
//!
//! Per key: distinct order dates in the window, gaps between consecutive
//! dates (outlier gaps dropped), mean and population standard deviation of
//! the gaps. Regular cycles (low CoV) predict the next order at
//! `last order + round(mean gap)`.

use chrono::{Duration, NaiveDate};

use crate::error::Result;
use crate::history::GroupBy;
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightType, Urgency, DAYS_UNTIL_EVENT};
use crate::money;
use crate::stats;

use super::{round2, urgency_for_days};

/// Emit when `predicted - as_of` lies in `from..=to` days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWindow {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone)]
pub struct CycleParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub group: GroupBy,
    pub window_days: i64,
    pub min_orders: usize,
    pub max_gap_days: i64,
    pub max_cov: f64,
    pub confidence_cap: f64,
    pub lead_days: i64,
    pub emit: CycleWindow,
    pub render: fn(&CycleFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// A regular cycle whose predicted date fell in the emission window
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFinding {
    pub key: String,
    /// Distinct order dates in the window
    pub order_days: usize,
    pub mean_gap_days: f64,
    pub std_dev_days: f64,
    pub cov: f64,
    pub last_order: NaiveDate,
    pub predicted: NaiveDate,
    /// Signed days from `as_of` to the predicted date
    pub days_until: i64,
    /// Predicted date minus lead time
    pub reorder_by: NaiveDate,
    pub days_until_reorder: i64,
    /// Mean quantity per order day
    pub mean_quantity: f64,
    /// Mean spend per order day (minor units)
    pub mean_spend: i64,
    pub confidence: f64,
    pub urgency: Urgency,
}

impl CycleFinding {
    /// Attach the cycle statistics to a draft's reasoning
    pub fn explain(&self, draft: InsightDraft) -> InsightDraft {
        draft
            .with_reason("order_count", self.order_days as u64)
            .with_reason("mean_gap_days", round2(self.mean_gap_days))
            .with_reason("std_dev_days", round2(self.std_dev_days))
            .with_reason("coefficient_of_variation", round2(self.cov))
            .with_reason("last_order_date", self.last_order.to_string())
            .with_reason("predicted_date", self.predicted.to_string())
            .with_reason("reorder_by_date", self.reorder_by.to_string())
            .with_reason(DAYS_UNTIL_EVENT, self.days_until)
            .with_reason("mean_quantity", round2(self.mean_quantity))
            .with_reason("mean_spend", self.mean_spend)
    }
}

/// Cycle statistics over ascending distinct dates: (mean gap, std dev, CoV).
/// Gaps longer than `max_gap_days` are ignored.
pub fn cycle_stats(dates: &[NaiveDate], max_gap_days: i64) -> Option<(f64, f64, f64)> {
    let gaps: Vec<f64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .filter(|&gap| gap > 0 && gap <= max_gap_days)
        .map(|gap| gap as f64)
        .collect();
    let mean = stats::mean(&gaps)?;
    let std_dev = stats::population_std_dev(&gaps)?;
    let cov = stats::coefficient_of_variation(&gaps)?;
    Some((mean, std_dev, cov))
}

pub struct CycleDetector {
    params: CycleParams,
}

impl CycleDetector {
    pub fn new(params: CycleParams) -> Self {
        Self { params }
    }

    pub fn findings(&self, ctx: &AnalysisContext) -> Vec<CycleFinding> {
        let p = &self.params;
        let daily = ctx
            .history
            .daily_orders(ctx.window(p.window_days), p.group);

        let mut findings = Vec::new();
        for (key, days) in daily {
            if days.len() < p.min_orders {
                continue;
            }
            let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
            let Some((mean_gap, std_dev, cov)) = cycle_stats(&dates, p.max_gap_days) else {
                continue;
            };
            if cov > p.max_cov {
                continue;
            }

            let Some(last_order) = dates.last().copied() else {
                continue;
            };
            let predicted = last_order + Duration::days(mean_gap.round() as i64);
            let days_until = (predicted - ctx.as_of).num_days();
            if days_until < p.emit.from || days_until > p.emit.to {
                continue;
            }

            let reorder_by = predicted - Duration::days(p.lead_days);
            let days_until_reorder = days_until - p.lead_days;
            let quantities: Vec<f64> = days.iter().map(|d| d.quantity).collect();
            let spends: Vec<i64> = days.iter().map(|d| d.spend).collect();
            let confidence =
                (50.0 + days.len() as f64 * 4.0 + (1.0 - cov) * 30.0).min(p.confidence_cap);

            findings.push(CycleFinding {
                key,
                order_days: days.len(),
                mean_gap_days: mean_gap,
                std_dev_days: std_dev,
                cov,
                last_order,
                predicted,
                days_until,
                reorder_by,
                days_until_reorder,
                mean_quantity: stats::mean(&quantities).unwrap_or(0.0),
                mean_spend: money::average(&spends).unwrap_or(0),
                confidence,
                urgency: urgency_for_days(days_until_reorder),
            });
        }
        findings
    }
}

impl Detector for CycleDetector {
    fn insight_type(&self) -> InsightType {
        self.params.insight_type
    }

    fn name(&self) -> &'static str {
        self.params.name
    }

    fn lookback_days(&self) -> i64 {
        self.params.window_days
    }

    fn min_data_points(&self) -> usize {
        self.params.min_orders
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
    use crate::test_utils::{date, HistoryBuilder};

    fn render(f: &CycleFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
        Ok(f.explain(InsightDraft::new(
            InsightType::ReorderPrediction,
            InsightScope::Sku(f.key.clone()),
            "t",
            "d",
        )))
    }

    fn detector(emit: CycleWindow) -> CycleDetector {
        CycleDetector::new(CycleParams {
            insight_type: InsightType::ReorderPrediction,
            name: "test cycle",
            group: GroupBy::Sku,
            window_days: 90,
            min_orders: 3,
            max_gap_days: 120,
            max_cov: 0.6,
            confidence_cap: 95.0,
            lead_days: 2,
            emit,
            render,
        })
    }

    #[test]
    fn test_cycle_stats() {
        let dates = [date(2026, 1, 1), date(2026, 1, 11), date(2026, 1, 21)];
        let (mean, std_dev, cov) = cycle_stats(&dates, 120).unwrap();
        assert_eq!(mean, 10.0);
        assert_eq!(std_dev, 0.0);
        assert_eq!(cov, 0.0);
        assert!(cycle_stats(&dates[..1], 120).is_none());
    }

    #[test]
    fn test_long_gaps_are_dropped() {
        let dates = [date(2025, 1, 1), date(2025, 6, 1), date(2025, 6, 8), date(2025, 6, 15)];
        let (mean, _, _) = cycle_stats(&dates, 120).unwrap();
        assert_eq!(mean, 7.0);
    }

    #[test]
    fn test_irregular_cycle_skipped() {
        let ctx = HistoryBuilder::new(date(2026, 4, 1))
            .order(80, "Sysco", "EGG", 10.0, 300)
            .order(78, "Sysco", "EGG", 10.0, 300)
            .order(30, "Sysco", "EGG", 10.0, 300)
            .order(29, "Sysco", "EGG", 10.0, 300)
            .context();
        let findings = detector(CycleWindow { from: -60, to: 60 }).findings(&ctx);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_confidence_capped() {
        let mut builder = HistoryBuilder::new(date(2026, 4, 1));
        for days_ago in (3..=87).step_by(7) {
            builder = builder.order(days_ago, "Sysco", "EGG", 10.0, 300);
        }
        let findings = detector(CycleWindow { from: -14, to: 7 }).findings(&builder.context());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].confidence, 95.0);
        assert_eq!(findings[0].days_until, 4);
        assert_eq!(findings[0].urgency, Urgency::Medium);
    }
}
