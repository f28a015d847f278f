//! Period-to-date spend pacing
//!
//! typical   = trailing spend (the days before the period) scaled to the period length
//! projected = period-to-date spend / elapsed days * period length

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{Error, Result};
use crate::history::DateWindow;
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightType, DAYS_UNTIL_EVENT};
use crate::money;
use crate::stats;

use super::round2;

/// Budget period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Calendar month
    Month,
    /// ISO week, Monday to Sunday
    IsoWeek,
}

impl Period {
    /// First day of the period containing `date`
    pub fn start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Month => date.with_day(1).unwrap_or(date),
            Period::IsoWeek => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        }
    }

    /// Number of days in the period containing `date`
    pub fn length(&self, date: NaiveDate) -> i64 {
        match self {
            Period::Month => {
                let start = self.start(date);
                let next = if start.month() == 12 {
                    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
                };
                next.map(|n| (n - start).num_days()).unwrap_or(30)
            }
            Period::IsoWeek => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Month => "month",
            Period::IsoWeek => "week",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacingParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub period: Period,
    pub trailing_days: i64,
    /// Flag when projected exceeds typical by more than this fraction
    pub overage_threshold: f64,
    /// Days of the period that must have elapsed
    pub min_elapsed_days: i64,
    pub render: fn(&PacingFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// A period running ahead of its typical spend
#[derive(Debug, Clone, PartialEq)]
pub struct PacingFinding {
    pub period: Period,
    pub period_start: NaiveDate,
    pub period_days: i64,
    pub elapsed_days: i64,
    pub trailing_window: DateWindow,
    pub trailing_spend: i64,
    pub typical: i64,
    pub to_date: i64,
    pub projected: i64,
    /// (projected - typical) / typical
    pub overage: f64,
    pub threshold: f64,
    pub confidence: f64,
}

impl PacingFinding {
    pub fn explain(&self, draft: InsightDraft) -> InsightDraft {
        draft
            .with_reason("period", self.period.as_str())
            .with_reason("period_start", self.period_start.to_string())
            .with_reason("period_days", self.period_days)
            .with_reason("elapsed_days", self.elapsed_days)
            .with_reason("trailing_window", self.trailing_window.to_string())
            .with_reason("trailing_spend", self.trailing_spend)
            .with_reason("typical_spend", self.typical)
            .with_reason("spend_to_date", self.to_date)
            .with_reason("projected_spend", self.projected)
            .with_reason("overage_pct", round2(self.overage * 100.0))
            .with_reason(DAYS_UNTIL_EVENT, self.period_days - self.elapsed_days)
    }

    /// Projected spend above typical
    pub fn excess(&self) -> i64 {
        self.projected - self.typical
    }
}

pub struct PacingDetector {
    params: PacingParams,
}

impl PacingDetector {
    pub fn new(params: PacingParams) -> Self {
        Self { params }
    }

    pub fn finding(&self, ctx: &AnalysisContext) -> Result<Option<PacingFinding>> {
        let p = &self.params;
        let period_start = p.period.start(ctx.as_of);
        let period_days = p.period.length(ctx.as_of);
        let elapsed_days = (ctx.as_of - period_start).num_days() + 1;
        if elapsed_days < p.min_elapsed_days {
            return Ok(None);
        }

        let trailing_window = DateWindow::ending(period_start - Duration::days(1), p.trailing_days);
        let trailing_spend = ctx.history.total_spend(trailing_window);
        if trailing_spend <= 0 {
            return Ok(None);
        }
        let to_date = ctx
            .history
            .total_spend(DateWindow::new(period_start, ctx.as_of));

        let overflow = || Error::Computation("pacing projection overflow".to_string());
        let typical =
            money::scale(trailing_spend, period_days, p.trailing_days).ok_or_else(overflow)?;
        let projected = money::scale(to_date, period_days, elapsed_days).ok_or_else(overflow)?;

        let Some(overage) = stats::relative_change(projected as f64, typical as f64) else {
            return Ok(None);
        };
        if overage <= p.overage_threshold {
            return Ok(None);
        }

        let progress = elapsed_days as f64 / period_days as f64;
        Ok(Some(PacingFinding {
            period: p.period,
            period_start,
            period_days,
            elapsed_days,
            trailing_window,
            trailing_spend,
            typical,
            to_date,
            projected,
            overage,
            threshold: p.overage_threshold,
            confidence: 50.0 + progress.min(1.0) * 40.0,
        }))
    }
}

impl Detector for PacingDetector {
    fn insight_type(&self) -> InsightType {
        self.params.insight_type
    }

    fn name(&self) -> &'static str {
        self.params.name
    }

    fn lookback_days(&self) -> i64 {
        // Longest period plus the trailing baseline before it
        self.params.trailing_days + 31
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        match self.finding(ctx)? {
            Some(finding) => Ok(vec![(self.params.render)(&finding, ctx)?]),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::types::InsightScope;
    use crate::test_utils::{date, item, HistoryBuilder};

    fn render(f: &PacingFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
        Ok(f.explain(InsightDraft::new(
            InsightType::BudgetPacing,
            InsightScope::Global,
            "t",
            "d",
        )))
    }

    fn detector(period: Period) -> PacingDetector {
        PacingDetector::new(PacingParams {
            insight_type: InsightType::BudgetPacing,
            name: "test pacing",
            period,
            trailing_days: 90,
            overage_threshold: 0.15,
            min_elapsed_days: 3,
            render,
        })
    }

    #[test]
    fn test_period_bounds() {
        assert_eq!(Period::Month.start(date(2026, 6, 10)), date(2026, 6, 1));
        assert_eq!(Period::Month.length(date(2026, 2, 10)), 28);
        assert_eq!(Period::Month.length(date(2026, 12, 31)), 31);
        // 2026-06-10 is a Wednesday
        assert_eq!(Period::IsoWeek.start(date(2026, 6, 10)), date(2026, 6, 8));
        assert_eq!(Period::IsoWeek.length(date(2026, 6, 10)), 7);
    }

    #[test]
    fn test_month_pacing_scenario() {
        // Trailing 90 days before June (Mar 3 - May 31): 3,000,000
        // June 1-10: 400,000
        let ctx = HistoryBuilder::new(date(2026, 6, 10))
            .purchase_on(date(2026, 3, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 5, 15), "Sysco", vec![item("BULK", 1.0, 1_000_000)])
            .purchase_on(date(2026, 6, 5), "Sysco", vec![item("BULK", 1.0, 400_000)])
            .context();

        let finding = detector(Period::Month).finding(&ctx).unwrap().unwrap();
        assert_eq!(finding.typical, 1_000_000);
        assert_eq!(finding.projected, 1_200_000);
        assert_eq!(finding.excess(), 200_000);
        assert!((finding.overage - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_on_pace_is_quiet() {
        let ctx = HistoryBuilder::new(date(2026, 6, 10))
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 3_000_000)])
            .purchase_on(date(2026, 6, 5), "Sysco", vec![item("BULK", 1.0, 330_000)])
            .context();
        assert!(detector(Period::Month).finding(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_too_early_in_period() {
        let ctx = HistoryBuilder::new(date(2026, 6, 2))
            .purchase_on(date(2026, 4, 15), "Sysco", vec![item("BULK", 1.0, 300_000)])
            .purchase_on(date(2026, 6, 1), "Sysco", vec![item("BULK", 1.0, 900_000)])
            .context();
        assert!(detector(Period::Month).finding(&ctx).unwrap().is_none());
    }
}
