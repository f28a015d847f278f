//! Keys that stopped appearing, or only just started

use chrono::NaiveDate;

use crate::error::Result;
use crate::history::{GroupBy, PeriodTotal};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightType};

/// Activity of one key over the lookback window
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceFinding {
    pub key: String,
    pub total: PeriodTotal,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Days between the last order and `as_of`
    pub days_since_last: i64,
}

impl PresenceFinding {
    pub fn explain(&self, draft: InsightDraft) -> InsightDraft {
        draft
            .with_reason("order_count", self.total.orders as u64)
            .with_reason("spend", self.total.spend)
            .with_reason("first_order_date", self.first_date.to_string())
            .with_reason("last_order_date", self.last_date.to_string())
            .with_reason("days_since_last_order", self.days_since_last)
    }
}

#[derive(Debug, Clone)]
pub struct InactivityParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub group: GroupBy,
    pub window_days: i64,
    /// Quiet period with no orders at all
    pub inactive_days: i64,
    /// Orders needed in the window before silence means something
    pub min_orders: usize,
    pub render: fn(&PresenceFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// Keys with enough orders in the window but none in the quiet period
pub struct Inactivity {
    params: InactivityParams,
}

impl Inactivity {
    pub fn new(params: InactivityParams) -> Self {
        Self { params }
    }

    pub fn findings(&self, ctx: &AnalysisContext) -> Vec<PresenceFinding> {
        let p = &self.params;
        let quiet = ctx.window(p.inactive_days);
        ctx.history
            .totals(ctx.window(p.window_days), p.group)
            .into_iter()
            .filter(|(_, total)| total.orders >= p.min_orders)
            .filter_map(|(key, total)| presence(ctx, key, total))
            .filter(|f| f.last_date < quiet.start)
            .collect()
    }
}

impl Detector for Inactivity {
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

#[derive(Debug, Clone)]
pub struct FirstSeenParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub group: GroupBy,
    pub window_days: i64,
    /// First order must fall in this many most recent days
    pub recent_days: i64,
    /// Spend in the window needed to report (minor units)
    pub min_spend: i64,
    pub render: fn(&PresenceFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// Keys first ordered recently with no earlier order in the window
pub struct FirstSeen {
    params: FirstSeenParams,
}

impl FirstSeen {
    pub fn new(params: FirstSeenParams) -> Self {
        Self { params }
    }

    pub fn findings(&self, ctx: &AnalysisContext) -> Vec<PresenceFinding> {
        let p = &self.params;
        let recent = ctx.window(p.recent_days);
        ctx.history
            .totals(ctx.window(p.window_days), p.group)
            .into_iter()
            .filter(|(_, total)| total.spend >= p.min_spend)
            .filter_map(|(key, total)| presence(ctx, key, total))
            .filter(|f| recent.contains(f.first_date))
            .collect()
    }
}

impl Detector for FirstSeen {
    fn insight_type(&self) -> InsightType {
        self.params.insight_type
    }

    fn name(&self) -> &'static str {
        self.params.name
    }

    fn lookback_days(&self) -> i64 {
        self.params.window_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        self.findings(ctx)
            .iter()
            .map(|finding| (self.params.render)(finding, ctx))
            .collect()
    }
}

fn presence(ctx: &AnalysisContext, key: String, total: PeriodTotal) -> Option<PresenceFinding> {
    let first_date = total.first_date?;
    let last_date = total.last_date?;
    Some(PresenceFinding {
        key,
        days_since_last: (ctx.as_of - last_date).num_days(),
        first_date,
        last_date,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::types::InsightScope;
    use crate::test_utils::{date, HistoryBuilder};

    fn render(f: &PresenceFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
        Ok(f.explain(InsightDraft::new(
            InsightType::InactiveItem,
            InsightScope::Sku(f.key.clone()),
            "t",
            "d",
        )))
    }

    #[test]
    fn test_inactivity() {
        let detector = Inactivity::new(InactivityParams {
            insight_type: InsightType::InactiveItem,
            name: "test inactivity",
            group: GroupBy::Sku,
            window_days: 180,
            inactive_days: 60,
            min_orders: 3,
            render,
        });
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .order(150, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(120, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(90, "Sysco", "SAFFRON", 1.0, 9_000)
            .order(150, "Sysco", "EGG", 1.0, 300)
            .order(100, "Sysco", "EGG", 1.0, 300)
            .order(10, "Sysco", "EGG", 1.0, 300)
            .order(100, "Sysco", "RARE", 1.0, 300)
            .context();

        let findings = detector.findings(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key, "SAFFRON");
        assert_eq!(findings[0].days_since_last, 90);
    }

    #[test]
    fn test_first_seen() {
        let detector = FirstSeen::new(FirstSeenParams {
            insight_type: InsightType::NewVendor,
            name: "test first seen",
            group: GroupBy::Vendor,
            window_days: 180,
            recent_days: 30,
            min_spend: 0,
            render,
        });
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .order(120, "Sysco", "EGG", 1.0, 300)
            .order(5, "Sysco", "EGG", 1.0, 300)
            .order(12, "Fresh Farms", "EGG", 1.0, 300)
            .context();

        let findings = detector.findings(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key, "Fresh Farms");
    }
}
