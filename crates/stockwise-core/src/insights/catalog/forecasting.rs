//! Forecast, seasonality and year-over-year detectors

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::history::{DateWindow, GroupBy};
use crate::insights::builders::{
    percent, round2, Baseline, Bound, DeltaFinding, DeltaParams, Direction, Metric, WindowDelta,
};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency, DAYS_UNTIL_EVENT};
use crate::money;
use crate::stats;

use super::describe_days;

pub fn usage_forecast(config: &EngineConfig) -> Arc<dyn Detector> {
    let f = &config.forecast;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type: InsightType::UsageForecast,
        name: "Usage forecast",
        group: GroupBy::Sku,
        metric: Metric::Quantity,
        recent_days: f.comparison_days,
        baseline: Baseline::Preceding(f.comparison_days),
        direction: Direction::Either,
        threshold: f.min_growth,
        bound: Bound::AtLeast,
        filter: None,
        gate: None,
        render: render_usage_forecast,
    }))
}

fn render_usage_forecast(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let forecast = (f.recent.quantity * (1.0 + f.change * ctx.config.forecast.dampening)).max(0.0);
    let price = f
        .recent
        .average_unit_price()
        .or_else(|| f.baseline.average_unit_price())
        .unwrap_or(0.0);
    let direction = if f.change >= 0.0 { "rising" } else { "falling" };

    let mut draft = f
        .explain(InsightDraft::new(
            InsightType::UsageForecast,
            InsightScope::Sku(f.key.clone()),
            format!("{} demand {}", label, direction),
            format!(
                "Expect to need about {} units of {} over the next {} days ({} vs the last period).",
                round2(forecast),
                label,
                f.recent_window.days(),
                percent(forecast / f.recent.quantity.max(f64::EPSILON) - 1.0)
            ),
        ))
        .with_confidence(f.confidence)
        .with_value(money::to_minor_units(((forecast - f.recent.quantity) * price).abs())?)
        .with_reason("forecast_quantity", round2(forecast))
        .with_reason("dampening", ctx.config.forecast.dampening);
    if forecast > 0.0 {
        draft = draft.with_quantity(forecast);
    }
    Ok(draft)
}

pub fn spend_forecast(config: &EngineConfig) -> Arc<dyn Detector> {
    let f = &config.forecast;
    Arc::new(SpendForecast {
        trailing_days: f.trailing_days,
        comparison_days: f.comparison_days,
        horizon_days: f.horizon_days,
        dampening: f.dampening,
    })
}

/// Next period's spend from the trailing daily average, adjusted for growth
struct SpendForecast {
    trailing_days: i64,
    comparison_days: i64,
    horizon_days: i64,
    dampening: f64,
}

impl Detector for SpendForecast {
    fn insight_type(&self) -> InsightType {
        InsightType::SpendForecast
    }

    fn name(&self) -> &'static str {
        "Spend forecast"
    }

    fn lookback_days(&self) -> i64 {
        self.trailing_days.max(self.comparison_days * 2)
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let trailing = ctx.window(self.trailing_days);
        let trailing_spend = ctx.history.total_spend(trailing);
        if trailing_spend <= 0 {
            return Ok(Vec::new());
        }
        let recent_window = ctx.window(self.comparison_days);
        let recent = ctx.history.total_spend(recent_window);
        let prior = ctx
            .history
            .total_spend(recent_window.preceding(self.comparison_days));
        let growth = stats::relative_change(recent as f64, prior as f64).unwrap_or(0.0);

        let base = money::scale(trailing_spend, self.horizon_days, self.trailing_days)
            .ok_or_else(|| Error::Computation("spend forecast overflow".to_string()))?;
        let projected = money::to_minor_units(base as f64 * (1.0 + growth * self.dampening))?.max(0);
        let orders = ctx.history.orders(trailing).len();

        Ok(vec![InsightDraft::new(
            InsightType::SpendForecast,
            InsightScope::Global,
            format!("About {} of spend expected", money::format_minor(projected)),
            format!(
                "Based on the last {} days, expect to spend about {} over the next {} days.",
                self.trailing_days,
                money::format_minor(projected),
                self.horizon_days
            ),
        )
        .with_confidence((50.0 + orders.min(20) as f64 * 2.0).min(90.0))
        .with_value(projected)
        .with_reason("trailing_window", trailing.to_string())
        .with_reason("trailing_spend", trailing_spend)
        .with_reason("baseline_projection", base)
        .with_reason("recent_spend", recent)
        .with_reason("prior_spend", prior)
        .with_reason("growth_pct", round2(growth * 100.0))
        .with_reason("dampening", self.dampening)
        .with_reason("horizon_days", self.horizon_days)
        .with_reason("projected_spend", projected)])
    }
}

/// A fixed calendar date that changes what a kitchen buys
struct SeasonalEvent {
    name: &'static str,
    month: u32,
    day: u32,
    /// Days ahead of the date the reminder starts
    lead_days: i64,
}

const CALENDAR: &[SeasonalEvent] = &[
    SeasonalEvent { name: "New Year's Day", month: 1, day: 1, lead_days: 21 },
    SeasonalEvent { name: "Valentine's Day", month: 2, day: 14, lead_days: 21 },
    SeasonalEvent { name: "St. Patrick's Day", month: 3, day: 17, lead_days: 14 },
    SeasonalEvent { name: "Cinco de Mayo", month: 5, day: 5, lead_days: 14 },
    SeasonalEvent { name: "Independence Day", month: 7, day: 4, lead_days: 21 },
    SeasonalEvent { name: "Halloween", month: 10, day: 31, lead_days: 28 },
    SeasonalEvent { name: "Christmas Eve", month: 12, day: 24, lead_days: 35 },
    SeasonalEvent { name: "New Year's Eve", month: 12, day: 31, lead_days: 28 },
];

impl SeasonalEvent {
    /// Next occurrence on or after `date`
    fn next_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let this_year = NaiveDate::from_ymd_opt(date.year(), self.month, self.day)?;
        if this_year >= date {
            Some(this_year)
        } else {
            NaiveDate::from_ymd_opt(date.year() + 1, self.month, self.day)
        }
    }
}

pub fn seasonal_demand(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(SeasonalDemand {
        window_days: config.forecast.seasonal_window_days,
        urgent_days: config.forecast.seasonal_urgent_days,
        history_confidence: config.forecast.seasonal_history_confidence,
        reminder_confidence: config.forecast.seasonal_reminder_confidence,
    })
}

/// Upcoming calendar dates, with what was bought around them last year
struct SeasonalDemand {
    window_days: i64,
    urgent_days: i64,
    history_confidence: f64,
    reminder_confidence: f64,
}

const TOP_CATEGORIES: usize = 3;

impl Detector for SeasonalDemand {
    fn insight_type(&self) -> InsightType {
        InsightType::SeasonalDemand
    }

    fn name(&self) -> &'static str {
        "Seasonal demand"
    }

    fn lookback_days(&self) -> i64 {
        let lead = CALENDAR.iter().map(|e| e.lead_days).max().unwrap_or(0);
        365 + lead + self.window_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for event in CALENDAR {
            let Some(date) = event.next_after(ctx.as_of) else {
                continue;
            };
            let days_until = (date - ctx.as_of).num_days();
            if days_until > event.lead_days {
                continue;
            }
            let Some(last_year) = NaiveDate::from_ymd_opt(date.year() - 1, event.month, event.day)
            else {
                continue;
            };
            let window = DateWindow::new(
                last_year - Duration::days(self.window_days),
                last_year + Duration::days(self.window_days),
            );
            let spend = ctx.history.total_spend(window);
            let urgency = if days_until <= self.urgent_days {
                Urgency::Medium
            } else {
                Urgency::Low
            };

            let draft = if spend > 0 {
                let mut categories: Vec<(String, i64)> = ctx
                    .history
                    .category_totals(window)
                    .into_iter()
                    .map(|(name, total)| (name, total.spend))
                    .collect();
                categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                categories.truncate(TOP_CATEGORIES);
                let names: Vec<&str> = categories.iter().map(|(n, _)| n.as_str()).collect();

                InsightDraft::new(
                    InsightType::SeasonalDemand,
                    InsightScope::Global,
                    format!("{} is {}", event.name, describe_days(days_until)),
                    format!(
                        "Around {} last year you spent {}, mostly on {}. Plan orders ahead.",
                        event.name,
                        money::format_minor(spend),
                        names.join(", ")
                    ),
                )
                .with_confidence(self.history_confidence)
                .with_value(spend)
                .with_reason("top_categories", names)
            } else {
                InsightDraft::new(
                    InsightType::SeasonalDemand,
                    InsightScope::Global,
                    format!("{} is {}", event.name, describe_days(days_until)),
                    format!("{} is coming up. Consider whether it changes what you need.", event.name),
                )
                .with_confidence(self.reminder_confidence)
            };

            drafts.push(
                draft
                    .with_urgency(urgency)
                    .with_reason("event", event.name)
                    .with_reason("event_date", date.to_string())
                    .with_reason("last_year_window", window.to_string())
                    .with_reason("last_year_spend", spend)
                    .with_reason(DAYS_UNTIL_EVENT, days_until),
            );
        }
        Ok(drafts)
    }
}

pub fn year_over_year(config: &EngineConfig) -> Arc<dyn Detector> {
    let f = &config.forecast;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type: InsightType::YearOverYear,
        name: "Year over year",
        group: GroupBy::Category,
        metric: Metric::Spend,
        recent_days: f.comparison_days,
        baseline: Baseline::ShiftedBack(f.year_over_year_days),
        direction: Direction::Increase,
        threshold: f.year_over_year_threshold,
        bound: Bound::Exceeds,
        filter: None,
        gate: None,
        render: render_year_over_year,
    }))
}

fn render_year_over_year(f: &DeltaFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::YearOverYear,
            InsightScope::Category(f.key.clone()),
            format!("{} spend up {} on last year", f.key, f.change_label()),
            format!(
                "You spent {} on {} in the last {} days, against {} in the same period last year.",
                money::format_minor(f.recent.spend),
                f.key,
                f.recent_window.days(),
                money::format_minor(f.baseline.spend)
            ),
        ))
        .with_confidence(f.confidence)
        .with_value(f.recent.spend - f.baseline.spend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{categorized, date, item, HistoryBuilder};

    #[test]
    fn test_usage_forecast_is_dampened() {
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .order(45, "Sysco", "FRIES", 10.0, 400)
            .order(10, "Sysco", "FRIES", 20.0, 400)
            .context();
        let drafts = usage_forecast(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        // 20 x (1 + 1.0 x 0.6)
        assert!((drafts[0].suggested_quantity.unwrap() - 32.0).abs() < 1e-9);
        assert_eq!(drafts[0].estimated_value, 4_800);
    }

    #[test]
    fn test_usage_forecast_ignores_small_moves() {
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .order(45, "Sysco", "FRIES", 10.0, 400)
            .order(10, "Sysco", "FRIES", 11.0, 400)
            .context();
        assert!(usage_forecast(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_spend_forecast() {
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .order(70, "Sysco", "BULK", 1.0, 30_000)
            .order(40, "Sysco", "BULK", 1.0, 30_000)
            .order(10, "Sysco", "BULK", 1.0, 30_000)
            .context();
        let drafts = spend_forecast(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 30_000);
        assert_eq!(drafts[0].scope, InsightScope::Global);
    }

    #[test]
    fn test_spend_forecast_needs_history() {
        let ctx = HistoryBuilder::new(date(2026, 6, 30)).context();
        assert!(spend_forecast(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_seasonal_demand_with_and_without_history() {
        let ctx = HistoryBuilder::new(date(2026, 12, 10))
            .purchase_on(
                date(2025, 12, 22),
                "Sysco",
                vec![
                    categorized("HAM", 4.0, 5_000, "Meat"),
                    categorized("EGGNOG", 10.0, 400, "Dairy"),
                ],
            )
            .purchase_on(date(2026, 12, 1), "Sysco", vec![item("EGG", 1.0, 300)])
            .context();
        let drafts = seasonal_demand(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 2);

        let christmas = &drafts[0];
        assert_eq!(christmas.reasoning["event"], "Christmas Eve");
        assert_eq!(christmas.reasoning[DAYS_UNTIL_EVENT], 14);
        assert_eq!(christmas.estimated_value, 24_000);
        assert_eq!(christmas.confidence, 70.0);
        assert_eq!(christmas.urgency, Urgency::Low);
        assert_eq!(christmas.reasoning["top_categories"], serde_json::json!(["Meat", "Dairy"]));

        let new_years_eve = &drafts[1];
        assert_eq!(new_years_eve.estimated_value, 0);
        assert_eq!(new_years_eve.confidence, 30.0);
    }

    #[test]
    fn test_seasonal_urgency_and_confidence_are_configurable() {
        let mut config = EngineConfig::default();
        config.forecast.seasonal_urgent_days = 14;
        config.forecast.seasonal_history_confidence = 80.0;
        let ctx = HistoryBuilder::new(date(2026, 12, 10))
            .purchase_on(date(2025, 12, 22), "Sysco", vec![categorized("HAM", 4.0, 5_000, "Meat")])
            .context_with(config);
        let drafts = seasonal_demand(&ctx.config).analyze(&ctx).unwrap();
        let christmas = &drafts[0];
        assert_eq!(christmas.reasoning[DAYS_UNTIL_EVENT], 14);
        assert_eq!(christmas.urgency, Urgency::Medium);
        assert_eq!(christmas.confidence, 80.0);
    }

    #[test]
    fn test_seasonal_event_rolls_into_next_year() {
        let event = &CALENDAR[0];
        assert_eq!(event.next_after(date(2026, 12, 20)), Some(date(2027, 1, 1)));
        assert_eq!(event.next_after(date(2026, 1, 1)), Some(date(2026, 1, 1)));
    }

    #[test]
    fn test_year_over_year() {
        let ctx = HistoryBuilder::new(date(2026, 6, 30))
            .purchase(370, "Sysco", vec![categorized("STEAK", 5.0, 2_000, "Meat")])
            .purchase(5, "Sysco", vec![categorized("STEAK", 5.0, 3_000, "Meat")])
            .context();
        let drafts = year_over_year(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 5_000);
    }
}
