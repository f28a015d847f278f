//! Price and spend detectors

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::{DateWindow, GroupBy};
use crate::insights::builders::{
    percent, round2, strength_confidence, Baseline, Bound, DeltaFinding, DeltaParams, Direction,
    Metric, OutlierFinding, OutlierParams, Subject, TrailingOutlier, WindowDelta,
};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightScope, InsightType, Urgency};
use crate::money;
use crate::stats;

use super::{reaches_multiple, severity_urgency};

pub fn price_anomaly(config: &EngineConfig) -> Arc<dyn Detector> {
    let p = &config.pricing;
    Arc::new(TrailingOutlier::new(OutlierParams {
        insight_type: InsightType::PriceAnomaly,
        name: "Price anomaly",
        subject: Subject::SkuPrice,
        window_days: p.window_days,
        trailing: p.anomaly_trailing_orders,
        min_history: p.anomaly_min_history,
        recent_days: p.anomaly_recent_days,
        threshold: p.anomaly_threshold,
        latest_only: true,
        render: render_anomaly,
    }))
}

fn render_anomaly(f: &OutlierFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let p = &ctx.config.pricing;
    let label = ctx.history.sku_label(&f.key);
    let vendor = f.observation.vendor.clone().unwrap_or_default();
    let impact = money::to_minor_units(f.excess() * f.observation.quantity)?;
    let draft = InsightDraft::new(
        InsightType::PriceAnomaly,
        InsightScope::Sku(f.key.clone()),
        format!("{} price up {}", label, percent(f.change)),
        format!(
            "{} charged {} per unit on {}, against a recent average of {}.",
            vendor,
            money::format_minor(f.observation.value as i64),
            f.observation.date,
            money::format_minor(f.trailing_average.round() as i64)
        ),
    );
    Ok(f.explain(draft)
        .with_urgency(severity_urgency(
            f.change,
            p.anomaly_threshold,
            p.severity_medium_multiple,
            p.severity_high_multiple,
        ))
        .with_confidence(f.confidence)
        .with_value(impact)
        .with_reason("vendor", vendor)
        .with_reason("quantity", round2(f.observation.quantity)))
}

pub fn price_drop(config: &EngineConfig) -> Arc<dyn Detector> {
    let p = &config.pricing;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type: InsightType::PriceDrop,
        name: "Price drop",
        group: GroupBy::Sku,
        metric: Metric::AverageUnitPrice,
        recent_days: p.drop_recent_days,
        baseline: Baseline::Preceding(p.drop_baseline_days - p.drop_recent_days),
        direction: Direction::Decrease,
        threshold: p.drop_threshold,
        bound: Bound::Exceeds,
        filter: None,
        gate: None,
        render: render_drop,
    }))
}

fn render_drop(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    // Typical order size over both windows together
    let span = DateWindow::new(f.baseline_window.start, f.recent_window.end);
    let quantities: Vec<f64> = ctx
        .history
        .sku_daily_orders(span)
        .get(&f.key)
        .map(|days| days.iter().map(|d| d.quantity).collect())
        .unwrap_or_default();
    let typical = stats::mean(&quantities).unwrap_or(0.0);
    let saving = money::to_minor_units((f.baseline_value - f.recent_value) * typical)?;

    let mut draft = f
        .explain(InsightDraft::new(
            InsightType::PriceDrop,
            InsightScope::Sku(f.key.clone()),
            format!("{} is {} cheaper", label, f.change_label()),
            format!(
                "{} averaged {} per unit over the last {} days, down from {}. A good time to stock up.",
                label,
                money::format_minor(f.recent_value.round() as i64),
                f.recent_window.days(),
                money::format_minor(f.baseline_value.round() as i64)
            ),
        ))
        .with_urgency(Urgency::Medium)
        .with_confidence(f.confidence)
        .with_value(saving)
        .with_reason("typical_quantity", round2(typical));
    if typical > 0.0 {
        draft = draft.with_quantity(typical * ctx.config.pricing.drop_restock_multiplier);
    }
    Ok(draft)
}

pub fn price_trend(config: &EngineConfig) -> Arc<dyn Detector> {
    let p = &config.pricing;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type: InsightType::PriceTrend,
        name: "Price trend",
        group: GroupBy::Sku,
        metric: Metric::AverageUnitPrice,
        recent_days: p.trend_recent_days,
        baseline: Baseline::Preceding(p.trend_baseline_days),
        direction: Direction::Increase,
        threshold: p.trend_threshold,
        bound: Bound::Exceeds,
        filter: None,
        gate: None,
        render: render_trend,
    }))
}

fn render_trend(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    let label = ctx.history.sku_label(&f.key);
    let impact =
        money::to_minor_units((f.recent_value - f.baseline_value) * f.recent.quantity)?;
    let p = &ctx.config.pricing;
    let urgency = if reaches_multiple(f.change, p.trend_threshold, p.trend_medium_multiple) {
        Urgency::Medium
    } else {
        Urgency::Low
    };
    Ok(f
        .explain(InsightDraft::new(
            InsightType::PriceTrend,
            InsightScope::Sku(f.key.clone()),
            format!("{} price trending up", label),
            format!(
                "The average price of {} rose {} compared with the previous {} days.",
                label,
                f.change_label(),
                f.baseline_window.days()
            ),
        ))
        .with_urgency(urgency)
        .with_confidence(f.confidence)
        .with_value(impact))
}

pub fn price_volatility(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(PriceVolatility {
        window_days: config.pricing.window_days,
        max_cov: config.pricing.volatility_max_cov,
        min_points: config.pricing.volatility_min_points,
    })
}

/// SKUs whose unit price swings widely
struct PriceVolatility {
    window_days: i64,
    max_cov: f64,
    min_points: usize,
}

impl Detector for PriceVolatility {
    fn insight_type(&self) -> InsightType {
        InsightType::PriceVolatility
    }

    fn name(&self) -> &'static str {
        "Price volatility"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        self.min_points
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (sku, points) in ctx.history.sku_price_series(ctx.window(self.window_days)) {
            if points.len() < self.min_points {
                continue;
            }
            let prices: Vec<f64> = points.iter().map(|p| p.unit_price as f64).collect();
            let Some(cov) = stats::coefficient_of_variation(&prices) else {
                continue;
            };
            if cov <= self.max_cov {
                continue;
            }
            let Some(mean) = stats::mean(&prices) else {
                continue;
            };
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let quantity: f64 = points.iter().map(|p| p.quantity).sum();
            let impact = money::to_minor_units((mean - min) * quantity)?;

            let label = ctx.history.sku_label(&sku);
            drafts.push(
                InsightDraft::new(
                    InsightType::PriceVolatility,
                    InsightScope::Sku(sku.clone()),
                    format!("{} price is unstable", label),
                    format!(
                        "Unit prices for {} ranged from {} to {} over {} purchases.",
                        label,
                        money::format_minor(min as i64),
                        money::format_minor(max as i64),
                        points.len()
                    ),
                )
                .with_confidence(strength_confidence(cov, self.max_cov, points.len()))
                .with_value(impact)
                .with_reason("price_points", points.len() as u64)
                .with_reason("mean_price", round2(mean))
                .with_reason("min_price", min)
                .with_reason("max_price", max)
                .with_reason("coefficient_of_variation", round2(cov)),
            );
        }
        Ok(drafts)
    }
}

pub fn vendor_price_comparison(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(VendorPriceComparison {
        window_days: config.pricing.window_days,
        gap_threshold: config.pricing.vendor_gap_threshold,
        medium_multiple: config.pricing.vendor_gap_medium_multiple,
    })
}

/// The same SKU bought cheaper from another vendor
struct VendorPriceComparison {
    window_days: i64,
    gap_threshold: f64,
    medium_multiple: f64,
}

#[derive(Default)]
struct VendorPrice {
    price_sum: f64,
    points: usize,
    quantity: f64,
}

impl VendorPrice {
    fn average(&self) -> f64 {
        self.price_sum / self.points.max(1) as f64
    }
}

impl Detector for VendorPriceComparison {
    fn insight_type(&self) -> InsightType {
        InsightType::VendorPriceComparison
    }

    fn name(&self) -> &'static str {
        "Vendor price comparison"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn min_data_points(&self) -> usize {
        2
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (sku, points) in ctx.history.sku_price_series(ctx.window(self.window_days)) {
            let mut vendors: BTreeMap<String, VendorPrice> = BTreeMap::new();
            for point in points {
                let entry = vendors.entry(point.vendor).or_default();
                entry.price_sum += point.unit_price as f64;
                entry.points += 1;
                entry.quantity += point.quantity;
            }
            if vendors.len() < 2 {
                continue;
            }
            let Some((cheapest, best)) = vendors
                .iter()
                .min_by(|a, b| a.1.average().total_cmp(&b.1.average()))
                .map(|(name, price)| (name.clone(), price.average()))
            else {
                continue;
            };

            let label = ctx.history.sku_label(&sku);
            for (vendor, price) in &vendors {
                if *vendor == cheapest {
                    continue;
                }
                let average = price.average();
                let Some(gap) = stats::relative_change(average, best) else {
                    continue;
                };
                if gap <= self.gap_threshold {
                    continue;
                }
                let impact = money::to_minor_units((average - best) * price.quantity)?;
                let urgency = if reaches_multiple(gap, self.gap_threshold, self.medium_multiple) {
                    Urgency::Medium
                } else {
                    Urgency::Low
                };
                drafts.push(
                    InsightDraft::new(
                        InsightType::VendorPriceComparison,
                        InsightScope::Sku(sku.clone()),
                        format!("{} is cheaper at {}", label, cheapest),
                        format!(
                            "{} charges {} more than {} for {}.",
                            vendor,
                            percent(gap),
                            cheapest,
                            label
                        ),
                    )
                    .with_urgency(urgency)
                    .with_confidence(strength_confidence(gap, self.gap_threshold, price.points))
                    .with_value(impact)
                    .with_reason("vendor", vendor.as_str())
                    .with_reason("vendor_average_price", round2(average))
                    .with_reason("cheapest_vendor", cheapest.as_str())
                    .with_reason("cheapest_average_price", round2(best))
                    .with_reason("gap_pct", round2(gap * 100.0))
                    .with_reason("quantity", round2(price.quantity)),
                );
            }
        }
        Ok(drafts)
    }
}

pub fn vendor_price_increase(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(VendorPriceIncrease {
        recent_days: config.pricing.trend_recent_days,
        baseline_days: config.pricing.trend_baseline_days,
        threshold: config.pricing.vendor_increase_threshold,
        medium_multiple: config.pricing.severity_medium_multiple,
        high_multiple: config.pricing.severity_high_multiple,
    })
}

/// Spend-weighted price change across everything a vendor sells you
struct VendorPriceIncrease {
    recent_days: i64,
    baseline_days: i64,
    threshold: f64,
    medium_multiple: f64,
    high_multiple: f64,
}

#[derive(Default)]
struct SkuPrices {
    price_sum: f64,
    points: usize,
    quantity: f64,
    spend: i64,
}

fn vendor_sku_prices(
    ctx: &AnalysisContext,
    window: DateWindow,
) -> BTreeMap<String, BTreeMap<String, SkuPrices>> {
    let mut acc: BTreeMap<String, BTreeMap<String, SkuPrices>> = BTreeMap::new();
    for line in ctx.history.lines(window) {
        let Some(sku) = line.sku_key() else {
            continue;
        };
        let entry = acc
            .entry(line.vendor.clone())
            .or_default()
            .entry(sku.to_string())
            .or_default();
        entry.price_sum += line.unit_price as f64;
        entry.points += 1;
        entry.quantity += line.quantity;
        entry.spend += line.line_total;
    }
    acc
}

impl Detector for VendorPriceIncrease {
    fn insight_type(&self) -> InsightType {
        InsightType::VendorPriceIncrease
    }

    fn name(&self) -> &'static str {
        "Vendor price increase"
    }

    fn lookback_days(&self) -> i64 {
        self.recent_days + self.baseline_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let recent_window = ctx.window(self.recent_days);
        let baseline_window = recent_window.preceding(self.baseline_days);
        let recent = vendor_sku_prices(ctx, recent_window);
        let baseline = vendor_sku_prices(ctx, baseline_window);

        let mut drafts = Vec::new();
        for (vendor, skus) in recent {
            let Some(before) = baseline.get(&vendor) else {
                continue;
            };
            let mut weighted = 0.0;
            let mut weight = 0i64;
            let mut impact = 0.0;
            let mut compared = 0usize;
            for (sku, now) in &skus {
                let Some(then) = before.get(sku) else {
                    continue;
                };
                let now_avg = now.price_sum / now.points.max(1) as f64;
                let then_avg = then.price_sum / then.points.max(1) as f64;
                let Some(change) = stats::relative_change(now_avg, then_avg) else {
                    continue;
                };
                weighted += change * now.spend as f64;
                weight += now.spend;
                impact += (now_avg - then_avg) * now.quantity;
                compared += 1;
            }
            let Some(change) = stats::share(weighted, weight as f64) else {
                continue;
            };
            if change <= self.threshold {
                continue;
            }

            drafts.push(
                InsightDraft::new(
                    InsightType::VendorPriceIncrease,
                    InsightScope::Vendor(vendor.clone()),
                    format!("{} raised prices {}", vendor, percent(change)),
                    format!(
                        "Across {} items bought in both periods, {} prices rose {} on average (weighted by spend).",
                        compared,
                        vendor,
                        percent(change)
                    ),
                )
                .with_urgency(severity_urgency(
                    change,
                    self.threshold,
                    self.medium_multiple,
                    self.high_multiple,
                ))
                .with_confidence(strength_confidence(change, self.threshold, compared))
                .with_value(money::to_minor_units(impact.max(0.0))?)
                .with_reason("skus_compared", compared as u64)
                .with_reason("weighted_change_pct", round2(change * 100.0))
                .with_reason("recent_spend", weight)
                .with_reason("recent_window", recent_window.to_string())
                .with_reason("baseline_window", baseline_window.to_string()),
            );
        }
        Ok(drafts)
    }
}

fn spend_delta(
    config: &EngineConfig,
    insight_type: InsightType,
    name: &'static str,
    group: GroupBy,
    direction: Direction,
    render: fn(&DeltaFinding, &AnalysisContext) -> Result<InsightDraft>,
) -> Arc<dyn Detector> {
    let p = &config.pricing;
    Arc::new(WindowDelta::new(DeltaParams {
        insight_type,
        name,
        group,
        metric: Metric::Spend,
        recent_days: p.spend_comparison_days,
        baseline: Baseline::Preceding(p.spend_comparison_days),
        direction,
        threshold: p.spend_spike_threshold,
        bound: Bound::Exceeds,
        filter: None,
        gate: None,
        render,
    }))
}

fn spike_urgency(f: &DeltaFinding, ctx: &AnalysisContext) -> Urgency {
    let p = &ctx.config.pricing;
    if reaches_multiple(f.change, p.spend_spike_threshold, p.spend_spike_medium_multiple) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

pub fn category_spend_spike(config: &EngineConfig) -> Arc<dyn Detector> {
    spend_delta(
        config,
        InsightType::CategorySpendSpike,
        "Category spend spike",
        GroupBy::Category,
        Direction::Increase,
        render_category_spike,
    )
}

fn render_category_spike(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::CategorySpendSpike,
            InsightScope::Category(f.key.clone()),
            format!("{} spend up {}", f.key, f.change_label()),
            format!(
                "You spent {} on {} in the last {} days, against {} the period before.",
                money::format_minor(f.recent.spend),
                f.key,
                f.recent_window.days(),
                money::format_minor(f.baseline.spend)
            ),
        ))
        .with_urgency(spike_urgency(f, ctx))
        .with_confidence(f.confidence)
        .with_value(f.recent.spend - f.baseline.spend))
}

pub fn category_spend_drop(config: &EngineConfig) -> Arc<dyn Detector> {
    spend_delta(
        config,
        InsightType::CategorySpendDrop,
        "Category spend drop",
        GroupBy::Category,
        Direction::Decrease,
        render_category_drop,
    )
}

fn render_category_drop(f: &DeltaFinding, _ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::CategorySpendDrop,
            InsightScope::Category(f.key.clone()),
            format!("{} spend down {}", f.key, f.change_label()),
            format!(
                "You spent {} on {} in the last {} days, against {} the period before.",
                money::format_minor(f.recent.spend),
                f.key,
                f.recent_window.days(),
                money::format_minor(f.baseline.spend)
            ),
        ))
        .with_confidence(f.confidence))
}

pub fn vendor_spend_spike(config: &EngineConfig) -> Arc<dyn Detector> {
    spend_delta(
        config,
        InsightType::VendorSpendSpike,
        "Vendor spend spike",
        GroupBy::Vendor,
        Direction::Increase,
        render_vendor_spike,
    )
}

fn render_vendor_spike(f: &DeltaFinding, ctx: &AnalysisContext) -> Result<InsightDraft> {
    Ok(f
        .explain(InsightDraft::new(
            InsightType::VendorSpendSpike,
            InsightScope::Vendor(f.key.clone()),
            format!("{} spend up {}", f.key, f.change_label()),
            format!(
                "Spend with {} reached {} in the last {} days, against {} the period before.",
                f.key,
                money::format_minor(f.recent.spend),
                f.recent_window.days(),
                money::format_minor(f.baseline.spend)
            ),
        ))
        .with_urgency(spike_urgency(f, ctx))
        .with_confidence(f.confidence)
        .with_value(f.recent.spend - f.baseline.spend))
}

pub fn rebate_opportunity(config: &EngineConfig) -> Arc<dyn Detector> {
    Arc::new(RebateOpportunity {
        min_annual_spend: config.pricing.rebate_min_annual_spend,
        rate: config.pricing.rebate_rate,
        window_days: config.pricing.rebate_window_days,
    })
}

/// Vendors with enough annual spend to negotiate a volume rebate
struct RebateOpportunity {
    min_annual_spend: i64,
    rate: f64,
    window_days: i64,
}

impl Detector for RebateOpportunity {
    fn insight_type(&self) -> InsightType {
        InsightType::RebateOpportunity
    }

    fn name(&self) -> &'static str {
        "Rebate opportunity"
    }

    fn lookback_days(&self) -> i64 {
        self.window_days
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        let mut drafts = Vec::new();
        for (vendor, total) in ctx.history.vendor_totals(ctx.window(self.window_days)) {
            if total.spend < self.min_annual_spend {
                continue;
            }
            let rebate = money::apply_rate(total.spend, self.rate)?;
            drafts.push(
                InsightDraft::new(
                    InsightType::RebateOpportunity,
                    InsightScope::Vendor(vendor.clone()),
                    format!("Ask {} for a volume rebate", vendor),
                    format!(
                        "You spent {} with {} over the last {} days. A {} rebate would return {}.",
                        money::format_minor(total.spend),
                        vendor,
                        self.window_days,
                        percent(self.rate),
                        money::format_minor(rebate)
                    ),
                )
                .with_confidence(50.0 + (total.orders.min(20) as f64) * 2.0)
                .with_value(rebate)
                .with_reason("annual_spend", total.spend)
                .with_reason("order_count", total.orders as u64)
                .with_reason("rebate_rate", self.rate),
            );
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{categorized, date, item, HistoryBuilder};

    const AS_OF: (i32, u32, u32) = (2026, 6, 30);

    fn builder() -> HistoryBuilder {
        HistoryBuilder::new(date(AS_OF.0, AS_OF.1, AS_OF.2))
    }

    fn priced(latest: i64) -> AnalysisContext {
        builder()
            .order(60, "Sysco", "EGG", 10.0, 1_000)
            .order(40, "Sysco", "EGG", 10.0, 1_000)
            .order(20, "Sysco", "EGG", 10.0, 1_000)
            .order(2, "Sysco", "EGG", 10.0, latest)
            .context()
    }

    #[test]
    fn test_price_anomaly_fifteen_percent_up() {
        let ctx = priced(1_150);
        let drafts = price_anomaly(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 1_500);
        assert_ne!(drafts[0].urgency, Urgency::High);
        assert_eq!(drafts[0].reasoning["vendor"], "Sysco");
    }

    #[test]
    fn test_price_anomaly_at_exactly_ten_percent_is_not_flagged() {
        let ctx = priced(1_100);
        assert!(price_anomaly(&ctx.config).analyze(&ctx).unwrap().is_empty());

        let ctx = priced(1_101);
        assert_eq!(price_anomaly(&ctx.config).analyze(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_price_anomaly_urgency_follows_configured_multiples() {
        let ctx = priced(1_150);
        let drafts = price_anomaly(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts[0].urgency, Urgency::Medium);

        let mut config = EngineConfig::default();
        config.pricing.severity_medium_multiple = 2.0;
        config.pricing.severity_high_multiple = 4.0;
        let ctx = builder()
            .order(60, "Sysco", "EGG", 10.0, 1_000)
            .order(40, "Sysco", "EGG", 10.0, 1_000)
            .order(20, "Sysco", "EGG", 10.0, 1_000)
            .order(2, "Sysco", "EGG", 10.0, 1_150)
            .context_with(config);
        let drafts = price_anomaly(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts[0].urgency, Urgency::Low);
    }

    #[test]
    fn test_price_anomaly_ignores_cheaper_price() {
        let ctx = priced(850);
        assert!(price_anomaly(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_price_drop_fifteen_percent_down() {
        let ctx = priced(850);
        let drafts = price_drop(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.urgency, Urgency::Medium);
        // typical quantity 10, saving (1000 - 850) x 10
        assert_eq!(draft.estimated_value, 1_500);
        assert_eq!(draft.suggested_quantity, Some(20.0));

        let ctx = priced(1_150);
        assert!(price_drop(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_price_trend() {
        let ctx = builder()
            .order(80, "Sysco", "FLOUR", 5.0, 2_000)
            .order(50, "Sysco", "FLOUR", 5.0, 2_000)
            .order(10, "Sysco", "FLOUR", 5.0, 2_200)
            .context();
        let drafts = price_trend(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_value, 1_000);
        assert_eq!(drafts[0].urgency, Urgency::Low);
    }

    #[test]
    fn test_price_volatility() {
        let mut b = builder();
        for (days_ago, price) in [(70, 1_000), (55, 1_600), (40, 700), (25, 1_500), (10, 800)] {
            b = b.order(days_ago, "Fresh Farms", "BASIL", 1.0, price);
        }
        let b = b
            .order(60, "Sysco", "SALT", 1.0, 100)
            .order(45, "Sysco", "SALT", 1.0, 100)
            .order(30, "Sysco", "SALT", 1.0, 100)
            .order(15, "Sysco", "SALT", 1.0, 100)
            .order(5, "Sysco", "SALT", 1.0, 100);
        let ctx = b.context();
        let drafts = price_volatility(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Sku("BASIL".to_string()));
        // (mean 1120 - min 700) x 5 units
        assert_eq!(drafts[0].estimated_value, 2_100);
    }

    #[test]
    fn test_vendor_price_comparison() {
        let ctx = builder()
            .order(30, "Sysco", "OIL", 4.0, 1_200)
            .order(20, "Sysco", "OIL", 6.0, 1_200)
            .order(10, "Fresh Farms", "OIL", 2.0, 1_000)
            .order(12, "Metro", "OIL", 3.0, 1_050)
            .context();
        let drafts = vendor_price_comparison(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].reasoning["vendor"], "Sysco");
        assert_eq!(drafts[0].reasoning["cheapest_vendor"], "Fresh Farms");
        assert_eq!(drafts[0].estimated_value, 2_000);
    }

    #[test]
    fn test_vendor_price_comparison_at_exactly_the_gap_is_not_flagged() {
        let ctx = builder()
            .order(30, "Sysco", "OIL", 4.0, 1_100)
            .order(10, "Fresh Farms", "OIL", 2.0, 1_000)
            .context();
        assert!(vendor_price_comparison(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_vendor_price_increase_is_spend_weighted() {
        let ctx = builder()
            .purchase(50, "Sysco", vec![item("EGG", 10.0, 1_000), item("SALT", 1.0, 100)])
            .purchase(5, "Sysco", vec![item("EGG", 10.0, 1_100), item("SALT", 1.0, 100)])
            .context();
        let drafts = vendor_price_increase(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        // 10% on 11,000 of spend, 0% on 100
        let change = drafts[0].reasoning["weighted_change_pct"].as_f64().unwrap();
        assert!((change - 9.91).abs() < 0.01);
        assert_eq!(drafts[0].estimated_value, 1_000);
    }

    #[test]
    fn test_category_spend_spike_and_drop() {
        let ctx = builder()
            .purchase(45, "Sysco", vec![categorized("STEAK", 10.0, 2_000, "Meat")])
            .purchase(5, "Sysco", vec![categorized("STEAK", 15.0, 2_000, "Meat")])
            .purchase(45, "Sysco", vec![categorized("FLOUR", 10.0, 500, "Dry")])
            .purchase(5, "Sysco", vec![categorized("FLOUR", 5.0, 500, "Dry")])
            .context();
        let spikes = category_spend_spike(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].scope, InsightScope::Category("Meat".to_string()));
        assert_eq!(spikes[0].estimated_value, 10_000);

        let drops = category_spend_drop(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].scope, InsightScope::Category("Dry".to_string()));
        assert_eq!(drops[0].estimated_value, 0);
    }

    #[test]
    fn test_spend_spike_at_exactly_twenty_five_percent_is_not_flagged() {
        let ctx = builder()
            .purchase(45, "Sysco", vec![categorized("STEAK", 2.0, 2_000, "Meat")])
            .purchase(5, "Sysco", vec![categorized("STEAK", 2.5, 2_000, "Meat")])
            .context();
        assert!(category_spend_spike(&ctx.config).analyze(&ctx).unwrap().is_empty());
        assert!(vendor_spend_spike(&ctx.config).analyze(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_vendor_spend_spike() {
        let ctx = builder()
            .order(40, "Metro", "OIL", 1.0, 10_000)
            .order(3, "Metro", "OIL", 2.0, 10_000)
            .context();
        let drafts = vendor_spend_spike(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].urgency, Urgency::Medium);
    }

    #[test]
    fn test_rebate_opportunity() {
        let mut b = builder();
        for month in 0..12 {
            b = b.order(month * 30, "Sysco", "BULK", 1.0, 500_000);
        }
        let ctx = b.order(10, "Metro", "OIL", 1.0, 10_000).context();
        let drafts = rebate_opportunity(&ctx.config).analyze(&ctx).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].scope, InsightScope::Vendor("Sysco".to_string()));
        assert_eq!(drafts[0].estimated_value, 120_000);
    }

    #[test]
    fn test_rebate_window_is_configurable() {
        let mut config = EngineConfig::default();
        config.pricing.rebate_window_days = 100;
        let mut b = builder();
        for month in 0..12 {
            b = b.order(month * 30, "Sysco", "BULK", 1.0, 500_000);
        }
        let ctx = b.context_with(config);
        let detector = rebate_opportunity(&ctx.config);
        assert_eq!(detector.lookback_days(), 100);
        // four orders inside 100 days come to 2,000,000, under the minimum
        assert!(detector.analyze(&ctx).unwrap().is_empty());
    }
}
