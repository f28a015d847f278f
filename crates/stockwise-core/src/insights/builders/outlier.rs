//! Observation against the trailing average of the observations before it

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::history::{DateWindow, GLOBAL_KEY};
use crate::insights::engine::{AnalysisContext, Detector};
use crate::insights::types::{InsightDraft, InsightType};
use crate::stats;

use super::{round2, strength_confidence};

/// What is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Unit price of every SKU line
    SkuPrice,
    /// Quantity per SKU order day
    SkuQuantity,
    /// Invoice total of every purchase (one global key)
    OrderTotal,
}

/// One data point in a key's series
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
    pub quantity: f64,
    pub vendor: Option<String>,
    pub purchase_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OutlierParams {
    pub insight_type: InsightType,
    pub name: &'static str,
    pub subject: Subject,
    pub window_days: i64,
    /// Prior observations averaged (most recent first)
    pub trailing: usize,
    /// Prior observations required
    pub min_history: usize,
    /// Only observations this recent are tested
    pub recent_days: i64,
    /// Minimum relative excess over the trailing average
    pub threshold: f64,
    /// Test only the latest observation of each key
    pub latest_only: bool,
    pub render: fn(&OutlierFinding, &AnalysisContext) -> Result<InsightDraft>,
}

/// An observation well above its trailing average
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierFinding {
    pub key: String,
    pub observation: Observation,
    pub trailing_average: f64,
    pub trailing_count: usize,
    /// (observation - average) / average
    pub change: f64,
    pub confidence: f64,
}

impl OutlierFinding {
    pub fn explain(&self, draft: InsightDraft) -> InsightDraft {
        draft
            .with_reason("observed_value", round2(self.observation.value))
            .with_reason("observed_date", self.observation.date.to_string())
            .with_reason("trailing_average", round2(self.trailing_average))
            .with_reason("trailing_count", self.trailing_count as u64)
            .with_reason("change_pct", round2(self.change * 100.0))
    }

    /// Excess over the trailing average
    pub fn excess(&self) -> f64 {
        self.observation.value - self.trailing_average
    }
}

pub struct TrailingOutlier {
    params: OutlierParams,
}

impl TrailingOutlier {
    pub fn new(params: OutlierParams) -> Self {
        Self { params }
    }

    fn series(&self, ctx: &AnalysisContext) -> BTreeMap<String, Vec<Observation>> {
        let window = ctx.window(self.params.window_days);
        match self.params.subject {
            Subject::SkuPrice => ctx
                .history
                .sku_price_series(window)
                .into_iter()
                .map(|(sku, points)| {
                    let obs = points
                        .into_iter()
                        .map(|p| Observation {
                            date: p.date,
                            value: p.unit_price as f64,
                            quantity: p.quantity,
                            vendor: Some(p.vendor),
                            purchase_id: Some(p.purchase_id),
                        })
                        .collect();
                    (sku, obs)
                })
                .collect(),
            Subject::SkuQuantity => ctx
                .history
                .sku_daily_orders(window)
                .into_iter()
                .map(|(sku, days)| {
                    let obs = days
                        .into_iter()
                        .map(|d| Observation {
                            date: d.date,
                            value: d.quantity,
                            quantity: d.quantity,
                            vendor: None,
                            purchase_id: None,
                        })
                        .collect();
                    (sku, obs)
                })
                .collect(),
            Subject::OrderTotal => {
                let obs = ctx
                    .history
                    .orders(window)
                    .into_iter()
                    .map(|o| Observation {
                        date: o.date,
                        value: o.total as f64,
                        quantity: o.quantity,
                        vendor: Some(o.vendor),
                        purchase_id: Some(o.purchase_id),
                    })
                    .collect();
                BTreeMap::from([(GLOBAL_KEY.to_string(), obs)])
            }
        }
    }

    pub fn findings(&self, ctx: &AnalysisContext) -> Vec<OutlierFinding> {
        let p = &self.params;
        let recent = DateWindow::ending(ctx.as_of, p.recent_days);

        let mut findings = Vec::new();
        for (key, series) in self.series(ctx) {
            let candidates: Vec<usize> = if p.latest_only {
                series.len().checked_sub(1).into_iter().collect()
            } else {
                (0..series.len()).collect()
            };

            for index in candidates {
                let observation = &series[index];
                if !recent.contains(observation.date) {
                    continue;
                }
                let prior: Vec<f64> = series[..index]
                    .iter()
                    .rev()
                    .take(p.trailing)
                    .map(|o| o.value)
                    .collect();
                if prior.len() < p.min_history {
                    continue;
                }
                let Some(average) = stats::mean(&prior) else {
                    continue;
                };
                let Some(change) = stats::relative_change(observation.value, average) else {
                    continue;
                };
                if change <= p.threshold {
                    continue;
                }
                findings.push(OutlierFinding {
                    key: key.clone(),
                    observation: observation.clone(),
                    trailing_average: average,
                    trailing_count: prior.len(),
                    change,
                    confidence: strength_confidence(change, p.threshold, prior.len()),
                });
            }
        }
        findings
    }
}

impl Detector for TrailingOutlier {
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
        self.params.min_history + 1
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
        self.findings(ctx)
            .iter()
            .map(|finding| (self.params.render)(finding, ctx))
            .collect()
    }
}
