//! Insight feed command

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use stockwise_core::{money, Database, EngineConfig, Insight, InsightEngine, Urgency};

use super::truncate;
use crate::cli::InsightView;

/// Display options for `stockwise insights`
#[derive(Debug, Clone, Copy)]
pub struct InsightsOptions<'a> {
    pub as_of: Option<&'a str>,
    pub view: InsightView,
    pub json: bool,
    pub limit: Option<usize>,
}

/// Parse a `YYYY-MM-DD` analysis date
pub fn parse_as_of(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid --as-of date '{}' (expected YYYY-MM-DD)", s))
        })
        .transpose()
}

/// Generate the selected feed, truncated to `limit`
pub async fn collect_insights(
    db: Database,
    config: EngineConfig,
    account: &str,
    as_of: Option<NaiveDate>,
    view: InsightView,
    limit: Option<usize>,
) -> Result<Vec<Insight>> {
    let engine = InsightEngine::new(Arc::new(db), config).context("Invalid engine configuration")?;

    let mut insights = match view {
        InsightView::All => engine.generate_insights(account, as_of).await,
        InsightView::Now => engine.now_relevant_insights(account, as_of).await,
        InsightView::Week => engine.week_planning_insights(account, as_of).await,
    };
    if let Some(limit) = limit {
        insights.truncate(limit);
    }
    Ok(insights)
}

pub async fn cmd_insights(
    db: Database,
    config: EngineConfig,
    account: &str,
    options: InsightsOptions<'_>,
) -> Result<()> {
    let as_of = parse_as_of(options.as_of)?;
    let insights = collect_insights(db, config, account, as_of, options.view, options.limit).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    let heading = match options.view {
        InsightView::All => "Insights",
        InsightView::Now => "Needs Attention Now",
        InsightView::Week => "This Week",
    };
    let date_label = as_of
        .map(|d| d.to_string())
        .unwrap_or_else(|| "today".to_string());

    if insights.is_empty() {
        println!("✅ No insights for '{}' as of {}.", account, date_label);
        return Ok(());
    }

    println!();
    println!("💡 {} for '{}' ({})", heading, account, date_label);
    println!("   ─────────────────────────────────────────────────────────────");

    for insight in &insights {
        println!(
            "   {} {} │ {:>3}% │ {}",
            urgency_marker(insight.urgency),
            insight.urgency.as_str().to_uppercase(),
            insight.confidence_score,
            truncate(&insight.title, 60)
        );
        println!("      {}", insight.detail);
        if insight.estimated_value_minor_units > 0 {
            println!(
                "      Value at stake: {}",
                money::format_minor(insight.estimated_value_minor_units)
            );
        }
        if let Some(quantity) = insight.suggested_quantity {
            println!("      Suggested quantity: {:.1}", quantity);
        }
        println!();
    }

    println!("   {} insights", insights.len());

    Ok(())
}

fn urgency_marker(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::High => "🔴",
        Urgency::Medium => "🟡",
        Urgency::Low => "⚪",
    }
}
