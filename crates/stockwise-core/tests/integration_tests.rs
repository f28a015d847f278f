//! Integration tests for stockwise-core
//!
//! These tests exercise the full import → history → insights workflow.

use std::sync::Arc;

use chrono::NaiveDate;
use stockwise_core::{
    import::parse_purchases, import_csv, Database, EngineConfig, HistoryRepository,
    InMemoryHistory, Insight, InsightEngine, InsightScope, InsightType, Urgency,
};

const ACCOUNT: &str = "corner-bistro";

/// Monthly egg orders on a ~30 day cycle (days 0, 30, 61, 89 from Jan 1),
/// plus linen service from a rental company on the same cycle and a
/// pending order that must not count.
fn purchase_csv() -> &'static str {
    "\
date,vendor,order_ref,sku,description,quantity,unit_price,line_total,category,status
2026-01-01,Sysco,INV-1,EGG,Large eggs (dozen),20,3.00,,Dairy,
2026-01-01,Sysco,INV-1,FLOUR,Bread flour,2,18.00,,Dry goods,
2026-01-31,Sysco,INV-2,EGG,Large eggs (dozen),20,3.00,,Dairy,
2026-03-03,Sysco,INV-3,EGG,Large eggs (dozen),20,3.00,,Dairy,
2026-03-31,Sysco,INV-4,EGG,Large eggs (dozen),20,3.00,,Dairy,
2026-04-20,Sysco,INV-5,EGG,Large eggs (dozen),60,3.00,,Dairy,pending
2026-01-01,City Linen Rental,L-1,LINEN,Table linen service,1,150.00,,Linen,
2026-01-31,City Linen Rental,L-2,LINEN,Table linen service,1,150.00,,Linen,
2026-03-03,City Linen Rental,L-3,LINEN,Table linen service,1,150.00,,Linen,
2026-03-31,City Linen Rental,L-4,LINEN,Table linen service,1,150.00,,Linen,
"
}

fn as_of() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2026, 4, 26)
}

fn imported_db() -> Database {
    let db = Database::in_memory().expect("Failed to create test database");
    import_csv(&db, purchase_csv().as_bytes(), ACCOUNT).expect("Failed to import CSV");
    db
}

fn memory_history() -> InMemoryHistory {
    let memory = InMemoryHistory::new();
    for purchase in parse_purchases(purchase_csv().as_bytes(), ACCOUNT).unwrap() {
        memory.insert(&purchase).unwrap();
    }
    memory
}

fn engine(repository: Arc<dyn HistoryRepository>, config: EngineConfig) -> InsightEngine {
    InsightEngine::new(repository, config).expect("Failed to create engine")
}

/// Order-insensitive fingerprint of a feed
fn fingerprint(insights: &[Insight]) -> Vec<(String, String, i64, u8)> {
    let mut rows: Vec<_> = insights
        .iter()
        .map(|i| {
            (
                i.insight_type.as_str().to_string(),
                i.scope.to_string(),
                i.estimated_value_minor_units,
                i.confidence_score,
            )
        })
        .collect();
    rows.sort();
    rows
}

// =============================================================================
// Import Integration Tests
// =============================================================================

#[test]
fn test_full_import_workflow() {
    let db = Database::in_memory().unwrap();

    let stats = import_csv(&db, purchase_csv().as_bytes(), ACCOUNT).unwrap();
    assert_eq!(stats.rows, 10);
    assert_eq!(stats.purchases, 9);
    assert_eq!(stats.inserted, 9);
    assert_eq!(db.count_purchases(Some(ACCOUNT)).unwrap(), 9);

    // Re-importing the same file is a no-op
    let again = import_csv(&db, purchase_csv().as_bytes(), ACCOUNT).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 9);

    let first = &db.list_purchases(ACCOUNT, 100).unwrap();
    let opening = first
        .iter()
        .find(|p| p.vendor == "Sysco" && p.order_date() == NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        .expect("opening order");
    assert_eq!(opening.total_amount, 6_000 + 3_600);
    assert_eq!(db.get_line_items(opening.id).unwrap().len(), 2);
}

// =============================================================================
// Insight Engine Integration Tests
// =============================================================================

#[tokio::test]
async fn test_reorder_insight_from_imported_history() {
    let engine = engine(Arc::new(imported_db()), EngineConfig::default());
    let insights = engine.generate_insights(ACCOUNT, as_of()).await;

    let reorder: Vec<_> = insights
        .iter()
        .filter(|i| i.insight_type == InsightType::ReorderPrediction)
        .collect();
    assert_eq!(reorder.len(), 1);
    let eggs = reorder[0];
    assert_eq!(eggs.scope, InsightScope::Sku("EGG".to_string()));
    assert!(matches!(eggs.urgency, Urgency::Medium | Urgency::High));
    // The pending 60-unit order does not move the typical quantity
    let quantity = eggs.suggested_quantity.unwrap();
    assert!((quantity - 20.0).abs() < 1e-9);
    assert!(eggs.confidence_score <= 100);
}

#[tokio::test]
async fn test_reorder_not_due_yet() {
    let engine = engine(Arc::new(imported_db()), EngineConfig::default());
    let insights = engine
        .generate_insights(ACCOUNT, NaiveDate::from_ymd_opt(2026, 4, 4))
        .await;
    assert!(insights
        .iter()
        .all(|i| i.insight_type != InsightType::ReorderPrediction));
}

#[tokio::test]
async fn test_excluded_vendor_never_mentioned() {
    let engine = engine(Arc::new(imported_db()), EngineConfig::default());
    let insights = engine.generate_insights(ACCOUNT, as_of()).await;
    assert!(!insights.is_empty());
    assert!(insights.iter().all(|i| !i.mentions_vendor("City Linen Rental")));
}

#[tokio::test]
async fn test_vendor_included_when_exclusions_cleared() {
    let config = EngineConfig {
        excluded_vendors: Vec::new(),
        ..EngineConfig::default()
    };
    let engine = engine(Arc::new(imported_db()), config);
    let insights = engine.generate_insights(ACCOUNT, as_of()).await;
    assert!(insights.iter().any(|i| i.mentions_vendor("City Linen Rental")));
}

#[tokio::test]
async fn test_database_and_memory_repositories_agree() {
    let from_db = engine(Arc::new(imported_db()), EngineConfig::default())
        .generate_insights(ACCOUNT, as_of())
        .await;
    let from_memory = engine(Arc::new(memory_history()), EngineConfig::default())
        .generate_insights(ACCOUNT, as_of())
        .await;

    assert!(!from_db.is_empty());
    assert_eq!(fingerprint(&from_db), fingerprint(&from_memory));
}

#[tokio::test]
async fn test_accounts_are_isolated() {
    let engine = engine(Arc::new(imported_db()), EngineConfig::default());
    let insights = engine.generate_insights("another-account", as_of()).await;
    assert!(insights.is_empty());
}

#[tokio::test]
async fn test_budget_pacing_from_imported_history() {
    let csv = "\
date,vendor,sku,description,quantity,unit_price
2026-03-15,Sysco,BULK,Monthly stock,1,10000.00
2026-04-15,Sysco,BULK,Monthly stock,1,10000.00
2026-05-15,Sysco,BULK,Monthly stock,1,10000.00
2026-06-05,Sysco,BULK,Monthly stock,1,4000.00
";
    let db = Database::in_memory().unwrap();
    import_csv(&db, csv.as_bytes(), ACCOUNT).unwrap();

    let engine = engine(Arc::new(db), EngineConfig::default());
    let insights = engine
        .now_relevant_insights(ACCOUNT, NaiveDate::from_ymd_opt(2026, 6, 10))
        .await;

    let pacing = insights
        .iter()
        .find(|i| i.insight_type == InsightType::BudgetPacing)
        .expect("budget pacing insight");
    assert!(matches!(pacing.urgency, Urgency::Medium | Urgency::High));
    assert_eq!(pacing.estimated_value_minor_units, 200_000);
}

#[tokio::test]
async fn test_feed_is_deterministic() {
    let engine = engine(Arc::new(imported_db()), EngineConfig::default());
    let first = engine.generate_insights(ACCOUNT, as_of()).await;
    let second = engine.generate_insights(ACCOUNT, as_of()).await;
    assert_eq!(first, second);

    let json = serde_json::to_value(&first).unwrap();
    let top = &json[0];
    assert!(top.get("type").is_some());
    assert!(top.get("estimated_value_minor_units").is_some());
    assert!(top.get("confidence_score").is_some());
}
