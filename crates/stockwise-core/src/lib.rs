//! Stockwise Core Library
//!
//! Shared functionality for the Stockwise procurement advisor:
//! - Database access and migrations (SQLCipher, pooled)
//! - CSV import of purchase line items
//! - Historical data repository contract and per-run snapshots
//! - Insight engine: detector catalog, normalisation, ranking and views
//! - Engine configuration with embedded defaults

pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod import;
pub mod insights;
pub mod models;
pub mod money;
pub mod stats;

/// Fixture builders and failing repositories for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use history::{
    DateWindow, HistoryRepository, HistorySnapshot, InMemoryHistory, VendorExclusionPolicy,
};
pub use import::{import_csv, ImportStats};
pub use insights::{
    AnalysisContext, Detector, Insight, InsightDraft, InsightEngine, InsightScope, InsightType,
    Urgency,
};
