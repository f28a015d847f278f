//! Insight Engine - Proactive Procurement Insights
//!
//! The Insight Engine runs a catalog of independent statistical detectors over
//! a purchase history snapshot and combines their output into one ranked,
//! explainable feed.
//!
//! ## Pipeline
//!
//! 1. One [`HistorySnapshot`](crate::history::HistorySnapshot) is loaded per call
//! 2. Every registered [`Detector`] analyses it concurrently on the blocking pool
//! 3. Drafts are normalised (confidence 0-100, non-negative impact, non-empty reasoning)
//! 4. The feed is ranked: urgency, confidence, then registration and emission order
//! 5. Views filter the ranked feed (now-relevant, week-planning)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockwise_core::insights::InsightEngine;
//!
//! let engine = InsightEngine::new(Arc::new(db), EngineConfig::load(None)?)?;
//! let feed = engine.generate_insights("bistro", None).await;
//! ```

pub mod builders;
pub mod catalog;
pub mod engine;
pub mod normalize;
pub mod rank;
pub mod types;
pub mod views;

pub use engine::{AnalysisContext, Detector, InsightEngine};
pub use types::{
    DetectorCategory, Insight, InsightDraft, InsightScope, InsightType, Reasoning, Urgency,
    DAYS_UNTIL_EVENT,
};
