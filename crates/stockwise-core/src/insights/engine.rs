//! Insight Engine - orchestrates detectors over one history snapshot

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::{DateWindow, HistoryRepository, HistorySnapshot, VendorExclusionPolicy};

use super::catalog;
use super::normalize::normalize_all;
use super::rank::rank;
use super::types::{Insight, InsightDraft, InsightType};
use super::views;

/// Context provided to detectors. Shared read-only by every detector of one run.
pub struct AnalysisContext {
    /// Account the history belongs to
    pub user_id: String,
    /// Reference date all windows are relative to
    pub as_of: NaiveDate,
    pub config: Arc<EngineConfig>,
    /// Completed, exclusion-filtered history
    pub history: HistorySnapshot,
}

impl AnalysisContext {
    pub fn new(
        user_id: impl Into<String>,
        as_of: NaiveDate,
        config: Arc<EngineConfig>,
        history: HistorySnapshot,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            as_of,
            config,
            history,
        }
    }

    /// The `days` days ending on `as_of`
    pub fn window(&self, days: i64) -> DateWindow {
        DateWindow::ending(self.as_of, days)
    }
}

/// A single statistical detector.
///
/// Detectors are pure functions of the context: they read no clock, write
/// nothing and return an empty list when there is too little data.
pub trait Detector: Send + Sync {
    /// Type of insight this detector emits
    fn insight_type(&self) -> InsightType;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Days of history (ending at `as_of`) the detector reads
    fn lookback_days(&self) -> i64;

    /// Minimum snapshot lines before analysis is attempted
    fn min_data_points(&self) -> usize {
        1
    }

    /// Analyze the snapshot and produce drafts
    fn analyze(&self, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>>;
}

/// The main insight engine
pub struct InsightEngine {
    repository: Arc<dyn HistoryRepository>,
    config: Arc<EngineConfig>,
    exclusions: VendorExclusionPolicy,
    detectors: Vec<Arc<dyn Detector>>,
}

impl InsightEngine {
    /// Create an engine with the standard detector catalog.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(repository: Arc<dyn HistoryRepository>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let detectors = catalog::standard(&config);
        Ok(Self::build(repository, config, detectors))
    }

    /// Create an engine with an explicit detector list (registration order is kept)
    pub fn with_detectors(
        repository: Arc<dyn HistoryRepository>,
        config: EngineConfig,
        detectors: Vec<Arc<dyn Detector>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(repository, config, detectors))
    }

    fn build(
        repository: Arc<dyn HistoryRepository>,
        config: EngineConfig,
        detectors: Vec<Arc<dyn Detector>>,
    ) -> Self {
        let exclusions = VendorExclusionPolicy::from_config(&config);
        Self {
            repository,
            config: Arc::new(config),
            exclusions,
            detectors,
        }
    }

    /// Register a detector after the existing ones
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// Get list of registered insight types, in registration order
    pub fn detector_types(&self) -> Vec<InsightType> {
        self.detectors.iter().map(|d| d.insight_type()).collect()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Largest lookback any registered detector needs
    pub fn max_lookback_days(&self) -> i64 {
        self.detectors
            .iter()
            .map(|d| d.lookback_days())
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// Run every detector and return the ranked feed.
    ///
    /// `as_of` defaults to today. Never fails: a repository error yields an
    /// empty snapshot and a failing or panicking detector contributes nothing.
    pub async fn generate_insights(&self, user_id: &str, as_of: Option<NaiveDate>) -> Vec<Insight> {
        let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
        let snapshot = self.load_snapshot(user_id, as_of).await;
        let ctx = Arc::new(AnalysisContext::new(
            user_id,
            as_of,
            Arc::clone(&self.config),
            snapshot,
        ));

        let handles: Vec<_> = self
            .detectors
            .iter()
            .map(|detector| {
                let detector = Arc::clone(detector);
                let ctx = Arc::clone(&ctx);
                tokio::task::spawn_blocking(move || run_detector(detector.as_ref(), &ctx))
            })
            .collect();

        let mut insights = Vec::new();
        for (index, (detector, handle)) in self.detectors.iter().zip(handles).enumerate() {
            match handle.await {
                Ok(Ok(drafts)) => {
                    debug!(
                        insight = detector.insight_type().as_str(),
                        count = drafts.len(),
                        "Detector complete"
                    );
                    insights.extend(normalize_all(drafts, index));
                }
                Ok(Err(e)) => {
                    warn!(
                        insight = detector.insight_type().as_str(),
                        user = user_id,
                        error = %e,
                        "Detector failed"
                    );
                }
                Err(e) => {
                    warn!(
                        insight = detector.insight_type().as_str(),
                        user = user_id,
                        panicked = e.is_panic(),
                        "Detector aborted"
                    );
                }
            }
        }

        rank(&mut insights);
        info!(
            user = user_id,
            as_of = %as_of,
            lines = ctx.history.len(),
            insights = insights.len(),
            "Insight generation complete"
        );
        insights
    }

    /// Ranked feed filtered to what matters today
    pub async fn now_relevant_insights(
        &self,
        user_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Vec<Insight> {
        let ranked = self.generate_insights(user_id, as_of).await;
        views::now_relevant(&ranked)
    }

    /// Ranked feed filtered to what matters for planning the week
    pub async fn week_planning_insights(
        &self,
        user_id: &str,
        as_of: Option<NaiveDate>,
    ) -> Vec<Insight> {
        let ranked = self.generate_insights(user_id, as_of).await;
        views::week_planning(&ranked, self.config.materiality_threshold)
    }

    async fn load_snapshot(&self, user_id: &str, as_of: NaiveDate) -> HistorySnapshot {
        let repository = Arc::clone(&self.repository);
        let exclusions = self.exclusions.clone();
        let user = user_id.to_string();
        let lookback = self.max_lookback_days();

        let loaded = tokio::task::spawn_blocking(move || {
            HistorySnapshot::load(repository.as_ref(), &user, as_of, lookback, &exclusions)
        })
        .await;

        match loaded {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(user = user_id, error = %e, "History load aborted");
                HistorySnapshot::empty(as_of)
            }
        }
    }
}

fn run_detector(detector: &dyn Detector, ctx: &AnalysisContext) -> Result<Vec<InsightDraft>> {
    if ctx.history.len() < detector.min_data_points() {
        debug!(
            insight = detector.insight_type().as_str(),
            lines = ctx.history.len(),
            "Not enough history"
        );
        return Ok(Vec::new());
    }
    detector.analyze(ctx)
}
