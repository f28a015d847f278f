//! Historical purchase data, as the insight engine sees it
//!
//! Two layers:
//! - [`HistoryRepository`] is the storage contract: completed, exclusion-filtered
//!   line items for one account over one date window. [`crate::db::Database`]
//!   and [`InMemoryHistory`] implement it.
//! - [`HistorySnapshot`] is loaded once per engine run and answers the windowed
//!   aggregate queries detectors need (per-SKU daily orders, price series,
//!   vendor/category totals, order summaries).

mod memory;
mod snapshot;

use chrono::{Duration, NaiveDate};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::PurchaseLine;

pub use memory::InMemoryHistory;
pub use snapshot::{
    DailyOrder, GroupBy, HistorySnapshot, OrderSummary, PeriodTotal, PricePoint, GLOBAL_KEY,
};

/// Storage contract consumed by the insight engine
pub trait HistoryRepository: Send + Sync {
    /// Line items of `completed` purchases owned by `user_id`, ordered within
    /// `window` (inclusive), whose vendor matches no exclusion pattern.
    fn completed_lines(
        &self,
        user_id: &str,
        window: DateWindow,
        exclusions: &VendorExclusionPolicy,
    ) -> Result<Vec<PurchaseLine>>;
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending on (and including) `end`
    pub fn ending(end: NaiveDate, days: i64) -> Self {
        let days = days.max(1);
        Self {
            start: end - Duration::days(days - 1),
            end,
        }
    }

    /// The `days` days immediately before this window starts
    pub fn preceding(&self, days: i64) -> Self {
        Self::ending(self.start - Duration::days(1), days)
    }

    /// The same-length window `days` earlier
    pub fn shifted_back(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end - Duration::days(days),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Vendors removed from every analysis (e.g. equipment rental services that
/// are not inventory suppliers). Matching is case-insensitive substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorExclusionPolicy {
    patterns: Vec<String>,
}

impl VendorExclusionPolicy {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.excluded_vendors)
    }

    /// Lower-cased patterns, in configured order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, vendor: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let vendor = vendor.to_lowercase();
        self.patterns.iter().any(|p| vendor.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_ending() {
        let w = DateWindow::ending(date(2026, 3, 31), 30);
        assert_eq!(w.start, date(2026, 3, 2));
        assert_eq!(w.days(), 30);
        assert!(w.contains(date(2026, 3, 2)));
        assert!(!w.contains(date(2026, 3, 1)));
    }

    #[test]
    fn test_window_preceding_does_not_overlap() {
        let recent = DateWindow::ending(date(2026, 3, 31), 30);
        let prior = recent.preceding(30);
        assert_eq!(prior.end, date(2026, 3, 1));
        assert_eq!(prior.days(), 30);
        assert!(!prior.contains(recent.start));
    }

    #[test]
    fn test_exclusion_is_case_insensitive_substring() {
        let policy = VendorExclusionPolicy::new(["Rental", " leasing "]);
        assert!(policy.is_excluded("ACME EQUIPMENT RENTALS"));
        assert!(policy.is_excluded("Big Leasing Co"));
        assert!(!policy.is_excluded("Sysco"));
        assert!(!VendorExclusionPolicy::default().is_excluded("Rental"));
    }
}
