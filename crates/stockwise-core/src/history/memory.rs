//! In-memory history store

use std::sync::RwLock;

use chrono::Utc;

use super::{DateWindow, HistoryRepository, VendorExclusionPolicy};
use crate::error::{Error, Result};
use crate::models::{LineItem, NewPurchase, PurchaseLine, PurchaseRecord, PurchaseStatus};

/// Purchase history held in memory.
///
/// Useful for embedding the engine without SQLite and for tests; it applies
/// the same completed-only and vendor-exclusion rules as the database.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    purchases: RwLock<Vec<StoredPurchase>>,
}

#[derive(Debug)]
struct StoredPurchase {
    record: PurchaseRecord,
    lines: Vec<LineItem>,
    import_hash: String,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a purchase and its lines, returning the new purchase id.
    /// Purchases whose `import_hash` was already stored are skipped (`None`).
    pub fn insert(&self, purchase: &NewPurchase) -> Result<Option<i64>> {
        let mut purchases = self
            .purchases
            .write()
            .map_err(|_| Error::InvalidData("history lock poisoned".to_string()))?;

        if purchases
            .iter()
            .any(|p| p.import_hash == purchase.import_hash)
        {
            return Ok(None);
        }

        let id = purchases.len() as i64 + 1;
        let line_base = purchases.iter().map(|p| p.lines.len()).sum::<usize>() as i64;
        let record = PurchaseRecord {
            id,
            vendor: purchase.vendor.clone(),
            account: purchase.account.clone(),
            ordered_at: purchase.ordered_at,
            total_amount: purchase.total_amount(),
            status: purchase.status,
            created_at: Utc::now(),
        };
        let lines = purchase
            .lines
            .iter()
            .enumerate()
            .map(|(i, l)| LineItem {
                id: line_base + i as i64 + 1,
                purchase_id: id,
                sku: l.sku.clone(),
                description: l.description.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                line_total: l.line_total,
                category: l.category.clone(),
            })
            .collect();
        purchases.push(StoredPurchase {
            record,
            lines,
            import_hash: purchase.import_hash.clone(),
        });
        Ok(Some(id))
    }

    /// Number of stored purchases (any status)
    pub fn len(&self) -> usize {
        self.purchases.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryRepository for InMemoryHistory {
    fn completed_lines(
        &self,
        user_id: &str,
        window: DateWindow,
        exclusions: &VendorExclusionPolicy,
    ) -> Result<Vec<PurchaseLine>> {
        let purchases = self
            .purchases
            .read()
            .map_err(|_| Error::InvalidData("history lock poisoned".to_string()))?;

        let mut rows = Vec::new();
        for StoredPurchase { record, lines, .. } in purchases.iter() {
            if record.account != user_id
                || record.status != PurchaseStatus::Completed
                || !window.contains(record.order_date())
                || exclusions.is_excluded(&record.vendor)
            {
                continue;
            }
            rows.extend(lines.iter().map(|line| PurchaseLine {
                purchase_id: record.id,
                line_id: line.id,
                vendor: record.vendor.clone(),
                order_date: record.order_date(),
                purchase_total: record.total_amount,
                sku: line.sku.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
                category: line.category.clone(),
            }));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{date, item, HistoryBuilder, TEST_ACCOUNT};

    #[test]
    fn test_insert_dedupes_on_hash() {
        let builder = HistoryBuilder::new(date(2026, 6, 30)).order(3, "Sysco", "EGG", 1.0, 300);
        let memory = InMemoryHistory::new();
        let purchase = &builder.new_purchases(TEST_ACCOUNT)[0];
        assert_eq!(memory.insert(purchase).unwrap(), Some(1));
        assert_eq!(memory.insert(purchase).unwrap(), None);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_completed_lines_filters() {
        let as_of = date(2026, 6, 30);
        let memory = HistoryBuilder::new(as_of)
            .order(3, "Sysco", "EGG", 1.0, 300)
            .order(200, "Sysco", "EGG", 1.0, 300)
            .order(4, "Party Rental", "CHAIRS", 10.0, 1_000)
            .purchase_with_status(5, "Sysco", PurchaseStatus::Failed, vec![item("EGG", 1.0, 300)])
            .into_memory(TEST_ACCOUNT);

        let window = DateWindow::ending(as_of, 90);
        let exclusions = VendorExclusionPolicy::new(["rental"]);
        let lines = memory
            .completed_lines(TEST_ACCOUNT, window, &exclusions)
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].vendor, "Sysco");
        assert_eq!(lines[0].purchase_total, 300);

        assert!(memory
            .completed_lines("other", window, &exclusions)
            .unwrap()
            .is_empty());
    }
}
