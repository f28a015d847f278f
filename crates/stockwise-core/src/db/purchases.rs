//! Purchase and line-item operations

use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{LineItem, NewPurchase, PurchaseRecord, PurchaseStatus};

const PURCHASE_COLUMNS: &str =
    "id, vendor, account, ordered_at, total_amount, status, created_at";

impl Database {
    /// Insert a purchase with its lines (skips duplicates based on import_hash)
    ///
    /// Returns the new purchase id, or `None` if the purchase was already imported.
    pub fn insert_purchase(&self, purchase: &NewPurchase) -> Result<Option<i64>> {
        if purchase.vendor.trim().is_empty() {
            return Err(Error::InvalidData("purchase vendor is empty".to_string()));
        }
        if purchase.account.trim().is_empty() {
            return Err(Error::InvalidData("purchase account is empty".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM purchases WHERE import_hash = ?",
                params![purchase.import_hash],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(None);
        }

        tx.execute(
            r#"
            INSERT INTO purchases (account, vendor, ordered_at, total_amount, status, import_hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                purchase.account,
                purchase.vendor,
                format_datetime(&purchase.ordered_at),
                purchase.total_amount(),
                purchase.status.as_str(),
                purchase.import_hash,
            ],
        )?;
        let purchase_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO line_items (purchase_id, sku, description, quantity, unit_price, line_total, category)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for line in &purchase.lines {
                stmt.execute(params![
                    purchase_id,
                    line.sku,
                    line.description,
                    line.quantity,
                    line.unit_price,
                    line.line_total,
                    line.category,
                ])?;
            }
        }

        tx.commit()?;
        Ok(Some(purchase_id))
    }

    /// Most recent purchases for an account, newest first
    pub fn list_purchases(&self, account: &str, limit: i64) -> Result<Vec<PurchaseRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM purchases WHERE account = ? ORDER BY ordered_at DESC, id DESC LIMIT ?",
            PURCHASE_COLUMNS
        ))?;

        let purchases = stmt
            .query_map(params![account, limit], Self::row_to_purchase_parts)?
            .map(|r| r.map_err(Error::from).and_then(Self::purchase_from_parts))
            .collect::<Result<Vec<_>>>()?;
        Ok(purchases)
    }

    /// Get a single purchase by ID
    pub fn get_purchase(&self, id: i64) -> Result<Option<PurchaseRecord>> {
        let conn = self.conn()?;
        let parts = conn
            .query_row(
                &format!("SELECT {} FROM purchases WHERE id = ?", PURCHASE_COLUMNS),
                params![id],
                Self::row_to_purchase_parts,
            )
            .optional()?;
        parts.map(Self::purchase_from_parts).transpose()
    }

    /// Lines of one purchase, in insertion order
    pub fn get_line_items(&self, purchase_id: i64) -> Result<Vec<LineItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, purchase_id, sku, description, quantity, unit_price, line_total, category
             FROM line_items WHERE purchase_id = ? ORDER BY id",
        )?;

        let lines = stmt
            .query_map(params![purchase_id], |row| {
                Ok(LineItem {
                    id: row.get(0)?,
                    purchase_id: row.get(1)?,
                    sku: row.get(2)?,
                    description: row.get(3)?,
                    quantity: row.get(4)?,
                    unit_price: row.get(5)?,
                    line_total: row.get(6)?,
                    category: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    /// Change the lifecycle status of a purchase
    pub fn update_purchase_status(&self, id: i64, status: PurchaseStatus) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE purchases SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("purchase {}", id)));
        }
        Ok(())
    }

    /// Count purchases, optionally for one account
    pub fn count_purchases(&self, account: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = match account {
            Some(account) => conn.query_row(
                "SELECT COUNT(*) FROM purchases WHERE account = ?",
                params![account],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM purchases", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Raw row read; timestamps and status are validated afterwards so a bad
    /// value surfaces as `InvalidData` instead of a silent default.
    fn row_to_purchase_parts(row: &rusqlite::Row) -> rusqlite::Result<PurchaseParts> {
        Ok(PurchaseParts {
            id: row.get(0)?,
            vendor: row.get(1)?,
            account: row.get(2)?,
            ordered_at: row.get(3)?,
            total_amount: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn purchase_from_parts(parts: PurchaseParts) -> Result<PurchaseRecord> {
        let status = parts
            .status
            .parse::<PurchaseStatus>()
            .map_err(Error::InvalidData)?;
        Ok(PurchaseRecord {
            id: parts.id,
            vendor: parts.vendor,
            account: parts.account,
            ordered_at: parse_datetime(&parts.ordered_at)?,
            total_amount: parts.total_amount,
            status,
            created_at: parse_datetime(&parts.created_at)?,
        })
    }
}

struct PurchaseParts {
    id: i64,
    vendor: String,
    account: String,
    ordered_at: String,
    total_amount: i64,
    status: String,
    created_at: String,
}
