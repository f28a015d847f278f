//! Windowed history reads for the insight engine

use rusqlite::params_from_iter;

use super::Database;
use crate::error::{Error, Result};
use crate::history::{DateWindow, HistoryRepository, VendorExclusionPolicy};
use crate::models::PurchaseLine;

/// Escape `%`, `_` and `\` so a pattern matches literally inside `LIKE ... ESCAPE '\'`
fn like_contains(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Build the completed-lines query with one `NOT LIKE` clause per exclusion pattern
fn completed_lines_sql(exclusions: &VendorExclusionPolicy) -> String {
    let mut sql = String::from(
        r#"
        SELECT p.id, li.id, p.vendor, DATE(p.ordered_at), p.total_amount,
               li.sku, li.description, li.quantity, li.unit_price, li.line_total, li.category
        FROM line_items li
        JOIN purchases p ON p.id = li.purchase_id
        WHERE p.account = ?
          AND p.status = 'completed'
          AND DATE(p.ordered_at) >= ?
          AND DATE(p.ordered_at) <= ?
        "#,
    );
    for _ in exclusions.patterns() {
        sql.push_str(" AND LOWER(p.vendor) NOT LIKE ? ESCAPE '\\'");
    }
    sql.push_str(" ORDER BY DATE(p.ordered_at), p.id, li.id");
    sql
}

impl HistoryRepository for Database {
    fn completed_lines(
        &self,
        user_id: &str,
        window: DateWindow,
        exclusions: &VendorExclusionPolicy,
    ) -> Result<Vec<PurchaseLine>> {
        let conn = self.conn()?;
        let sql = completed_lines_sql(exclusions);

        let mut values = vec![
            user_id.to_string(),
            window.start.to_string(),
            window.end.to_string(),
        ];
        values.extend(exclusions.patterns().iter().map(|p| like_contains(p)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let date: String = row.get(3)?;
                Ok((
                    date,
                    PurchaseLine {
                        purchase_id: row.get(0)?,
                        line_id: row.get(1)?,
                        vendor: row.get(2)?,
                        order_date: chrono::NaiveDate::MIN,
                        purchase_total: row.get(4)?,
                        sku: row.get(5)?,
                        description: row.get(6)?,
                        quantity: row.get(7)?,
                        unit_price: row.get(8)?,
                        line_total: row.get(9)?,
                        category: row.get(10)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let lines = rows
            .into_iter()
            .map(|(date, mut line)| {
                line.order_date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| Error::InvalidData(format!("Bad order date '{}': {}", date, e)))?;
                Ok(line)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_contains_escapes_wildcards() {
        assert_eq!(like_contains("rental"), "%rental%");
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_contains("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_sql_has_one_clause_per_pattern() {
        let sql = completed_lines_sql(&VendorExclusionPolicy::new(["rental", "leasing"]));
        assert_eq!(sql.matches("NOT LIKE").count(), 2);
        let sql = completed_lines_sql(&VendorExclusionPolicy::default());
        assert!(!sql.contains("NOT LIKE"));
    }
}
