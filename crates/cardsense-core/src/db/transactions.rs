//! Transaction import and category operations

use chrono::NaiveDate;
use rusqlite::params;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, Transaction};

/// Outcome of a batch import
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportResult {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Content hash used to skip re-imported statement lines. Date, description,
/// and amount together identify a charge across overlapping statement files.
fn dedup_hash(posted_date: NaiveDate, description: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(posted_date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(description.as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{amount:.2}").as_bytes());
    hex::encode(hasher.finalize())
}

fn map_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let posted_date_str: String = row.get(1)?;
    let created_at_str: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        posted_date: NaiveDate::parse_from_str(&posted_date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        description: row.get(2)?,
        amount: row.get(3)?,
        merchant_raw: row.get(4)?,
        merchant_normalized: row.get(5)?,
        category_id: row.get(6)?,
        excluded: row.get(7)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const TRANSACTION_COLUMNS: &str = "id, posted_date, description, amount, merchant_raw, \
     merchant_normalized, category_id, excluded, dedup_hash, created_at";

impl Database {
    /// Insert a batch of transactions, skipping lines already present.
    ///
    /// Duplicate detection is by content hash, so re-importing an
    /// overlapping statement file is safe.
    pub fn insert_transactions(&self, batch: &[NewTransaction]) -> Result<ImportResult> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut result = ImportResult::default();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO transactions
                    (posted_date, description, amount, merchant_raw, merchant_normalized,
                     category_id, dedup_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for txn in batch {
                let hash = dedup_hash(txn.posted_date, &txn.description, txn.amount);
                let changed = stmt.execute(params![
                    txn.posted_date.to_string(),
                    txn.description,
                    txn.amount,
                    txn.merchant_raw,
                    txn.merchant_normalized,
                    txn.category_id,
                    hash,
                ])?;
                if changed > 0 {
                    result.inserted += 1;
                } else {
                    result.duplicates += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            inserted = result.inserted,
            duplicates = result.duplicates,
            "transaction import complete"
        );
        Ok(result)
    }

    /// List all transactions, oldest first
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY posted_date, id"
        ))?;

        let transactions = stmt
            .query_map([], map_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Assign (or clear) a transaction's category
    pub fn set_transaction_category(&self, id: i64, category_id: Option<i64>) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE transactions SET category_id = ? WHERE id = ?",
            params![category_id, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    /// Exclude or re-include a transaction from all analysis
    pub fn set_transaction_excluded(&self, id: i64, excluded: bool) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE transactions SET excluded = ? WHERE id = ?",
            params![excluded, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    /// Create a category if missing and return its id
    pub fn upsert_category(&self, name: &str, color: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, color) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET color = COALESCE(excluded.color, categories.color)",
            params![name, color],
        )?;
        let id = conn.query_row(
            "SELECT id FROM categories WHERE name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// List all categories, alphabetical
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, color FROM categories ORDER BY name")?;

        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}
