//! Subscription storage and reconciliation

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::params;
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Cadence, Subscription, SubscriptionKind};
use crate::reconcile::SyncPlan;

fn map_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let cadence_str: String = row.get(5)?;
    let kind_str: String = row.get(6)?;
    let first_seen_str: Option<String> = row.get(7)?;
    let last_seen_str: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(12)?;

    Ok(Subscription {
        id: row.get(0)?,
        recurring_signature: row.get(1)?,
        merchant: row.get(2)?,
        merchant_normalized: row.get(3)?,
        amount: row.get(4)?,
        cadence: Cadence::from_str(&cadence_str).unwrap_or(Cadence::Monthly),
        kind: SubscriptionKind::from_str(&kind_str).unwrap_or(SubscriptionKind::Subscription),
        first_seen: first_seen_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        last_seen: last_seen_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        transaction_count: row.get(9)?,
        active: row.get(10)?,
        user_confirmed: row.get(11)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const SUBSCRIPTION_COLUMNS: &str = "id, recurring_signature, merchant, merchant_normalized, \
     amount, cadence, kind, first_seen, last_seen, transaction_count, active, user_confirmed, \
     created_at";

impl Database {
    /// List subscriptions, most recently charged first
    pub fn list_subscriptions(&self, active_only: bool) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let query = if active_only {
            format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE active \
                 ORDER BY last_seen DESC NULLS LAST, id"
            )
        } else {
            format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
                 ORDER BY last_seen DESC NULLS LAST, id"
            )
        };

        let mut stmt = conn.prepare(&query)?;
        let subscriptions = stmt
            .query_map([], map_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subscriptions)
    }

    /// Mark a subscription as user-confirmed
    ///
    /// Confirmed rows survive reconciliation even when detection no longer
    /// sees them. Confirming also reactivates the row.
    pub fn confirm_subscription(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE subscriptions SET user_confirmed = TRUE, active = TRUE WHERE id = ?",
            params![id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("subscription {id}")));
        }
        Ok(())
    }

    /// Apply a reconciliation plan atomically. Returns the number of newly
    /// inserted subscriptions.
    pub fn sync_subscriptions(&self, plan: &SyncPlan) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for id in &plan.deactivate_ids {
            tx.execute(
                "UPDATE subscriptions SET active = FALSE WHERE id = ?",
                params![id],
            )?;
        }

        for upd in &plan.updates {
            tx.execute(
                r#"
                UPDATE subscriptions
                SET last_seen = ?,
                    amount = ?,
                    cadence = ?,
                    transaction_count = COALESCE(?, transaction_count),
                    active = TRUE
                WHERE id = ?
                "#,
                params![
                    upd.last_seen.map(|d| d.to_string()),
                    upd.amount,
                    upd.cadence.as_str(),
                    upd.transaction_count,
                    upd.id,
                ],
            )?;
        }

        for ins in &plan.inserts {
            tx.execute(
                r#"
                INSERT INTO subscriptions
                    (recurring_signature, merchant, merchant_normalized, amount, cadence,
                     kind, first_seen, last_seen, transaction_count, active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE)
                "#,
                params![
                    ins.recurring_signature,
                    ins.merchant,
                    ins.merchant_normalized,
                    ins.amount,
                    ins.cadence.as_str(),
                    ins.kind.as_str(),
                    ins.first_seen.map(|d| d.to_string()),
                    ins.last_seen.map(|d| d.to_string()),
                    ins.transaction_count,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            new = plan.inserts.len(),
            updated = plan.updates.len(),
            deactivated = plan.deactivate_ids.len(),
            "subscription sync complete"
        );
        Ok(plan.inserts.len())
    }
}
