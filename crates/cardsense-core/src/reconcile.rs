//! Reconciliation of detected candidates against stored subscriptions.
//!
//! [`plan_sync`] is a pure diff: it compares a detection run against the
//! current table and emits inserts, field updates, and deactivations. The
//! database layer applies the whole plan in one transaction.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::merchants::canonical_key;
use crate::models::{Cadence, Subscription, SubscriptionCandidate, SubscriptionKind};

/// A brand-new subscription row derived from a candidate
#[derive(Debug, Clone)]
pub struct SubscriptionInsert {
    pub recurring_signature: String,
    pub merchant: String,
    pub merchant_normalized: String,
    pub amount: f64,
    pub cadence: Cadence,
    pub kind: SubscriptionKind,
    pub first_seen: Option<NaiveDate>,
    pub last_seen: Option<NaiveDate>,
    pub transaction_count: i64,
}

/// Field refresh for an existing row; reactivates it as a side effect
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    pub id: i64,
    pub last_seen: Option<NaiveDate>,
    pub amount: f64,
    pub cadence: Cadence,
    /// None leaves the stored count untouched
    pub transaction_count: Option<i64>,
}

/// The full outcome of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub inserts: Vec<SubscriptionInsert>,
    pub updates: Vec<SubscriptionUpdate>,
    pub deactivate_ids: Vec<i64>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deactivate_ids.is_empty()
    }
}

fn sync_key(merchant: &str, kind: SubscriptionKind) -> String {
    format!("{}|{}", canonical_key(merchant), kind.as_str())
}

/// Diff candidates against existing rows.
///
/// Identity is the canonical merchant key plus kind on both sides, so a
/// relabeled merchant still matches its stored row. Candidates sharing a
/// key collapse to the one with the latest last payment before the diff,
/// keeping the plan's inserts unique per key. Stored rows absent from
/// this run are deactivated unless the user confirmed them; matched rows
/// get their amount, cadence, and last seen date refreshed and are
/// reactivated.
pub fn plan_sync(candidates: &[SubscriptionCandidate], existing: &[Subscription]) -> SyncPlan {
    let mut candidate_index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<&SubscriptionCandidate> = Vec::new();
    for cand in candidates {
        let key = sync_key(&cand.merchant, cand.kind);
        match candidate_index.get(&key) {
            Some(&pos) => {
                if cand.last_seen > unique[pos].last_seen {
                    unique[pos] = cand;
                }
            }
            None => {
                candidate_index.insert(key, unique.len());
                unique.push(cand);
            }
        }
    }

    // First matching row wins when duplicates share a key
    let mut existing_by_key: HashMap<String, &Subscription> = HashMap::new();
    for sub in existing {
        let label = if sub.merchant.is_empty() {
            &sub.merchant_normalized
        } else {
            &sub.merchant
        };
        existing_by_key
            .entry(sync_key(label, sub.kind))
            .or_insert(sub);
    }

    let mut plan = SyncPlan::default();

    for sub in existing {
        let label = if sub.merchant.is_empty() {
            &sub.merchant_normalized
        } else {
            &sub.merchant
        };
        let key = sync_key(label, sub.kind);
        if !candidate_index.contains_key(&key) && !sub.user_confirmed && sub.active {
            plan.deactivate_ids.push(sub.id);
        }
    }

    for &cand in &unique {
        let key = sync_key(&cand.merchant, cand.kind);
        match existing_by_key.get(&key) {
            Some(sub) => {
                plan.updates.push(SubscriptionUpdate {
                    id: sub.id,
                    last_seen: Some(cand.last_seen),
                    amount: cand.amount,
                    cadence: cand.cadence,
                    transaction_count: if cand.transaction_count > 0 {
                        Some(cand.transaction_count as i64)
                    } else {
                        None
                    },
                });
            }
            None => {
                let canon = canonical_key(&cand.merchant);
                plan.inserts.push(SubscriptionInsert {
                    recurring_signature: format!("{}:{}", canon, cand.kind.as_str()),
                    merchant: cand.merchant.clone(),
                    merchant_normalized: canon,
                    amount: cand.amount,
                    cadence: cand.cadence,
                    kind: cand.kind,
                    first_seen: Some(cand.first_seen),
                    last_seen: Some(cand.last_seen),
                    transaction_count: cand.transaction_count.max(1) as i64,
                });
            }
        }
    }

    debug!(
        inserts = plan.inserts.len(),
        updates = plan.updates.len(),
        deactivations = plan.deactivate_ids.len(),
        "reconciliation plan"
    );
    plan
}
