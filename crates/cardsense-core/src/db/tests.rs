//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{plan_sync, SubscriptionInsert, SyncPlan};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_txn(posted: NaiveDate, description: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            posted_date: posted,
            description: description.to_string(),
            amount,
            merchant_raw: Some(description.to_string()),
            merchant_normalized: Some(description.to_lowercase()),
            category_id: None,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_transactions().unwrap().is_empty());
        assert!(db.list_subscriptions(false).unwrap().is_empty());
        assert!(db.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_import_skips_duplicates() {
        let db = Database::in_memory().unwrap();
        let batch = vec![
            new_txn(date(2026, 2, 1), "NETFLIX COM", 649.0),
            new_txn(date(2026, 2, 5), "SWIGGY BANGALORE", 420.0),
        ];

        let first = db.insert_transactions(&batch).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.duplicates, 0);

        // Re-importing the same statement lines is a no-op
        let second = db.insert_transactions(&batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);

        let all = db.list_transactions().unwrap();
        assert_eq!(all.len(), 2);
        // Oldest first
        assert_eq!(all[0].description, "NETFLIX COM");
        assert_eq!(all[0].amount, 649.0);
        assert!(!all[0].excluded);
    }

    #[test]
    fn test_same_line_different_dates_both_kept() {
        let db = Database::in_memory().unwrap();
        let batch = vec![
            new_txn(date(2026, 1, 5), "SPOTIFY", 199.0),
            new_txn(date(2026, 2, 5), "SPOTIFY", 199.0),
        ];
        let result = db.insert_transactions(&batch).unwrap();
        assert_eq!(result.inserted, 2);
    }

    #[test]
    fn test_category_assignment() {
        let db = Database::in_memory().unwrap();
        let id = db.upsert_category("Dining", Some("#e74c3c")).unwrap();
        assert!(id > 0);

        // Same name returns the same row
        let id2 = db.upsert_category("Dining", None).unwrap();
        assert_eq!(id, id2);
        let cats = db.list_categories().unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].color.as_deref(), Some("#e74c3c"));

        db.insert_transactions(&[new_txn(date(2026, 2, 1), "CAFE", 300.0)])
            .unwrap();
        let txn_id = db.list_transactions().unwrap()[0].id;
        db.set_transaction_category(txn_id, Some(id)).unwrap();

        let txn = &db.list_transactions().unwrap()[0];
        assert_eq!(txn.category_id, Some(id));
    }

    #[test]
    fn test_exclude_flag_roundtrip() {
        let db = Database::in_memory().unwrap();
        db.insert_transactions(&[new_txn(date(2026, 2, 1), "CAFE", 300.0)])
            .unwrap();
        let id = db.list_transactions().unwrap()[0].id;

        db.set_transaction_excluded(id, true).unwrap();
        assert!(db.list_transactions().unwrap()[0].excluded);

        db.set_transaction_excluded(id, false).unwrap();
        assert!(!db.list_transactions().unwrap()[0].excluded);
    }

    #[test]
    fn test_missing_transaction_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = db.set_transaction_excluded(999, true).unwrap_err();
        assert!(matches!(err, crate::error::Error::NotFound(_)));
    }

    fn insert_for(merchant: &str) -> SubscriptionInsert {
        SubscriptionInsert {
            recurring_signature: format!("{}:subscription", merchant.to_lowercase()),
            merchant: merchant.to_string(),
            merchant_normalized: merchant.to_lowercase(),
            amount: 199.0,
            cadence: Cadence::Monthly,
            kind: SubscriptionKind::Subscription,
            first_seen: Some(date(2026, 1, 5)),
            last_seen: Some(date(2026, 2, 5)),
            transaction_count: 3,
        }
    }

    #[test]
    fn test_sync_inserts_and_roundtrips() {
        let db = Database::in_memory().unwrap();
        let plan = SyncPlan {
            inserts: vec![insert_for("Spotify")],
            ..Default::default()
        };

        let new_count = db.sync_subscriptions(&plan).unwrap();
        assert_eq!(new_count, 1);

        let subs = db.list_subscriptions(true).unwrap();
        assert_eq!(subs.len(), 1);
        let sub = &subs[0];
        assert_eq!(sub.recurring_signature, "spotify:subscription");
        assert_eq!(sub.cadence, Cadence::Monthly);
        assert_eq!(sub.kind, SubscriptionKind::Subscription);
        assert_eq!(sub.last_seen, Some(date(2026, 2, 5)));
        assert_eq!(sub.transaction_count, 3);
        assert!(sub.active);
        assert!(!sub.user_confirmed);
    }

    #[test]
    fn test_sync_deactivates_and_updates() {
        let db = Database::in_memory().unwrap();
        db.sync_subscriptions(&SyncPlan {
            inserts: vec![insert_for("Spotify"), insert_for("Netflix")],
            ..Default::default()
        })
        .unwrap();

        // Next detection run only sees Spotify, at a new price
        let stored = db.list_subscriptions(false).unwrap();
        let mut candidate = crate::models::SubscriptionCandidate {
            merchant: "Spotify".to_string(),
            amount: 249.0,
            cadence: Cadence::Monthly,
            kind: SubscriptionKind::Subscription,
            confidence: Confidence::High,
            first_seen: date(2026, 1, 5),
            last_seen: date(2026, 3, 5),
            transaction_count: 4,
        };
        let plan = plan_sync(std::slice::from_ref(&candidate), &stored);
        let new_count = db.sync_subscriptions(&plan).unwrap();
        assert_eq!(new_count, 0);

        let all = db.list_subscriptions(false).unwrap();
        let spotify = all.iter().find(|s| s.merchant == "Spotify").unwrap();
        let netflix = all.iter().find(|s| s.merchant == "Netflix").unwrap();
        assert!(spotify.active);
        assert_eq!(spotify.amount, 249.0);
        assert_eq!(spotify.last_seen, Some(date(2026, 3, 5)));
        assert_eq!(spotify.transaction_count, 4);
        assert!(!netflix.active);

        // A later run that sees Spotify again leaves everything stable
        candidate.last_seen = date(2026, 4, 5);
        let stored = db.list_subscriptions(false).unwrap();
        let plan = plan_sync(std::slice::from_ref(&candidate), &stored);
        assert_eq!(db.sync_subscriptions(&plan).unwrap(), 0);
    }

    #[test]
    fn test_sync_survives_duplicate_key_candidates() {
        let db = Database::in_memory().unwrap();

        // Two candidates for the same merchant and kind collapse to one
        // row instead of colliding on the signature's unique index
        let make = |last_seen: NaiveDate, amount: f64| crate::models::SubscriptionCandidate {
            merchant: "Spotify".to_string(),
            amount,
            cadence: Cadence::Monthly,
            kind: SubscriptionKind::Subscription,
            confidence: Confidence::High,
            first_seen: date(2026, 1, 5),
            last_seen,
            transaction_count: 3,
        };
        let candidates = vec![make(date(2026, 2, 5), 199.0), make(date(2026, 3, 5), 229.0)];

        let plan = plan_sync(&candidates, &[]);
        let new_count = db.sync_subscriptions(&plan).unwrap();
        assert_eq!(new_count, 1);

        let subs = db.list_subscriptions(true).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].amount, 229.0);
        assert_eq!(subs[0].last_seen, Some(date(2026, 3, 5)));
    }

    #[test]
    fn test_confirmed_subscription_survives_sync() {
        let db = Database::in_memory().unwrap();
        db.sync_subscriptions(&SyncPlan {
            inserts: vec![insert_for("Netflix")],
            ..Default::default()
        })
        .unwrap();
        let id = db.list_subscriptions(true).unwrap()[0].id;
        db.confirm_subscription(id).unwrap();

        // Detection no longer sees it
        let stored = db.list_subscriptions(false).unwrap();
        let plan = plan_sync(&[], &stored);
        db.sync_subscriptions(&plan).unwrap();

        let sub = &db.list_subscriptions(false).unwrap()[0];
        assert!(sub.active);
        assert!(sub.user_confirmed);
    }

    #[test]
    fn test_confirm_missing_subscription_fails() {
        let db = Database::in_memory().unwrap();
        let err = db.confirm_subscription(42).unwrap_err();
        assert!(matches!(err, crate::error::Error::NotFound(_)));
    }
}
