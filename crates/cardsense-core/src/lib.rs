//! Cardsense Core Library
//!
//! Shared functionality for the cardsense credit-card insight tool:
//! - Database access and migrations
//! - Merchant canonicalization and grouping
//! - Recurring-charge and EMI detection
//! - Reconciliation of detected charges against stored subscriptions
//! - Statistical anomaly detection
//! - Behavioral trigger engine
//! - Debt payoff planning and upcoming-bill projection
//! - Fee and tax analysis

pub mod anomalies;
pub mod db;
pub mod error;
pub mod fees;
pub mod merchants;
pub mod models;
pub mod planner;
pub mod reconcile;
pub mod recurring;
pub mod services;
pub mod triggers;

pub use anomalies::detect_anomalies;
pub use db::{Database, ImportResult};
pub use error::{Error, Result};
pub use fees::{analyze_fees, FeeBreakdown, FeeCatalog, FeeReport, FeeTransaction};
pub use merchants::canonical_key;
pub use models::{
    AnomalyResult, Cadence, Category, Confidence, NewTransaction, Severity, Subscription,
    SubscriptionCandidate, SubscriptionKind, Transaction, Trigger, TriggerType,
};
pub use planner::{
    add_months, build_payoff_plan, next_due_date, upcoming_bills, PayoffPlan, PayoffStatus,
    ReminderLevel, ScheduleRow, UpcomingBill,
};
pub use reconcile::{plan_sync, SubscriptionInsert, SubscriptionUpdate, SyncPlan};
pub use recurring::detect_subscriptions;
pub use services::{ServiceCatalog, ServiceEntry};
pub use triggers::detect_triggers;
