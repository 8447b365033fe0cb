//! Domain models for cardsense

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A parsed credit-card transaction (consumed read-only by the detectors)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub posted_date: NaiveDate,
    pub description: String,
    /// Positive = spend (debit), negative = credit/refund
    pub amount: f64,
    /// Original merchant string from the statement
    pub merchant_raw: Option<String>,
    /// Cleaned-up merchant name
    pub merchant_normalized: Option<String>,
    pub category_id: Option<i64>,
    /// User excluded this transaction from all analysis
    pub excluded: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// True for records that participate in detection: spend, not excluded
    pub fn is_spend(&self) -> bool {
        self.amount > 0.0 && !self.excluded
    }
}

/// A transaction to be inserted (id and timestamps assigned by the store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub posted_date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub merchant_raw: Option<String>,
    pub merchant_normalized: Option<String>,
    pub category_id: Option<i64>,
}

/// A spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Hex color used by trigger/anomaly labeling
    pub color: Option<String>,
}

/// Recurrence period of a charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Monthly,
    Bimonthly,
    Quarterly,
    #[serde(rename = "Half-yearly")]
    HalfYearly,
    Yearly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "Monthly",
            Self::Bimonthly => "Bimonthly",
            Self::Quarterly => "Quarterly",
            Self::HalfYearly => "Half-yearly",
            Self::Yearly => "Yearly",
        }
    }

    /// Number of months between charges
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Bimonthly => 2,
            Self::Quarterly => 3,
            Self::HalfYearly => 6,
            Self::Yearly => 12,
        }
    }
}

impl std::str::FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "bimonthly" => Ok(Self::Bimonthly),
            "quarterly" => Ok(Self::Quarterly),
            "half-yearly" | "halfyearly" => Ok(Self::HalfYearly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown cadence: {}", s)),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of recurring charge a candidate or subscription represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Periodic service charge (Netflix, Spotify, ...)
    Subscription,
    /// Confirmed EMI / loan installment
    Installment,
    /// Ambiguous EMI-looking charge, flagged rather than dropped
    PossibleInstallment,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Installment => "installment",
            Self::PossibleInstallment => "possible_installment",
        }
    }
}

impl std::str::FromStr for SubscriptionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "installment" => Ok(Self::Installment),
            "possible_installment" => Ok(Self::PossibleInstallment),
            _ => Err(format!("Unknown subscription kind: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detection confidence for a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transient detection output, not yet reconciled into persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCandidate {
    /// Display label for the merged merchant group
    pub merchant: String,
    /// Approximate per-charge amount (average over the evidence)
    pub amount: f64,
    pub cadence: Cadence,
    pub kind: SubscriptionKind,
    pub confidence: Confidence,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    /// Matched transaction count backing this candidate
    pub transaction_count: usize,
}

/// A persisted recurring charge, owned by the reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    /// Stable identifier: canonical merchant + kind
    pub recurring_signature: String,
    /// Display name
    pub merchant: String,
    /// Canonical merchant key
    pub merchant_normalized: String,
    pub amount: f64,
    pub cadence: Cadence,
    pub kind: SubscriptionKind,
    pub first_seen: Option<NaiveDate>,
    pub last_seen: Option<NaiveDate>,
    pub transaction_count: i64,
    pub active: bool,
    /// A confirmed record is never auto-deactivated by reconciliation
    pub user_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

/// A statistical spending outlier, recomputed per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub merchant: String,
    pub amount: f64,
    pub category: String,
    pub z_score: f64,
    /// Human-readable label, e.g. "3.2x (Avg: 120)"
    pub severity: String,
}

/// Trigger severity, ordered alert > warning > info
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Alert,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Sort rank: alerts first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Alert => 0,
            Self::Warning => 1,
            Self::Info => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavioral trigger detector kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    WeekendSpike,
    CategorySpike,
    MerchantBinge,
    ImpulseBuy,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeekendSpike => "weekend_spike",
            Self::CategorySpike => "category_spike",
            Self::MerchantBinge => "merchant_binge",
            Self::ImpulseBuy => "impulse_buy",
        }
    }
}

/// A risky-spending pattern detected in the current month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub title: String,
    pub severity: Severity,
    pub reason: String,
    pub stats: serde_json::Value,
    pub transaction_ids: Vec<i64>,
}
