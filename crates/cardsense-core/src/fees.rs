//! Fee and tax identification.
//!
//! Scans debit descriptions for fee-like keywords (GST variants, forex
//! markup, late fees, annual charges) and rolls the matches up into a
//! small report with a per-bucket breakdown.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::Transaction;

/// Keyword list for fee matching, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeCatalog {
    pub keywords: Vec<String>,
}

impl Default for FeeCatalog {
    fn default() -> Self {
        let keywords = [
            "IGST",
            "CGST",
            "SGST",
            "GST",
            "MARKUP FEE",
            "CONSOLIDATED FCY",
            "FOREX MARKUP",
            "LATE FEE",
            "INTEREST CHARGE",
            "FINANCE CHARGE",
            "ANNUAL FEE",
            "RENEWAL FEE",
            "PROCESSING FEE",
        ];
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl FeeCatalog {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    fn matches(&self, upper_description: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| upper_description.contains(k.as_str()))
    }
}

/// One transaction identified as a fee or tax
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeTransaction {
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
}

/// Per-bucket totals for the fee report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub forex_markup: f64,
    pub gst_taxes: f64,
    pub late_interest: f64,
    pub other: f64,
}

/// Aggregate fee report; transactions come back newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeReport {
    pub total: f64,
    pub count: usize,
    pub transactions: Vec<FeeTransaction>,
    pub breakdown: FeeBreakdown,
}

/// Scan debits for fee-like charges.
///
/// Matching is case-insensitive keyword containment on the description.
/// Bucket assignment is first match wins: markup and FCY beat GST, which
/// beats late and interest, and anything else lands in `other`.
pub fn analyze_fees(transactions: &[Transaction], catalog: &FeeCatalog) -> FeeReport {
    let mut fee_txns = Vec::new();
    let mut total = 0.0;
    let mut breakdown = FeeBreakdown::default();

    for txn in transactions.iter().filter(|t| t.is_spend()) {
        let upper = txn.description.to_uppercase();
        if !catalog.matches(&upper) {
            continue;
        }

        total += txn.amount;
        if upper.contains("MARKUP") || upper.contains("FCY") {
            breakdown.forex_markup += txn.amount;
        } else if upper.contains("GST") {
            breakdown.gst_taxes += txn.amount;
        } else if upper.contains("LATE") || upper.contains("INTEREST") {
            breakdown.late_interest += txn.amount;
        } else {
            breakdown.other += txn.amount;
        }

        fee_txns.push(FeeTransaction {
            transaction_id: txn.id,
            date: txn.posted_date,
            description: txn.description.clone(),
            amount: txn.amount,
        });
    }

    fee_txns.sort_by(|a, b| b.date.cmp(&a.date));
    debug!(count = fee_txns.len(), total, "fee scan complete");

    FeeReport {
        total,
        count: fee_txns.len(),
        transactions: fee_txns,
        breakdown,
    }
}
