//! Statistical outlier detection over categorized spend.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{AnomalyResult, Category, Transaction};

/// Minimum category sample size before statistics are meaningful
const MIN_SAMPLE_SIZE: usize = 5;

/// Standard deviation threshold above which a charge is flagged
const Z_SCORE_THRESHOLD: f64 = 2.5;

/// Flag transactions whose amount is an outlier within their category.
///
/// Each category with at least five spend transactions gets a mean and a
/// sample standard deviation; charges more than 2.5 deviations above the
/// mean (and at least `min_amount`) are reported. Uncategorized
/// transactions never participate. Results come back largest first.
pub fn detect_anomalies(
    transactions: &[Transaction],
    categories: &[Category],
    min_amount: f64,
) -> Vec<AnomalyResult> {
    let category_names: HashMap<i64, &str> = categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let mut by_category: HashMap<i64, Vec<&Transaction>> = HashMap::new();
    for txn in transactions.iter().filter(|t| t.is_spend()) {
        let Some(category_id) = txn.category_id else {
            continue;
        };
        if !category_names.contains_key(&category_id) {
            continue;
        }
        by_category.entry(category_id).or_default().push(txn);
    }

    let mut anomalies = Vec::new();

    // Stable output order for equal amounts
    let mut category_ids: Vec<i64> = by_category.keys().copied().collect();
    category_ids.sort_unstable();

    for category_id in category_ids {
        let items = &by_category[&category_id];
        if items.len() < MIN_SAMPLE_SIZE {
            continue;
        }

        let amounts: Vec<f64> = items.iter().map(|t| t.amount).collect();
        let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
        let variance = amounts
            .iter()
            .map(|a| (a - mean).powi(2))
            .sum::<f64>()
            / (amounts.len() - 1) as f64;
        let stdev = variance.sqrt();

        if stdev == 0.0 {
            continue;
        }

        let category = category_names[&category_id];
        debug!(category, mean, stdev, "category statistics");

        for txn in items {
            if txn.amount < min_amount {
                continue;
            }
            let z_score = (txn.amount - mean) / stdev;
            if z_score <= Z_SCORE_THRESHOLD {
                continue;
            }

            anomalies.push(AnomalyResult {
                transaction_id: txn.id,
                date: txn.posted_date,
                merchant: display_merchant(txn),
                amount: txn.amount,
                category: category.to_string(),
                z_score,
                severity: format!("{:.1}x (Avg: {:.0})", z_score, mean),
            });
        }
    }

    anomalies.sort_by(|a, b| b.amount.partial_cmp(&a.amount).expect("amounts are finite"));
    anomalies
}

fn display_merchant(txn: &Transaction) -> String {
    if let Some(normalized) = txn.merchant_normalized.as_deref() {
        if !normalized.is_empty() {
            return normalized.to_string();
        }
    }
    if let Some(raw) = txn.merchant_raw.as_deref() {
        if !raw.is_empty() {
            return raw.to_string();
        }
    }
    "Unknown".to_string()
}
