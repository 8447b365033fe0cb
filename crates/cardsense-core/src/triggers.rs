//! Behavioral trigger detection.
//!
//! Four detectors over a single month of spend: weekend spikes, category
//! spikes versus a trailing baseline, merchant binges, and impulse buys.
//! Each produces zero or more [`Trigger`]s; the combined list is sorted
//! alert first.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::json;
use tracing::debug;

use crate::models::{Category, Severity, Transaction, Trigger, TriggerType};
use crate::planner::add_months;

/// Ratio at or above which a spike escalates from warning to alert
const ALERT_RATIO: f64 = 2.5;

/// Spike factor for weekend and category detectors
const SPIKE_FACTOR: f64 = 1.5;

/// Transactions per merchant per month that count as a binge
const BINGE_MIN_TXNS: usize = 5;

/// Impulse buy floor and multiple over the category average
const IMPULSE_MIN_AMOUNT: f64 = 2000.0;
const IMPULSE_FACTOR: f64 = 3.0;

/// Run every detector against the month containing `current_month` and
/// return the combined, severity-sorted list.
///
/// The trailing baseline covers `months_lookback` whole months ending at
/// the start of the current month. Excluded transactions and credits
/// never participate.
pub fn detect_triggers(
    transactions: &[Transaction],
    categories: &[Category],
    current_month: NaiveDate,
    months_lookback: u32,
) -> Vec<Trigger> {
    let cur_start = NaiveDate::from_ymd_opt(current_month.year(), current_month.month(), 1)
        .expect("first of month is valid");
    let cur_end = add_months(cur_start, 1);
    let trail_start = add_months(cur_start, -(months_lookback.max(1) as i32));

    let current: Vec<&Transaction> = spend_in(transactions, cur_start, cur_end);
    let trailing: Vec<&Transaction> = spend_in(transactions, trail_start, cur_start);
    debug!(
        current = current.len(),
        trailing = trailing.len(),
        month = %cur_start.format("%Y-%m"),
        "running trigger detectors"
    );

    let mut triggers = Vec::new();
    triggers.extend(weekend_spike(&current));
    triggers.extend(category_spike(&current, &trailing, categories, months_lookback));
    triggers.extend(merchant_binge(&current));
    triggers.extend(impulse_buys(&current, categories));

    triggers.sort_by_key(|t| t.severity.rank());
    triggers
}

fn spend_in<'a>(
    transactions: &'a [Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<&'a Transaction> {
    transactions
        .iter()
        .filter(|t| t.is_spend() && t.posted_date >= start && t.posted_date < end)
        .collect()
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn spike_severity(ratio: f64) -> Severity {
    if ratio < ALERT_RATIO {
        Severity::Warning
    } else {
        Severity::Alert
    }
}

/// Weekend vs weekday daily average within the current month. The average
/// is per distinct spending day, not per calendar day.
fn weekend_spike(current: &[&Transaction]) -> Vec<Trigger> {
    let mut weekday_total = 0.0;
    let mut weekend_total = 0.0;
    let mut weekday_days: HashSet<NaiveDate> = HashSet::new();
    let mut weekend_days: HashSet<NaiveDate> = HashSet::new();

    for txn in current {
        if is_weekend(txn.posted_date) {
            weekend_total += txn.amount;
            weekend_days.insert(txn.posted_date);
        } else {
            weekday_total += txn.amount;
            weekday_days.insert(txn.posted_date);
        }
    }

    let wk_avg = weekday_total / weekday_days.len().max(1) as f64;
    let we_avg = weekend_total / weekend_days.len().max(1) as f64;

    if wk_avg > 0.0 && we_avg > wk_avg * SPIKE_FACTOR {
        let ratio = round1(we_avg / wk_avg);
        return vec![Trigger {
            trigger_type: TriggerType::WeekendSpike,
            title: "Weekend Spending Spike".to_string(),
            severity: spike_severity(ratio),
            reason: format!(
                "Your weekend daily avg (₹{}) is {ratio}× your weekday avg (₹{}) this month.",
                format_amount(we_avg),
                format_amount(wk_avg),
            ),
            stats: json!({
                "weekend_daily_avg": we_avg.round(),
                "weekday_daily_avg": wk_avg.round(),
                "ratio": ratio,
            }),
            transaction_ids: Vec::new(),
        }];
    }
    Vec::new()
}

/// Categories whose current-month spend exceeds 1.5x the trailing monthly
/// average (and 500 in absolute terms).
fn category_spike(
    current: &[&Transaction],
    trailing: &[&Transaction],
    categories: &[Category],
    months_lookback: u32,
) -> Vec<Trigger> {
    let names: HashMap<i64, (&str, Option<&str>)> = categories
        .iter()
        .map(|c| (c.id, (c.name.as_str(), c.color.as_deref())))
        .collect();

    let trail_months = months_lookback.max(1) as f64;
    let mut trail_avg: HashMap<Option<i64>, f64> = HashMap::new();
    for txn in trailing {
        *trail_avg.entry(txn.category_id).or_default() += txn.amount;
    }
    for total in trail_avg.values_mut() {
        *total /= trail_months;
    }

    let mut cur_totals: HashMap<Option<i64>, f64> = HashMap::new();
    for txn in current {
        *cur_totals.entry(txn.category_id).or_default() += txn.amount;
    }

    let mut keys: Vec<Option<i64>> = cur_totals.keys().copied().collect();
    keys.sort();

    let mut triggers = Vec::new();
    for key in keys {
        let cur_total = cur_totals[&key];
        let avg = trail_avg.get(&key).copied().unwrap_or(0.0);
        if avg > 0.0 && cur_total > avg * SPIKE_FACTOR && cur_total > 500.0 {
            let ratio = round1(cur_total / avg);
            let (name, color) = key
                .and_then(|id| names.get(&id).copied())
                .unwrap_or(("Unknown", None));
            triggers.push(Trigger {
                trigger_type: TriggerType::CategorySpike,
                title: format!("{name} Spending Spike"),
                severity: spike_severity(ratio),
                reason: format!(
                    "₹{} this month vs ₹{}/mo average ({ratio}× increase).",
                    format_amount(cur_total),
                    format_amount(avg),
                ),
                stats: json!({
                    "category": name,
                    "color": color,
                    "current": cur_total.round(),
                    "average": avg.round(),
                    "ratio": ratio,
                }),
                transaction_ids: Vec::new(),
            });
        }
    }
    triggers
}

/// Merchants charged five or more times within the month
fn merchant_binge(current: &[&Transaction]) -> Vec<Trigger> {
    let mut by_merchant: HashMap<&str, (usize, f64)> = HashMap::new();
    for txn in current {
        let Some(merchant) = txn.merchant_normalized.as_deref() else {
            continue;
        };
        if merchant.is_empty() {
            continue;
        }
        let entry = by_merchant.entry(merchant).or_default();
        entry.0 += 1;
        entry.1 += txn.amount;
    }

    let mut merchants: Vec<(&str, usize, f64)> = by_merchant
        .into_iter()
        .filter(|(_, (count, _))| *count >= BINGE_MIN_TXNS)
        .map(|(merchant, (count, total))| (merchant, count, total))
        .collect();
    merchants.sort_by(|a, b| a.0.cmp(b.0));

    merchants
        .into_iter()
        .map(|(merchant, count, total)| Trigger {
            trigger_type: TriggerType::MerchantBinge,
            title: format!("Frequent: {merchant}"),
            severity: Severity::Info,
            reason: format!(
                "{count} transactions totalling ₹{} this month.",
                format_amount(total)
            ),
            stats: json!({
                "merchant": merchant,
                "count": count,
                "total": total.round(),
            }),
            transaction_ids: Vec::new(),
        })
        .collect()
}

/// Single charges at least 2000 and more than three times the average of
/// their category this month. Categories with under three charges are
/// skipped for lack of a baseline.
fn impulse_buys(current: &[&Transaction], categories: &[Category]) -> Vec<Trigger> {
    let names: HashMap<i64, &str> = categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let mut cat_stats: HashMap<Option<i64>, (f64, usize)> = HashMap::new();
    for txn in current {
        let entry = cat_stats.entry(txn.category_id).or_default();
        entry.0 += txn.amount;
        entry.1 += 1;
    }
    let cat_avg: HashMap<Option<i64>, f64> = cat_stats
        .into_iter()
        .filter(|(_, (_, count))| *count >= 3)
        .map(|(key, (total, count))| (key, total / count as f64))
        .collect();

    let mut triggers = Vec::new();
    for txn in current {
        if txn.amount < IMPULSE_MIN_AMOUNT {
            continue;
        }
        let Some(&avg) = cat_avg.get(&txn.category_id) else {
            continue;
        };
        if avg <= 0.0 || txn.amount <= avg * IMPULSE_FACTOR {
            continue;
        }

        let label = txn
            .merchant_normalized
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| txn.description.chars().take(30).collect());
        let cat_name = txn
            .category_id
            .and_then(|id| names.get(&id).copied())
            .unwrap_or("Unknown");

        triggers.push(Trigger {
            trigger_type: TriggerType::ImpulseBuy,
            title: format!("Unusually Large: {label}"),
            severity: Severity::Warning,
            reason: format!(
                "₹{} is {:.1}× the avg for {cat_name} (₹{}).",
                format_amount(txn.amount),
                txn.amount / avg,
                format_amount(avg),
            ),
            stats: json!({
                "amount": txn.amount.round(),
                "category_avg": avg.round(),
                "merchant": txn.merchant_normalized,
            }),
            transaction_ids: vec![txn.id],
        });
    }
    triggers
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Rounded amount with thousands separators, e.g. 12,345
fn format_amount(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
