//! Recurring charge detection
//!
//! Finds subscription and EMI/installment series in parsed statement data.
//! Two realities of statement data drive the design:
//!   1. Merchant names are truncated at different lengths across statements,
//!      so detection runs on merged merchant groups (see `merchants`).
//!   2. Months can be missing from uploaded statements, so the interval
//!      detector checks ALL transaction pairs, not just adjacent ones, and
//!      treats a gap that is a rough multiple of 30 days as monthly.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::{debug, info};

use crate::merchants::{canonical_key, merge_merchant_groups, MerchantGroup};
use crate::models::{Cadence, Confidence, SubscriptionCandidate, SubscriptionKind, Transaction};
use crate::planner::round2;
use crate::services::ServiceCatalog;

/// Amount tolerance for interval pairing: later/earlier ratio within ±10%
const AMOUNT_RATIO_MIN: f64 = 0.90;
const AMOUNT_RATIO_MAX: f64 = 1.10;

/// Compiled description patterns for EMI classification
struct EmiPatterns {
    /// Standalone word EMI anywhere in the description
    word: Regex,
    /// EMI followed by a principal/interest marker
    confirmed: Regex,
}

impl EmiPatterns {
    fn new() -> Self {
        Self {
            word: Regex::new(r"(?i)\bEMI\b").expect("valid regex"),
            confirmed: Regex::new(r"(?i)\bEMI[, ]*(PRIN|INT|PRINCIPAL|INTEREST)\b")
                .expect("valid regex"),
        }
    }
}

/// Scan spend transactions and return candidate recurring charges:
/// EMIs by description keyword, subscriptions by periodic interval at the
/// same merged merchant, and known services by keyword fallback.
///
/// Candidates are deduplicated by (canonical merchant, kind), keeping the
/// one with the most recent last payment.
pub fn detect_subscriptions(
    transactions: &[Transaction],
    catalog: &ServiceCatalog,
) -> Vec<SubscriptionCandidate> {
    let mut spends: Vec<&Transaction> = transactions.iter().filter(|t| t.is_spend()).collect();
    spends.sort_by_key(|t| t.posted_date);

    // Group by normalized merchant; nameless transactions cannot be grouped
    let mut raw_groups: HashMap<String, Vec<&Transaction>> = HashMap::new();
    for &txn in &spends {
        let key = txn
            .merchant_normalized
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string();
        if key.is_empty() {
            continue;
        }
        raw_groups.entry(key).or_default().push(txn);
    }

    let groups = merge_merchant_groups(&raw_groups);
    let patterns = EmiPatterns::new();
    let mut candidates = Vec::new();

    for group in &groups {
        detect_emis(group, &patterns, &mut candidates);
        detect_by_interval(group, &mut candidates);
    }

    detect_known_services(&spends, catalog, &mut candidates);

    let unique = dedupe_candidates(candidates);
    info!(
        merchants = groups.len(),
        candidates = unique.len(),
        "Recurring charge detection complete"
    );
    unique
}

/// Classify EMI transactions in a merchant group.
///
/// Confirmed EMIs (PRIN/INT markers, or OFFUS plus PRIN/INT) always yield an
/// installment candidate. Possible EMIs (the bare word) are promoted to
/// installment only when they repeat monthly with similar amounts; otherwise
/// they are flagged as possible_installment rather than silently dropped,
/// since ambiguous recurring debt is more useful flagged than missed.
fn detect_emis(
    group: &MerchantGroup<'_>,
    patterns: &EmiPatterns,
    out: &mut Vec<SubscriptionCandidate>,
) {
    let mut confirmed: Vec<&Transaction> = Vec::new();
    let mut possible: Vec<&Transaction> = Vec::new();

    for &txn in &group.transactions {
        let desc = txn.description.as_str();
        let upper = desc.to_uppercase();
        let is_confirmed = patterns.confirmed.is_match(desc)
            || (upper.contains("OFFUS") && (upper.contains("PRIN") || upper.contains("INT")));

        if is_confirmed {
            confirmed.push(txn);
        } else if patterns.word.is_match(desc) {
            possible.push(txn);
        }
    }

    if !confirmed.is_empty() {
        out.push(build_candidate(
            &group.label,
            &confirmed,
            SubscriptionKind::Installment,
            Confidence::High,
        ));
    }

    if !possible.is_empty() {
        if looks_like_monthly_series(&possible) {
            out.push(build_candidate(
                &group.label,
                &possible,
                SubscriptionKind::Installment,
                Confidence::Medium,
            ));
        } else {
            out.push(build_candidate(
                &group.label,
                &possible,
                SubscriptionKind::PossibleInstallment,
                Confidence::Low,
            ));
        }
    }
}

/// True when transactions repeat roughly monthly with similar amounts:
/// at least two amounts within ±10% of the median, and at least one
/// adjacent-pair gap in [25, 38] days or a rough multiple of 30.
fn looks_like_monthly_series(txns: &[&Transaction]) -> bool {
    if txns.len() < 2 {
        return false;
    }

    let mut sorted: Vec<&Transaction> = txns.to_vec();
    sorted.sort_by_key(|t| t.posted_date);

    let median = upper_median(sorted.iter().map(|t| t.amount));
    let similar = sorted
        .iter()
        .filter(|t| {
            median == 0.0
                || (AMOUNT_RATIO_MIN * median <= t.amount && t.amount <= AMOUNT_RATIO_MAX * median)
        })
        .count();
    if similar < 2 {
        return false;
    }

    sorted.windows(2).any(|w| {
        let gap = (w[1].posted_date - w[0].posted_date).num_days();
        (25..=38).contains(&gap) || (gap > 38 && gap % 30 <= 8)
    })
}

/// Map a day gap to a recurrence period.
///
/// The trailing arm handles sparse statement coverage: a gap that is a rough
/// multiple of 30 days (e.g. only Jan and Nov statements uploaded) is still
/// treated as monthly.
fn classify_gap(days: i64) -> Option<Cadence> {
    match days {
        25..=38 => Some(Cadence::Monthly),
        55..=70 => Some(Cadence::Bimonthly),
        80..=100 => Some(Cadence::Quarterly),
        170..=200 => Some(Cadence::HalfYearly),
        350..=395 => Some(Cadence::Yearly),
        d if d > 38 && d % 30 <= 8 => Some(Cadence::Monthly),
        _ => None,
    }
}

/// Interval-based subscription detection over one merchant group.
///
/// Every pair of transactions with similar amounts and a periodic gap is
/// evidence; the pair with the most recent second transaction is
/// authoritative for period and dates, while amount and transaction count
/// aggregate over all qualifying pairs.
fn detect_by_interval(group: &MerchantGroup<'_>, out: &mut Vec<SubscriptionCandidate>) {
    if group.transactions.len() < 2 {
        return;
    }

    let mut sorted: Vec<&Transaction> = group.transactions.to_vec();
    sorted.sort_by_key(|t| t.posted_date);

    let mut best: Option<(usize, usize, Cadence)> = None;
    let mut matching_ids: HashSet<i64> = HashSet::new();
    let mut total_amount = 0.0;
    let mut pair_count = 0usize;

    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let (t1, t2) = (sorted[i], sorted[j]);
            if t1.amount == 0.0 {
                continue;
            }
            let ratio = t2.amount / t1.amount;
            if !(AMOUNT_RATIO_MIN..=AMOUNT_RATIO_MAX).contains(&ratio) {
                continue;
            }

            let delta = (t2.posted_date - t1.posted_date).num_days();
            if let Some(period) = classify_gap(delta) {
                matching_ids.insert(t1.id);
                matching_ids.insert(t2.id);
                total_amount += t2.amount;
                pair_count += 1;
                // First pair with a strictly later second transaction wins
                let replace = match best {
                    None => true,
                    Some((_, bj, _)) => t2.posted_date > sorted[bj].posted_date,
                };
                if replace {
                    best = Some((i, j, period));
                }
            }
        }
    }

    if let Some((i, j, cadence)) = best {
        let avg = round2(total_amount / pair_count as f64);
        let confidence = if pair_count >= 2 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        debug!(
            merchant = %group.label,
            cadence = %cadence,
            pairs = pair_count,
            "Interval series found"
        );
        out.push(SubscriptionCandidate {
            merchant: group.label.clone(),
            amount: avg,
            cadence,
            kind: SubscriptionKind::Subscription,
            confidence,
            first_seen: sorted[i].posted_date,
            last_seen: sorted[j].posted_date,
            transaction_count: matching_ids.len(),
        });
    }
}

/// Keyword fallback for well-known services missed by interval detection.
///
/// Skips any service whose canonical display name already overlaps (substring
/// either direction) a candidate produced by the other detectors, preventing
/// duplicate candidates for the same real merchant.
fn detect_known_services(
    transactions: &[&Transaction],
    catalog: &ServiceCatalog,
    out: &mut Vec<SubscriptionCandidate>,
) {
    let already: Vec<String> = out.iter().map(|c| canonical_key(&c.merchant)).collect();

    // Bucket transactions by matched display name, first match wins
    let mut service_txns: Vec<(String, Vec<&Transaction>)> = Vec::new();
    for &txn in transactions {
        let text = format!(
            "{} {}",
            txn.description,
            txn.merchant_normalized.as_deref().unwrap_or("")
        )
        .to_lowercase();

        let Some(entry) = catalog.match_keyword(&text) else {
            continue;
        };
        let canon_display = canonical_key(&entry.display);
        if already
            .iter()
            .any(|a| canon_display.contains(a.as_str()) || a.contains(&canon_display))
        {
            continue;
        }
        match service_txns.iter_mut().find(|(d, _)| *d == entry.display) {
            Some((_, bucket)) => bucket.push(txn),
            None => service_txns.push((entry.display.clone(), vec![txn])),
        }
    }

    for (display, mut txns) in service_txns {
        txns.sort_by_key(|t| t.posted_date);
        let avg = round2(txns.iter().map(|t| t.amount).sum::<f64>() / txns.len() as f64);

        // Default Monthly for known services; override only with strong
        // evidence from the median inter-transaction gap.
        let mut cadence = Cadence::Monthly;
        if txns.len() >= 2 {
            let gaps: Vec<i64> = txns
                .windows(2)
                .map(|w| (w[1].posted_date - w[0].posted_date).num_days())
                .collect();
            let median_gap = upper_median_i64(&gaps);
            if median_gap > 38 && median_gap % 30 <= 8 {
                cadence = Cadence::Monthly;
            } else if median_gap > 300 {
                cadence = Cadence::Yearly;
            } else if median_gap > 80 {
                cadence = Cadence::Quarterly;
            }
        }

        let confidence = if txns.len() >= 2 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        out.push(SubscriptionCandidate {
            merchant: display,
            amount: avg,
            cadence,
            kind: SubscriptionKind::Subscription,
            confidence,
            first_seen: txns[0].posted_date,
            last_seen: txns[txns.len() - 1].posted_date,
            transaction_count: txns.len(),
        });
    }
}

fn build_candidate(
    label: &str,
    txns: &[&Transaction],
    kind: SubscriptionKind,
    confidence: Confidence,
) -> SubscriptionCandidate {
    let mut sorted: Vec<&Transaction> = txns.to_vec();
    sorted.sort_by_key(|t| t.posted_date);
    let avg = round2(sorted.iter().map(|t| t.amount).sum::<f64>() / sorted.len() as f64);
    SubscriptionCandidate {
        merchant: label.to_string(),
        amount: avg,
        cadence: Cadence::Monthly,
        kind,
        confidence,
        first_seen: sorted[0].posted_date,
        last_seen: sorted[sorted.len() - 1].posted_date,
        transaction_count: sorted.len(),
    }
}

/// Keep the candidate with the latest last payment per (canonical merchant,
/// kind); first-appearance order is preserved
fn dedupe_candidates(candidates: Vec<SubscriptionCandidate>) -> Vec<SubscriptionCandidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SubscriptionCandidate> = Vec::new();
    for cand in candidates {
        let key = format!("{}|{}", canonical_key(&cand.merchant), cand.kind.as_str());
        match index.get(&key) {
            Some(&pos) => {
                if cand.last_seen > unique[pos].last_seen {
                    unique[pos] = cand;
                }
            }
            None => {
                index.insert(key, unique.len());
                unique.push(cand);
            }
        }
    }
    unique
}

/// Upper median: sorted[len / 2], matching the series tests' tie behavior
fn upper_median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("amounts are finite"));
    sorted[sorted.len() / 2]
}

fn upper_median_i64(values: &[i64]) -> i64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn tx(id: i64, date: (i32, u32, u32), desc: &str, merchant: &str, amount: f64) -> Transaction {
        Transaction {
            id,
            posted_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: desc.to_string(),
            amount,
            merchant_raw: Some(merchant.to_string()),
            merchant_normalized: Some(merchant.to_string()),
            category_id: None,
            excluded: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn steady_monthly_series_yields_one_high_confidence_candidate() {
        // Five charges 30 days apart: the latest-second-transaction pair is
        // (first, last) with a 120-day gap, classified Monthly via the
        // gap-modulo rule.
        let txns: Vec<Transaction> = (0..5)
            .map(|i| {
                tx(
                    i,
                    (2026, 1 + i as u32, 5),
                    "SPOTIFY SI",
                    "Spotify",
                    199.0,
                )
            })
            .collect();
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.cadence, Cadence::Monthly);
        assert_eq!(c.kind, SubscriptionKind::Subscription);
        assert_eq!(c.confidence, Confidence::High);
        assert_eq!(c.transaction_count, 5);
        assert_eq!(c.amount, 199.0);
        assert_eq!(c.first_seen, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(c.last_seen, NaiveDate::from_ymd_opt(2026, 5, 5).unwrap());
    }

    #[test]
    fn sparse_months_still_detected_as_monthly() {
        // Only the Jan and May statements were uploaded: the 120-day gap
        // falls outside every band but is a multiple of 30, so the
        // sparse-coverage rule classifies it Monthly.
        let txns = vec![
            tx(1, (2026, 1, 10), "NETFLIX.COM", "Netflix India", 649.0),
            tx(2, (2026, 5, 10), "NETFLIX.COM", "Netflix India", 649.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cadence, Cadence::Monthly);
        assert_eq!(candidates[0].confidence, Confidence::Medium);
    }

    #[test]
    fn gap_bands_map_to_their_cadences() {
        assert_eq!(classify_gap(30), Some(Cadence::Monthly));
        assert_eq!(classify_gap(60), Some(Cadence::Bimonthly));
        assert_eq!(classify_gap(90), Some(Cadence::Quarterly));
        assert_eq!(classify_gap(185), Some(Cadence::HalfYearly));
        assert_eq!(classify_gap(365), Some(Cadence::Yearly));
        // Band edges
        assert_eq!(classify_gap(55), Some(Cadence::Bimonthly));
        assert_eq!(classify_gap(70), Some(Cadence::Bimonthly));
        assert_eq!(classify_gap(80), Some(Cadence::Quarterly));
        assert_eq!(classify_gap(100), Some(Cadence::Quarterly));
        assert_eq!(classify_gap(170), Some(Cadence::HalfYearly));
        assert_eq!(classify_gap(200), Some(Cadence::HalfYearly));
        // Off-band gaps that are not rough 30-day multiples
        assert_eq!(classify_gap(15), None);
        assert_eq!(classify_gap(45), None);
        assert_eq!(classify_gap(140), None);
    }

    #[test]
    fn bimonthly_pair_detected_from_sixty_day_gap() {
        let txns = vec![
            tx(1, (2026, 1, 10), "AIRTEL POSTPAID", "Airtel", 839.0),
            tx(2, (2026, 3, 11), "AIRTEL POSTPAID", "Airtel", 839.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cadence, Cadence::Bimonthly);
        assert_eq!(candidates[0].confidence, Confidence::Medium);
    }

    #[test]
    fn quarterly_pair_detected_from_ninety_day_gap() {
        let txns = vec![
            tx(1, (2026, 1, 5), "ICICI LOMBARD", "ICICI Lombard", 3200.0),
            tx(2, (2026, 4, 5), "ICICI LOMBARD", "ICICI Lombard", 3200.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cadence, Cadence::Quarterly);
    }

    #[test]
    fn half_yearly_pair_detected_from_half_year_gap() {
        // Jan 5 to Jul 5 is 181 days, inside the half-yearly band
        let txns = vec![
            tx(1, (2026, 1, 5), "SOCIETY MAINT", "Society Maint", 9000.0),
            tx(2, (2026, 7, 5), "SOCIETY MAINT", "Society Maint", 9000.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cadence, Cadence::HalfYearly);
    }

    #[test]
    fn amount_drift_beyond_tolerance_breaks_the_pair() {
        let txns = vec![
            tx(1, (2026, 1, 10), "GYM", "Anytime Fitness", 1000.0),
            tx(2, (2026, 2, 10), "GYM", "Anytime Fitness", 1200.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert!(candidates.is_empty());
    }

    #[test]
    fn confirmed_emi_always_yields_installment() {
        // Single confirmed charge is enough, no series required
        let txns = vec![tx(
            1,
            (2026, 2, 3),
            "OFFUS EMI,PRIN 04/12",
            "HDFC Bank",
            4500.0,
        )];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, SubscriptionKind::Installment);
        assert_eq!(candidates[0].confidence, Confidence::High);
    }

    #[test]
    fn possible_emi_promoted_only_with_monthly_series() {
        let monthly = vec![
            tx(1, (2026, 1, 5), "BAJAJ FIN EMI", "Bajaj Finance", 2999.0),
            tx(2, (2026, 2, 4), "BAJAJ FIN EMI", "Bajaj Finance", 2999.0),
        ];
        let candidates = detect_subscriptions(&monthly, &ServiceCatalog { services: vec![] });
        let emi = candidates
            .iter()
            .find(|c| c.kind == SubscriptionKind::Installment)
            .expect("promoted installment");
        assert_eq!(emi.confidence, Confidence::Medium);

        // One-off EMI mention: flagged, not dropped and not promoted
        let single = vec![tx(1, (2026, 1, 5), "SOME EMI CHARGE", "Shop", 2999.0)];
        let candidates = detect_subscriptions(&single, &ServiceCatalog { services: vec![] });
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, SubscriptionKind::PossibleInstallment);
        assert_eq!(candidates[0].confidence, Confidence::Low);
    }

    #[test]
    fn emi_word_requires_word_boundary() {
        // "EMI" embedded in another word must not classify as an installment
        let txns = vec![tx(1, (2026, 1, 5), "SEMINAR FEE PREMIUM", "EventCo", 500.0)];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog { services: vec![] });
        assert!(candidates.is_empty());
    }

    #[test]
    fn known_service_catches_single_charge() {
        let txns = vec![tx(1, (2026, 1, 15), "NETFLIX.COM BILL", "Netflix In", 649.0)];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].merchant, "Netflix");
        assert_eq!(candidates[0].cadence, Cadence::Monthly);
        assert_eq!(candidates[0].confidence, Confidence::Medium);
    }

    #[test]
    fn known_service_skipped_when_interval_already_found_it() {
        let txns = vec![
            tx(1, (2026, 1, 5), "SPOTIFY SI", "Spotify", 199.0),
            tx(2, (2026, 2, 4), "SPOTIFY SI", "Spotify", 199.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog::default());
        // Interval candidate for Spotify exists; the catalog must not add a
        // second one for the same merchant
        assert_eq!(
            candidates
                .iter()
                .filter(|c| canonical_key(&c.merchant).contains("spotify"))
                .count(),
            1
        );
    }

    #[test]
    fn known_service_yearly_cadence_from_median_gap() {
        // Nameless transactions skip merchant grouping entirely, so only the
        // catalog can see them. 350-day gap: not a rough multiple of 30
        // (350 % 30 = 20) and above 300, so the cadence guess is Yearly.
        let txns = vec![
            tx(1, (2024, 3, 1), "AUDIBLE MEMBERSHIP", "", 1499.0),
            tx(2, (2025, 2, 14), "AUDIBLE MEMBERSHIP", "", 1499.0),
        ];
        let candidates = detect_subscriptions(&txns, &ServiceCatalog::default());
        assert_eq!(candidates.len(), 1);
        let audible = &candidates[0];
        assert_eq!(audible.merchant, "Audible");
        assert_eq!(audible.cadence, Cadence::Yearly);
        assert_eq!(audible.confidence, Confidence::High);
    }

    #[test]
    fn excluded_and_credit_transactions_are_ignored() {
        let refund = tx(1, (2026, 1, 5), "SPOTIFY SI", "Spotify", -199.0);
        let mut excluded = tx(2, (2026, 2, 4), "SPOTIFY SI", "Spotify", 199.0);
        excluded.excluded = true;
        let candidates =
            detect_subscriptions(&[refund, excluded], &ServiceCatalog { services: vec![] });
        assert!(candidates.is_empty());
    }

    #[test]
    fn dedupe_keeps_latest_last_seen_per_merchant_and_kind() {
        let a = SubscriptionCandidate {
            merchant: "Spotify".to_string(),
            amount: 199.0,
            cadence: Cadence::Monthly,
            kind: SubscriptionKind::Subscription,
            confidence: Confidence::Medium,
            first_seen: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            last_seen: NaiveDate::from_ymd_opt(2026, 2, 4).unwrap(),
            transaction_count: 2,
        };
        let mut b = a.clone();
        b.merchant = "Spotify Si".to_string();
        b.last_seen = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        let mut c = a.clone();
        c.kind = SubscriptionKind::Installment;

        let unique = dedupe_candidates(vec![a, b, c]);
        assert_eq!(unique.len(), 2);
        assert_eq!(
            unique[0].last_seen,
            NaiveDate::from_ymd_opt(2026, 3, 6).unwrap()
        );
        assert_eq!(unique[1].kind, SubscriptionKind::Installment);
    }
}
