//! Merchant canonicalization and fuzzy group merging
//!
//! Statement parsers truncate merchant names at different lengths across
//! statements (e.g. "Spotify Si" vs "Spotify"), so groups whose canonical
//! keys share a long common prefix are merged into one merchant.

use std::collections::{BTreeMap, HashMap};

use crate::models::Transaction;

/// Minimum shared-prefix length before two canonical keys can merge
const MERGE_PREFIX_LEN: usize = 6;

/// Canonical merchant key: lowercase, alphanumeric-and-space only,
/// trimmed, internal whitespace collapsed
pub fn canonical_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the common prefix of two canonical keys
pub(crate) fn common_prefix_len(a: &str, b: &str) -> usize {
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count()
}

/// A set of transactions judged to be the same real-world merchant
#[derive(Debug)]
pub struct MerchantGroup<'a> {
    /// Display label (shortest raw name wins on merge)
    pub label: String,
    pub transactions: Vec<&'a Transaction>,
}

/// Merge raw merchant groups whose canonical keys share a prefix.
///
/// Two keys merge when their common prefix is at least `MERGE_PREFIX_LEN`
/// characters AND covers the shorter of the two keys, i.e. one key is
/// essentially a prefix of the other. The shortest raw name among absorbed
/// members becomes the display label: truncation tends to produce longer
/// garbled variants, so the shorter name is assumed to be the human label.
/// This is a heuristic, not a guarantee.
///
/// O(k²) in distinct canonical merchants; k is bounded by unique merchants
/// per user, not transaction volume.
pub fn merge_merchant_groups<'a>(
    raw_groups: &HashMap<String, Vec<&'a Transaction>>,
) -> Vec<MerchantGroup<'a>> {
    // canonical key -> raw keys, sorted both ways for determinism
    let mut canon_to_keys: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for key in raw_groups.keys() {
        canon_to_keys.entry(canonical_key(key)).or_default().push(key);
    }
    for keys in canon_to_keys.values_mut() {
        keys.sort();
    }

    let canon_names: Vec<&String> = canon_to_keys.keys().collect();
    let mut used = vec![false; canon_names.len()];
    let mut merged = Vec::new();

    for i in 0..canon_names.len() {
        if used[i] {
            continue;
        }
        let ci = canon_names[i];
        let mut label = canon_to_keys[ci][0].clone();
        let mut transactions: Vec<&Transaction> = Vec::new();
        for raw_key in &canon_to_keys[ci] {
            transactions.extend(raw_groups[*raw_key].iter().copied());
        }
        used[i] = true;

        // Absorb any later unconsumed key where one is a prefix of the other
        for j in (i + 1)..canon_names.len() {
            if used[j] {
                continue;
            }
            let cj = canon_names[j];
            let prefix_len = common_prefix_len(ci, cj);
            if prefix_len >= MERGE_PREFIX_LEN
                && (prefix_len >= ci.len() || prefix_len >= cj.len())
            {
                for raw_key in &canon_to_keys[cj] {
                    transactions.extend(raw_groups[*raw_key].iter().copied());
                    if raw_key.len() < label.len() {
                        label = (*raw_key).clone();
                    }
                }
                used[j] = true;
            }
        }

        merged.push(MerchantGroup { label, transactions });
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn tx(id: i64, merchant: &str) -> Transaction {
        Transaction {
            id,
            posted_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            description: merchant.to_string(),
            amount: 199.0,
            merchant_raw: Some(merchant.to_string()),
            merchant_normalized: Some(merchant.to_string()),
            category_id: None,
            excluded: false,
            created_at: Utc::now(),
        }
    }

    fn group_map(txns: &[Transaction]) -> HashMap<String, Vec<&Transaction>> {
        let mut map: HashMap<String, Vec<&Transaction>> = HashMap::new();
        for t in txns {
            map.entry(t.merchant_normalized.clone().unwrap())
                .or_default()
                .push(t);
        }
        map
    }

    #[test]
    fn canonical_key_strips_and_collapses() {
        assert_eq!(canonical_key("Spotify  Si*123"), "spotify si123");
        assert_eq!(canonical_key("  NETFLIX.COM "), "netflixcom");
        assert_eq!(canonical_key("A1 Bakery & Co"), "a1 bakery co");
    }

    #[test]
    fn truncated_variants_merge_into_one_group() {
        let txns = vec![tx(1, "Spotify"), tx(2, "Spotify Si"), tx(3, "Spotify Sing")];
        let groups = merge_merchant_groups(&group_map(&txns));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].transactions.len(), 3);
    }

    #[test]
    fn shortest_raw_name_becomes_label() {
        let txns = vec![tx(1, "Spotify Singapore"), tx(2, "Spotify")];
        let groups = merge_merchant_groups(&group_map(&txns));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Spotify");
    }

    #[test]
    fn short_common_prefix_does_not_merge() {
        // Prefix "amazo"/"swigg" style collisions below 6 chars stay apart
        let txns = vec![tx(1, "Swiggy"), tx(2, "Swipe Card")];
        let groups = merge_merchant_groups(&group_map(&txns));
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn long_prefix_not_covering_shorter_key_does_not_merge() {
        // 7 shared chars but neither key is a prefix of the other
        let txns = vec![tx(1, "Reliance Mart"), tx(2, "Reliance Fuel")];
        let groups = merge_merchant_groups(&group_map(&txns));
        assert_eq!(groups.len(), 2);
    }
}
