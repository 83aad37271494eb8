//! Vendor text normalization and lexical similarity.
//!
//! Every place that compares vendor text goes through [`normalize_vendor`] so
//! history-side, bank-side and rule-side strings line up.

/// Minimum similarity (0-100) for a fuzzy-tier match. Inclusive.
pub const FUZZY_THRESHOLD: f64 = 85.0;

/// Lowercase and trim. Idempotent.
pub fn normalize_vendor(vendor: &str) -> String {
    vendor.trim().to_lowercase()
}

/// Normalized indel similarity on a 0-100 scale:
/// `200 * LCS(a, b) / (len(a) + len(b))`, counted in chars.
///
/// Symmetric, and 100 for identical strings (including two empty ones).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    (200 * lcs_len(&a, &b)) as f64 / total as f64
}

/// Longest common subsequence length, two-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (a, b) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; a.len() + 1];
    let mut curr = vec![0usize; a.len() + 1];

    for cb in b {
        for (i, ca) in a.iter().enumerate() {
            curr[i + 1] = if ca == cb {
                prev[i] + 1
            } else {
                curr[i].max(prev[i + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[a.len()]
}
