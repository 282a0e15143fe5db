//! Fuzzy text similarity used by knowledge search.
//!
//! The ratio is `2·LCS(a, b) / (|a| + |b|)` over Unicode scalar values,
//! where LCS is the longest common subsequence. It is symmetric, lies in
//! `[0, 1]`, and is `1.0` for two identical (including two empty) strings.

/// Length of the longest common subsequence of `a` and `b`.
///
/// Two-row dynamic programme; memory is proportional to the shorter input.
pub fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

/// Normalized similarity in `[0.0, 1.0]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}
