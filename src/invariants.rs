//! Derived sequence invariants.
//!
//! Everything here is a pure function of the term series. The ingester
//! computes invariants once per record; the invariant filter recomputes the
//! same functions on the query side so predicates line up exactly.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::model::{Invariants, SignPattern};

/// Number of leading terms covered by the prefix hash.
pub const PREFIX_HASH_TERMS: usize = 5;

/// Minimum nonzero-suffix length for a growth-rate fit.
const GROWTH_MIN_POINTS: usize = 4;

/// Order-sensitive hash of the first `PREFIX_HASH_TERMS` terms (all terms if
/// shorter). Hashes the canonical comma-joined decimal rendering, so the
/// value depends on those terms and nothing else.
pub fn prefix_hash(terms: &[BigInt]) -> i64 {
    let take = terms.len().min(PREFIX_HASH_TERMS);
    let mut hasher = blake3::Hasher::new();
    for (i, t) in terms[..take].iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        hasher.update(t.to_str_radix(10).as_bytes());
    }
    let digest = hasher.finalize();
    i64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap())
}

/// Lossy conversion for statistics; saturates far outside f64 range instead
/// of losing the sign.
pub(crate) fn big_to_f64(t: &BigInt) -> f64 {
    t.to_f64()
        .unwrap_or(if t.is_negative() { -1e300 } else { 1e300 })
}

fn clamp_i64(t: &BigInt) -> i64 {
    t.to_i64()
        .unwrap_or(if t.is_negative() { i64::MIN } else { i64::MAX })
}

/// Classify the signs of a term series.
///
/// `Alternating` requires strictly alternating signs with no zeros; a series
/// mixing signs any other way is `Mixed`.
pub fn sign_pattern(terms: &[BigInt]) -> SignPattern {
    if terms.iter().all(|t| t.is_zero()) {
        return SignPattern::AllZero;
    }
    if terms.iter().all(|t| !t.is_negative()) {
        return SignPattern::NonNegative;
    }
    if terms.iter().all(|t| !t.is_positive()) {
        return SignPattern::NonPositive;
    }
    let alternating = terms.iter().all(|t| !t.is_zero())
        && terms
            .windows(2)
            .all(|w| (w[0].is_positive()) != (w[1].is_positive()));
    if alternating {
        SignPattern::Alternating
    } else {
        SignPattern::Mixed
    }
}

/// Population variance of the series as f64.
pub fn variance(terms: &[BigInt]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let vals: Vec<f64> = terms.iter().map(big_to_f64).collect();
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / vals.len() as f64;
    if var.is_finite() {
        var
    } else {
        f64::MAX
    }
}

fn first_differences(terms: &[BigInt]) -> Vec<BigInt> {
    terms.windows(2).map(|w| &w[1] - &w[0]).collect()
}

/// Least-squares slope of `ln|a_n|` over the longest all-nonzero suffix.
///
/// Returns `None` for suffixes shorter than four terms or with no spread in
/// magnitude (a flat tail has no meaningful exponent).
pub fn growth_rate(terms: &[BigInt]) -> Option<f64> {
    let start = terms
        .iter()
        .rposition(|t| t.is_zero())
        .map(|p| p + 1)
        .unwrap_or(0);
    let suffix = &terms[start..];
    if suffix.len() < GROWTH_MIN_POINTS {
        return None;
    }
    let logs: Vec<f64> = suffix.iter().map(|t| big_to_f64(t).abs().ln()).collect();
    let spread = logs.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        - logs.iter().cloned().fold(f64::INFINITY, f64::min);
    if !spread.is_finite() || spread < 1e-9 {
        return None;
    }
    // Simple linear regression of log-magnitude against index.
    let n = logs.len() as f64;
    let mean_x = (logs.len() - 1) as f64 / 2.0;
    let mean_y = logs.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in logs.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    if slope.is_finite() {
        Some(slope)
    } else {
        None
    }
}

/// Gcd of absolute values; zero when every term is zero.
pub fn gcd_of_terms(terms: &[BigInt]) -> BigInt {
    let mut acc = BigInt::zero();
    for t in terms {
        acc = acc.gcd(t);
        if acc == BigInt::from(1) {
            break;
        }
    }
    acc
}

/// Compute the full invariant block for a term series.
pub fn derive_invariants(terms: &[BigInt]) -> Invariants {
    let diffs = first_differences(terms);
    let min_val = terms.iter().min().map(clamp_i64).unwrap_or(0);
    let max_val = terms.iter().max().map(clamp_i64).unwrap_or(0);
    Invariants {
        prefix_hash: prefix_hash(terms),
        min_val,
        max_val,
        gcd_val: clamp_i64(&gcd_of_terms(terms)),
        is_nondecreasing: terms.windows(2).all(|w| w[0] <= w[1]),
        is_nonincreasing: terms.windows(2).all(|w| w[0] >= w[1]),
        sign_pattern: sign_pattern(terms),
        nonzero_count: terms.iter().filter(|t| !t.is_zero()).count() as u32,
        first_diff_sign_pattern: sign_pattern(&diffs),
        growth_rate: growth_rate(terms),
        variance: variance(terms),
        diff_variance: variance(&diffs),
    }
}
