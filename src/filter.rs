//! Candidate selection: derive the store predicates a query imposes.
//!
//! The filters here are sound, not minimal: a record outside the returned
//! predicate set can never match, but a record inside it still has to pass
//! the matcher. Wildcards widen the predicates wherever a wildcard value
//! could change the invariant being constrained.

use num_traits::Zero;

use crate::invariants::{gcd_of_terms, prefix_hash, sign_pattern, PREFIX_HASH_TERMS};
use crate::model::{SequenceQuery, SignPattern};
use crate::store::ScanFilter;

/// Largest query gcd for which divisor enumeration is pushed down.
/// Beyond this the divisor walk costs more than the rows it would prune.
const GCD_PUSHDOWN_MAX: i64 = 1_000_000;

/// Stored sign patterns compatible with a query pattern.
///
/// A stored record is longer than the query, so its overall pattern may be
/// coarser than the matched window's; the sets below err on the inclusive
/// side.
fn compatible_sign_patterns(query_pattern: SignPattern) -> Vec<SignPattern> {
    match query_pattern {
        SignPattern::NonNegative => vec![
            SignPattern::NonNegative,
            SignPattern::AllZero,
            SignPattern::Mixed,
        ],
        SignPattern::NonPositive => vec![
            SignPattern::NonPositive,
            SignPattern::AllZero,
            SignPattern::Mixed,
        ],
        SignPattern::Alternating => vec![
            SignPattern::Alternating,
            SignPattern::Mixed,
            SignPattern::AllZero,
        ],
        SignPattern::Mixed => vec![
            SignPattern::NonNegative,
            SignPattern::NonPositive,
            SignPattern::Alternating,
            SignPattern::Mixed,
        ],
        SignPattern::AllZero => vec![
            SignPattern::AllZero,
            SignPattern::NonNegative,
            SignPattern::NonPositive,
            SignPattern::Mixed,
        ],
    }
}

/// All divisors of `n`, ascending.
fn divisors(n: i64) -> Vec<i64> {
    let mut out = Vec::new();
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            out.push(i);
            if i != n / i {
                out.push(n / i);
            }
        }
        i += 1;
    }
    out.sort_unstable();
    out
}

/// Predicate set for the exact stage (prefix or subsequence matching).
pub fn exact_filter(query: &SequenceQuery) -> ScanFilter {
    let mut filter = ScanFilter::default();
    let subsequence = query.allow_subsequence;

    if !subsequence && query.len() >= PREFIX_HASH_TERMS && !query.has_wildcards() {
        filter.prefix_hash = Some(prefix_hash(&query.terms));
    }

    // A wildcard can take any sign, so sign-derived predicates only hold for
    // wildcard-free queries. The gcd and nonzero bounds survive wildcards:
    // the placeholder zero neither raises the gcd nor the nonzero count.
    if !query.has_wildcards() {
        filter.sign_patterns = Some(compatible_sign_patterns(sign_pattern(&query.terms)));
        let diffs: Vec<_> = query.terms.windows(2).map(|w| &w[1] - &w[0]).collect();
        filter.diff_sign_patterns = Some(compatible_sign_patterns(sign_pattern(&diffs)));
    }

    let query_nonzero = query.terms.iter().filter(|t| !t.is_zero()).count() as u32;
    let slack = if subsequence { 1 } else { 0 };
    filter.nonzero_min = Some(query_nonzero.saturating_sub(slack));

    filter.min_length = Some(query.len() as u32);

    // Stored gcd must divide the query gcd (the stored gcd may be coarser
    // than the matched window's, never finer).
    if let Some(qgcd) = gcd_pushdown_value(query) {
        filter.gcd_in = Some(divisors(qgcd));
    }

    filter
}

/// Relaxed predicate set feeding similarity ranking and combination search.
///
/// Combinations can rescale, negate, and shift candidates, so every
/// sign-derived and magnitude-derived constraint is dropped; only the
/// overlap-length floor remains, plus an optional growth band when the
/// caller opts in.
pub fn relaxed_filter(query: &SequenceQuery, growth_band_delta: Option<f64>) -> ScanFilter {
    let mut filter = ScanFilter {
        min_length: Some(query.min_match_length as u32),
        ..Default::default()
    };
    if let Some(delta) = growth_band_delta {
        if let Some(g) = crate::invariants::growth_rate(&query.terms) {
            filter.growth_band = Some((g - delta, g + delta));
        }
    }
    filter
}

fn gcd_pushdown_value(query: &SequenceQuery) -> Option<i64> {
    use num_traits::ToPrimitive;
    let qgcd = gcd_of_terms(&query.terms);
    if qgcd.is_zero() {
        return None;
    }
    match qgcd.to_i64() {
        Some(g) if g <= GCD_PUSHDOWN_MAX => Some(g),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn query(vals: &[i64]) -> SequenceQuery {
        SequenceQuery::new(vals.iter().map(|&v| BigInt::from(v)).collect())
    }

    #[test]
    fn prefix_hash_set_for_long_wildcard_free_prefix_query() {
        let q = query(&[0, 1, 1, 2, 3, 5, 8]);
        let f = exact_filter(&q);
        assert_eq!(
            f.prefix_hash,
            Some(prefix_hash(&q.terms[..PREFIX_HASH_TERMS]))
        );
        assert_eq!(f.min_length, Some(7));
    }

    #[test]
    fn no_prefix_hash_for_short_or_wildcard_or_subsequence() {
        assert!(exact_filter(&query(&[1, 2, 3])).prefix_hash.is_none());

        let mut wild = query(&[1, 2, 3, 4, 5]);
        wild.wildcards = vec![2];
        assert!(exact_filter(&wild).prefix_hash.is_none());

        let mut subseq = query(&[1, 2, 3, 4, 5]);
        subseq.allow_subsequence = true;
        assert!(exact_filter(&subseq).prefix_hash.is_none());
    }

    #[test]
    fn sign_compatibility_sets() {
        let f = exact_filter(&query(&[1, 2, 3]));
        let pats = f.sign_patterns.unwrap();
        assert!(pats.contains(&SignPattern::NonNegative));
        assert!(pats.contains(&SignPattern::Mixed));
        assert!(!pats.contains(&SignPattern::Alternating));

        let f = exact_filter(&query(&[1, -2, 3]));
        let pats = f.sign_patterns.unwrap();
        assert!(pats.contains(&SignPattern::Alternating));
        assert!(pats.contains(&SignPattern::Mixed));
        assert!(!pats.contains(&SignPattern::NonNegative));
    }

    #[test]
    fn wildcards_drop_sign_predicates_but_keep_bounds() {
        let mut q = query(&[1, 0, 3]);
        q.wildcards = vec![1];
        let f = exact_filter(&q);
        assert!(f.sign_patterns.is_none());
        assert!(f.diff_sign_patterns.is_none());
        // Two known nonzero terms; the wildcard contributes nothing.
        assert_eq!(f.nonzero_min, Some(2));
        assert_eq!(f.min_length, Some(3));
    }

    #[test]
    fn gcd_divisor_pushdown() {
        let f = exact_filter(&query(&[6, 12, 18]));
        assert_eq!(f.gcd_in, Some(vec![1, 2, 3, 6]));
        // All-zero query has gcd 0: no constraint.
        let f = exact_filter(&query(&[0, 0, 0]));
        assert!(f.gcd_in.is_none());
    }

    #[test]
    fn subsequence_slack_loosens_nonzero_floor() {
        let mut q = query(&[1, 2, 3, 4]);
        q.allow_subsequence = true;
        assert_eq!(exact_filter(&q).nonzero_min, Some(3));
        let q = query(&[1, 2, 3, 4]);
        assert_eq!(exact_filter(&q).nonzero_min, Some(4));
    }

    #[test]
    fn relaxed_filter_only_constrains_length() {
        let q = query(&[7, 14, 21, 28, 35]);
        let f = relaxed_filter(&q, None);
        assert!(f.sign_patterns.is_none());
        assert!(f.nonzero_min.is_none());
        assert!(f.prefix_hash.is_none());
        assert!(f.gcd_in.is_none());
        assert_eq!(f.min_length, Some(3));
    }

    #[test]
    fn relaxed_filter_growth_band_opt_in() {
        let vals: Vec<i64> = (0..10).map(|n| 1i64 << n).collect();
        let q = query(&vals);
        let f = relaxed_filter(&q, Some(0.5));
        let (lo, hi) = f.growth_band.unwrap();
        assert!(lo < std::f64::consts::LN_2 && std::f64::consts::LN_2 < hi);
    }

    #[test]
    fn divisors_enumeration() {
        assert_eq!(divisors(12), vec![1, 2, 3, 4, 6, 12]);
        assert_eq!(divisors(1), vec![1]);
        assert_eq!(divisors(49), vec![1, 7, 49]);
    }
}
