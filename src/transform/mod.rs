//! Superseeker-style transform search.
//!
//! Enumerates bounded-depth chains of sequence operators over a static
//! table, applies them to the query, and dedupes the results so the matcher
//! only ever sees one (lowest-complexity) chain per distinct transformed
//! sequence.

mod ops;

pub use ops::Op;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use num_bigint::BigInt;
use num_traits::Zero;

use crate::config::{Profile, TransformConfig};
use crate::invariants::variance;
use crate::model::CapKind;

/// An enabled operator instance with its complexity weight.
#[derive(Debug, Clone)]
pub struct OpEntry {
    pub op: Op,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Basic,
    OptIn,
    Exotic,
}

impl Tier {
    fn enabled(self, profile: Profile) -> bool {
        match self {
            Tier::Basic => true,
            Tier::OptIn | Tier::Exotic => profile == Profile::Max,
        }
    }
}

/// Build the operator table for a configuration and profile.
///
/// Parameterised operators are instantiated once per configured parameter
/// value; the table order is fixed, which keeps chain enumeration (and
/// therefore dedup tie-breaking) deterministic.
pub fn op_table(cfg: &TransformConfig, profile: Profile) -> Vec<OpEntry> {
    let mut out = Vec::new();
    let mut push = |op: Op, tier: Tier| {
        let enabled = match &cfg.operator_set {
            Some(set) => set.iter().any(|n| n == op.name()),
            None => tier.enabled(profile),
        };
        if enabled {
            let weight = match tier {
                Tier::Basic => 1,
                Tier::OptIn => 2,
                Tier::Exotic => cfg.classical_weight,
            };
            out.push(OpEntry { op, weight });
        }
    };

    for &a in &cfg.scale_values {
        if a != 0 && a != 1 {
            push(Op::Scale(a), Tier::Basic);
        }
    }
    // Affine includes the pure translations (alpha = 1) that scale skips.
    for a in std::iter::once(1).chain(cfg.scale_values.iter().copied()) {
        for &b in &cfg.affine_offsets {
            if a != 0 && b != 0 {
                push(Op::Affine(a, b), Tier::Basic);
            }
        }
    }
    for k in 1..=cfg.shift_max {
        push(Op::ShiftForward(k), Tier::Basic);
        push(Op::ShiftBack(k), Tier::Basic);
    }
    push(Op::Diff, Tier::Basic);
    push(Op::Diff2, Tier::Basic);
    push(Op::PartialSum, Tier::Basic);
    push(Op::Abs, Tier::Basic);
    push(Op::GcdNorm, Tier::Basic);
    for &k in &cfg.decimate_values {
        if k >= 2 {
            push(Op::Decimate(k), Tier::Basic);
        }
    }
    push(Op::Reverse, Tier::Basic);
    push(Op::EvenIndexed, Tier::Basic);
    push(Op::OddIndexed, Tier::Basic);
    for &k in &cfg.movsum_windows {
        if k >= 2 {
            push(Op::MovSum(k), Tier::Basic);
        }
    }
    push(Op::CumProd, Tier::Basic);
    push(Op::Popcount, Tier::Basic);
    for &b in &cfg.digit_sum_bases {
        push(Op::DigitSum(b), Tier::Basic);
    }
    push(Op::Rle, Tier::Basic);
    push(Op::RleDecode, Tier::Basic);

    for &m in &cfg.mod_values {
        push(Op::Mod(m), Tier::OptIn);
    }
    push(Op::XorIndex, Tier::OptIn);
    for &b in &cfg.concat_bases {
        push(Op::ConcatIndex(b), Tier::OptIn);
    }
    for &b in &cfg.log_bases {
        push(Op::Log(b), Tier::OptIn);
    }
    for &b in &cfg.exp_bases {
        push(Op::Exp(b), Tier::OptIn);
    }

    push(Op::Binomial, Tier::Exotic);
    push(Op::Euler, Tier::Exotic);
    push(Op::Mobius, Tier::Exotic);

    out
}

/// A transformed query ready for the matcher, tagged with its chain.
#[derive(Debug, Clone)]
pub struct TransformedQuery {
    pub terms: Vec<BigInt>,
    pub chain: Vec<Op>,
    pub complexity: u32,
}

/// Outcome of chain enumeration, including truncation diagnostics.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub queries: Vec<TransformedQuery>,
    pub chains_tried: usize,
    pub truncated: bool,
    pub truncated_by: Option<CapKind>,
}

pub struct TransformEngine {
    table: Vec<OpEntry>,
    max_depth: usize,
    min_variance: f64,
    max_chains: usize,
    max_time: Duration,
}

impl TransformEngine {
    pub fn new(cfg: &TransformConfig, profile: Profile) -> Self {
        TransformEngine {
            table: op_table(cfg, profile),
            max_depth: cfg.max_depth_for(profile),
            min_variance: cfg.min_variance,
            max_chains: cfg.max_chains,
            max_time: Duration::from_millis(cfg.max_time_ms_for(profile)),
        }
    }

    pub fn op_count(&self) -> usize {
        self.table.len()
    }

    /// Total complexity of a chain: operator weights, plus one for the
    /// composition overhead of multi-operator chains.
    pub fn chain_complexity(weights: u32, chain_len: usize) -> u32 {
        weights + if chain_len > 1 { 1 } else { 0 }
    }

    /// Depth-first enumeration of operator chains applied to `terms`.
    ///
    /// Results are deduplicated on the transformed sequence, keeping the
    /// lowest-complexity chain, and ordered by (complexity, chain
    /// rendering) so downstream consumers see a reproducible stream.
    pub fn enumerate(&self, terms: &[BigInt], min_len: usize) -> Enumeration {
        let deadline = Instant::now() + self.max_time;
        let query_all_zero = terms.iter().all(|t| t.is_zero());
        let query_near_flat = variance(terms) < self.min_variance;

        let mut result = Enumeration::default();
        // Transformed terms -> index into `found`, for lowest-complexity dedup.
        let mut seen: HashMap<Vec<BigInt>, usize> = HashMap::new();
        let mut found: Vec<TransformedQuery> = Vec::new();

        // Explicit DFS stack of (terms, chain, weight sum).
        let mut stack: Vec<(Vec<BigInt>, Vec<Op>, u32)> =
            vec![(terms.to_vec(), Vec::new(), 0)];

        'dfs: while let Some((parent, chain, weights)) = stack.pop() {
            for entry in &self.table {
                if result.chains_tried >= self.max_chains {
                    result.truncated = true;
                    result.truncated_by = Some(CapKind::Chains);
                    break 'dfs;
                }
                // Deadline check between chains is the cancellation point.
                if Instant::now() >= deadline {
                    result.truncated = true;
                    result.truncated_by = Some(CapKind::Time);
                    break 'dfs;
                }
                result.chains_tried += 1;

                let Some(out) = entry.op.apply(&parent) else {
                    continue;
                };
                if out.is_empty() {
                    continue;
                }
                let all_zero = out.iter().all(|t| t.is_zero());
                if all_zero && !query_all_zero {
                    // Degenerate, and no operator will resurrect it.
                    continue;
                }

                let mut next_chain = chain.clone();
                next_chain.push(entry.op.clone());
                let next_weights = weights + entry.weight;

                let keep = out.len() >= min_len
                    && out != terms
                    && (query_near_flat || variance(&out) >= self.min_variance);
                if keep {
                    let complexity = Self::chain_complexity(next_weights, next_chain.len());
                    match seen.get(&out) {
                        Some(&idx) if found[idx].complexity <= complexity => {}
                        Some(&idx) => {
                            found[idx] = TransformedQuery {
                                terms: out.clone(),
                                chain: next_chain.clone(),
                                complexity,
                            };
                        }
                        None => {
                            seen.insert(out.clone(), found.len());
                            found.push(TransformedQuery {
                                terms: out.clone(),
                                chain: next_chain.clone(),
                                complexity,
                            });
                        }
                    }
                }

                if next_chain.len() < self.max_depth {
                    stack.push((out, next_chain, next_weights));
                }
            }
        }

        found.sort_by(|a, b| {
            a.complexity
                .cmp(&b.complexity)
                .then_with(|| render_chain(&a.chain).cmp(&render_chain(&b.chain)))
        });
        result.queries = found;
        tracing::debug!(
            chains = result.chains_tried,
            distinct = result.queries.len(),
            truncated = result.truncated,
            "transform enumeration"
        );
        result
    }
}

/// Render a chain as `diff . partial_sum` for display and tie-breaking.
pub fn render_chain(chain: &[Op]) -> String {
    chain
        .iter()
        .map(|op| op.to_string())
        .collect::<Vec<_>>()
        .join(" . ")
}

/// Apply a whole chain; the empty chain is the identity.
pub fn apply_chain(chain: &[Op], terms: &[BigInt]) -> Option<Vec<BigInt>> {
    let mut current = terms.to_vec();
    for op in chain {
        current = op.apply(&current)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn engine(profile: Profile) -> TransformEngine {
        TransformEngine::new(&TransformConfig::default(), profile)
    }

    #[test]
    fn identity_chain_is_identity() {
        let q = ints(&[3, 1, 4, 1, 5]);
        assert_eq!(apply_chain(&[], &q).unwrap(), q);
    }

    #[test]
    fn diff_after_partial_sum_shifts_by_one() {
        let q = ints(&[3, 1, 4, 1, 5]);
        let out = apply_chain(&[Op::PartialSum, Op::Diff], &q).unwrap();
        assert_eq!(out, q[1..].to_vec());
    }

    #[test]
    fn partial_sum_after_diff_drops_leading_constant() {
        let q = ints(&[3, 1, 4, 1, 5]);
        let out = apply_chain(&[Op::Diff, Op::PartialSum], &q).unwrap();
        let expect: Vec<BigInt> = q[1..].iter().map(|t| t - &q[0]).collect();
        assert_eq!(out, expect);
    }

    #[test]
    fn reverse_twice_is_identity() {
        let q = ints(&[1, 2, 3]);
        assert_eq!(apply_chain(&[Op::Reverse, Op::Reverse], &q).unwrap(), q);
    }

    #[test]
    fn enumeration_contains_diff_of_triangular() {
        let q = ints(&[1, 3, 6, 10, 15, 21]);
        let result = engine(Profile::Deep).enumerate(&q, 3);
        let naturals = ints(&[2, 3, 4, 5, 6]);
        let hit = result
            .queries
            .iter()
            .find(|t| t.terms == naturals)
            .expect("diff of triangular numbers");
        assert_eq!(hit.chain, vec![Op::Diff]);
        assert_eq!(hit.complexity, 1);
    }

    #[test]
    fn dedup_keeps_lowest_complexity_chain() {
        let q = ints(&[2, 5, 10, 17, 26, 37]);
        let result = engine(Profile::Deep).enumerate(&q, 3);
        // diff2 and diff.diff produce the same output; the single-operator
        // chain has complexity 1 vs 3 and must win.
        let constant = ints(&[2, 2, 2, 2]);
        let hit = result
            .queries
            .iter()
            .find(|t| t.terms == constant)
            .expect("second difference");
        assert_eq!(hit.complexity, 1);
        assert_eq!(hit.chain.len(), 1);
    }

    #[test]
    fn all_zero_outputs_are_discarded() {
        let q = ints(&[7, 7, 7, 7, 7]);
        let result = engine(Profile::Deep).enumerate(&q, 3);
        assert!(result.queries.iter().all(|t| !t.terms.iter().all(|x| x.is_zero())));
    }

    #[test]
    fn near_flat_outputs_are_dropped_for_varied_queries() {
        let q = ints(&[2, 5, 10, 17, 26, 37]);
        let mut cfg = TransformConfig::default();
        cfg.min_variance = 0.5;
        let result = TransformEngine::new(&cfg, Profile::Deep).enumerate(&q, 3);
        // diff2 output is constant 2 with zero variance: filtered.
        assert!(result.queries.iter().all(|t| variance(&t.terms) >= 0.5));
    }

    #[test]
    fn chain_cap_truncates_with_diagnostic() {
        let q = ints(&[1, 2, 4, 8, 16, 32]);
        let mut cfg = TransformConfig::default();
        cfg.max_chains = 10;
        let result = TransformEngine::new(&cfg, Profile::Deep).enumerate(&q, 3);
        assert!(result.truncated);
        assert_eq!(result.truncated_by, Some(CapKind::Chains));
        assert!(result.chains_tried <= 10);
    }

    #[test]
    fn fast_profile_enumerates_single_ops_only() {
        let q = ints(&[1, 3, 6, 10, 15, 21]);
        let result = engine(Profile::Fast).enumerate(&q, 3);
        assert!(result.queries.iter().all(|t| t.chain.len() == 1));
    }

    #[test]
    fn operator_set_overrides_profile() {
        let mut cfg = TransformConfig::default();
        cfg.operator_set = Some(vec!["diff".into(), "binomial".into()]);
        let engine = TransformEngine::new(&cfg, Profile::Fast);
        assert_eq!(engine.op_count(), 2);
    }

    #[test]
    fn enumeration_is_deterministic() {
        let q = ints(&[1, 2, 3, 5, 8, 13]);
        let a = engine(Profile::Deep).enumerate(&q, 3);
        let b = engine(Profile::Deep).enumerate(&q, 3);
        let chains_a: Vec<String> = a.queries.iter().map(|t| render_chain(&t.chain)).collect();
        let chains_b: Vec<String> = b.queries.iter().map(|t| render_chain(&t.chain)).collect();
        assert_eq!(chains_a, chains_b);
    }
}

#[cfg(test)]
mod law_tests {
    use super::*;
    use proptest::prelude::*;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    proptest! {
        #[test]
        fn diff_partial_sum_is_tail(vals in proptest::collection::vec(-1000i64..1000, 2..20)) {
            let q = ints(&vals);
            let out = apply_chain(&[Op::PartialSum, Op::Diff], &q).unwrap();
            prop_assert_eq!(out, q[1..].to_vec());
        }

        #[test]
        fn partial_sum_diff_is_offset(vals in proptest::collection::vec(-1000i64..1000, 2..20)) {
            let q = ints(&vals);
            let out = apply_chain(&[Op::Diff, Op::PartialSum], &q).unwrap();
            let expect: Vec<BigInt> = q[1..].iter().map(|t| t - &q[0]).collect();
            prop_assert_eq!(out, expect);
        }

        #[test]
        fn reverse_involutive(vals in proptest::collection::vec(-1000i64..1000, 1..20)) {
            let q = ints(&vals);
            prop_assert_eq!(apply_chain(&[Op::Reverse, Op::Reverse], &q).unwrap(), q);
        }

        #[test]
        fn decimate_one_is_identity(vals in proptest::collection::vec(-1000i64..1000, 1..20)) {
            let q = ints(&vals);
            prop_assert_eq!(Op::Decimate(1).apply(&q).unwrap(), q);
        }

        #[test]
        fn rle_roundtrips(vals in proptest::collection::vec(-3i64..3, 1..30)) {
            let q = ints(&vals);
            let encoded = Op::Rle.apply(&q).unwrap();
            prop_assert_eq!(Op::RleDecode.apply(&encoded).unwrap(), q);
        }
    }
}
