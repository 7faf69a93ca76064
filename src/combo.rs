//! Linear-combination search over a candidate bucket.
//!
//! For pairs (and optionally triples) of bucket entries, over per-component
//! transforms and shift ranges, the solver either enumerates small integer
//! coefficients with early reject or solves for rational coefficients by
//! exact Gaussian elimination. Every reported combination is re-verified on
//! all aligned positions in exact arithmetic; floating point never touches
//! the accept path.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use crate::config::{ComboConfig, TripleConfig};
use crate::model::{CandidateBucket, CapKind, CombinationMatch, ComponentTransform, SeqId};
use crate::transform::Op;

/// Search outcome with the cap diagnostics the analyzer records.
#[derive(Debug, Default)]
pub struct ComboOutcome {
    pub matches: Vec<CombinationMatch>,
    pub checks: u64,
    pub truncated: bool,
    pub truncated_by: Option<CapKind>,
}

/// One transformed-and-shifted view of a bucket entry.
#[derive(Clone, Copy)]
struct View<'a> {
    entry: usize,
    transform: ComponentTransform,
    series: &'a [BigInt],
    shift: i32,
}

pub struct CombinationSolver<'a> {
    cfg: &'a ComboConfig,
    triple: &'a TripleConfig,
    min_match_length: usize,
}

impl<'a> CombinationSolver<'a> {
    pub fn new(cfg: &'a ComboConfig, triple: &'a TripleConfig, min_match_length: usize) -> Self {
        CombinationSolver {
            cfg,
            triple,
            min_match_length,
        }
    }

    /// Run pair search, then triple search when the bucket is small enough
    /// (or `force_triples` asks for it regardless).
    pub fn solve(
        &self,
        query: &[BigInt],
        bucket: &CandidateBucket,
        force_triples: bool,
    ) -> ComboOutcome {
        let mut outcome = ComboOutcome::default();
        if bucket.is_empty() || query.len() < self.min_match_length {
            return outcome;
        }

        // Transformed series per (entry, transform), computed once.
        let series = self.component_series(bucket);
        let mut seen = HashSet::new();

        self.pair_search(query, bucket, &series, &mut seen, &mut outcome);

        // A cap hit in pair search ends the whole stage; triples never get
        // to spend budget the pair phase already exhausted.
        let triples_allowed = !outcome.truncated
            && self.triple.enabled
            && (force_triples || bucket.len() <= self.triple.bucket_cap);
        if triples_allowed {
            self.triple_search(query, bucket, &series, &mut seen, &mut outcome);
        }

        outcome.matches.sort_by(|a, b| {
            a.complexity
                .cmp(&b.complexity)
                .then_with(|| b.length.cmp(&a.length))
                .then_with(|| a.component_ids.cmp(&b.component_ids))
                .then_with(|| a.shifts.cmp(&b.shifts))
                .then_with(|| {
                    let ta: Vec<_> = a.component_transforms.iter().map(|t| t.as_str()).collect();
                    let tb: Vec<_> = b.component_transforms.iter().map(|t| t.as_str()).collect();
                    ta.cmp(&tb)
                })
        });
        tracing::debug!(
            matches = outcome.matches.len(),
            checks = outcome.checks,
            truncated = outcome.truncated,
            "combination search"
        );
        outcome
    }

    fn component_series(
        &self,
        bucket: &CandidateBucket,
    ) -> Vec<HashMap<ComponentTransform, Vec<BigInt>>> {
        bucket
            .records()
            .map(|record| {
                let mut per = HashMap::new();
                for &t in &self.cfg.component_transforms {
                    let transformed = match t {
                        ComponentTransform::Identity => Some(record.terms.clone()),
                        ComponentTransform::Diff => Op::Diff.apply(&record.terms),
                        ComponentTransform::PartialSum => Op::PartialSum.apply(&record.terms),
                    };
                    if let Some(series) = transformed {
                        per.insert(t, series);
                    }
                }
                per
            })
            .collect()
    }

    fn shift_range(&self) -> impl Iterator<Item = i32> + Clone {
        -(self.cfg.max_shift_back as i32)..=(self.cfg.max_shift as i32)
    }

    fn pair_search(
        &self,
        query: &[BigInt],
        bucket: &CandidateBucket,
        series: &[HashMap<ComponentTransform, Vec<BigInt>>],
        seen: &mut HashSet<String>,
        outcome: &mut ComboOutcome,
    ) {
        let deadline = Instant::now() + Duration::from_millis(self.cfg.max_time_ms);
        let a_coeffs = sorted_coeffs(&self.cfg.integer_coeffs, false);
        let b_coeffs = sorted_coeffs(&self.cfg.integer_coeffs, true);

        for i in 0..bucket.len() {
            for j in i..bucket.len() {
                for (ti, si_series) in ordered_views(i, &series[i]) {
                    for (tj, sj_series) in ordered_views(j, &series[j]) {
                        for si in self.shift_range() {
                            for sj in self.shift_range() {
                                // Self-pairs keep only one of each symmetric
                                // view ordering. Identical views stay in:
                                // a*v + b*v is how a coefficient outside the
                                // configured set (like 7 = 2 + 5) gets built.
                                if i == j && (ti.as_str(), si) > (tj.as_str(), sj) {
                                    continue;
                                }
                                // Caps are honoured between (pair, shift)
                                // iterations; first cap hit wins.
                                if outcome.checks >= self.cfg.max_checks {
                                    set_truncated(outcome, CapKind::Checks);
                                    return;
                                }
                                if Instant::now() >= deadline {
                                    set_truncated(outcome, CapKind::Time);
                                    return;
                                }

                                let views = [
                                    View { entry: i, transform: ti, series: si_series, shift: si },
                                    View { entry: j, transform: tj, series: sj_series, shift: sj },
                                ];
                                let Some((first, k)) = self.alignment(query, &views) else {
                                    continue;
                                };

                                let found_integer = self.integer_mode(
                                    query, bucket, &views, first, k, &a_coeffs, &b_coeffs, seen,
                                    outcome,
                                );
                                if self.cfg.rational && !found_integer {
                                    self.rational_mode(
                                        query, bucket, &views, first, k, seen, outcome,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn triple_search(
        &self,
        query: &[BigInt],
        bucket: &CandidateBucket,
        series: &[HashMap<ComponentTransform, Vec<BigInt>>],
        seen: &mut HashSet<String>,
        outcome: &mut ComboOutcome,
    ) {
        let deadline = Instant::now() + Duration::from_millis(self.triple.max_time_ms);
        let mut checks: u64 = 0;

        for i in 0..bucket.len() {
            for j in i..bucket.len() {
                for k_idx in j..bucket.len() {
                    for (ti, si_series) in ordered_views(i, &series[i]) {
                        for (tj, sj_series) in ordered_views(j, &series[j]) {
                            for (tk, sk_series) in ordered_views(k_idx, &series[k_idx]) {
                                for si in self.shift_range() {
                                    for sj in self.shift_range() {
                                        for sk in self.shift_range() {
                                            if i == j && (ti.as_str(), si) > (tj.as_str(), sj) {
                                                continue;
                                            }
                                            if j == k_idx
                                                && (tj.as_str(), sj) > (tk.as_str(), sk)
                                            {
                                                continue;
                                            }
                                            if checks >= self.triple.max_checks {
                                                set_truncated(outcome, CapKind::Checks);
                                                return;
                                            }
                                            if Instant::now() >= deadline {
                                                set_truncated(outcome, CapKind::Time);
                                                return;
                                            }

                                            let views = [
                                                View {
                                                    entry: i,
                                                    transform: ti,
                                                    series: si_series,
                                                    shift: si,
                                                },
                                                View {
                                                    entry: j,
                                                    transform: tj,
                                                    series: sj_series,
                                                    shift: sj,
                                                },
                                                View {
                                                    entry: k_idx,
                                                    transform: tk,
                                                    series: sk_series,
                                                    shift: sk,
                                                },
                                            ];
                                            let Some((first, k)) = self.alignment(query, &views)
                                            else {
                                                continue;
                                            };
                                            checks += 1;
                                            outcome.checks += 1;
                                            self.rational_mode(
                                                query, bucket, &views, first, k, seen, outcome,
                                            );
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Largest aligned window: query position n is covered when every
    /// component has an in-range index n + shift. A back shift pushes the
    /// window start past the query head; the head terms then stay
    /// unverified and the match records where coverage begins.
    fn alignment(&self, query: &[BigInt], views: &[View]) -> Option<(usize, usize)> {
        let mut first = 0usize;
        let mut end = query.len();
        for v in views {
            if v.shift < 0 {
                first = first.max((-v.shift) as usize);
            }
            let len = v.series.len() as i64 - v.shift as i64;
            if len <= 0 {
                return None;
            }
            end = end.min(len as usize);
        }
        if end <= first {
            return None;
        }
        let k = end - first;
        (k >= self.min_match_length).then_some((first, k))
    }

    /// Enumerate integer coefficients with early reject. Returns whether a
    /// solution was accepted for this alignment.
    #[allow(clippy::too_many_arguments)]
    fn integer_mode(
        &self,
        query: &[BigInt],
        bucket: &CandidateBucket,
        views: &[View; 2],
        first: usize,
        k: usize,
        a_coeffs: &[i64],
        b_coeffs: &[i64],
        seen: &mut HashSet<String>,
        outcome: &mut ComboOutcome,
    ) -> bool {
        for &a in a_coeffs {
            for &b in b_coeffs {
                if outcome.checks >= self.cfg.max_checks {
                    return false;
                }
                outcome.checks += 1;
                let big_a = BigInt::from(a);
                let big_b = BigInt::from(b);
                let ok = (first..first + k).all(|n| {
                    let vi = &views[0].series[(n as i64 + views[0].shift as i64) as usize];
                    let vj = &views[1].series[(n as i64 + views[1].shift as i64) as usize];
                    &big_a * vi + &big_b * vj == query[n]
                });
                if ok {
                    let coeffs = vec![
                        BigRational::from_integer(big_a),
                        BigRational::from_integer(big_b),
                    ];
                    self.accept(bucket, views, first, k, coeffs, seen, outcome);
                    return true;
                }
            }
        }
        false
    }

    /// Solve for exact rational coefficients and verify on every aligned
    /// position.
    fn rational_mode(
        &self,
        query: &[BigInt],
        bucket: &CandidateBucket,
        views: &[View],
        first: usize,
        k: usize,
        seen: &mut HashSet<String>,
        outcome: &mut ComboOutcome,
    ) {
        outcome.checks += 1;
        let m = views.len();
        let columns: Vec<Vec<BigRational>> = views
            .iter()
            .map(|v| {
                (first..first + k)
                    .map(|n| {
                        BigRational::from_integer(
                            v.series[(n as i64 + v.shift as i64) as usize].clone(),
                        )
                    })
                    .collect()
            })
            .collect();
        let target: Vec<BigRational> = (first..first + k)
            .map(|n| BigRational::from_integer(query[n].clone()))
            .collect();

        let Some(solution) = solve_exact(&columns, &target) else {
            return;
        };

        // Coefficient size caps, and at least one component must contribute.
        if solution.iter().all(|c| c.is_zero()) {
            return;
        }
        let max_denom = BigInt::from(self.cfg.coeff_denom_max);
        let max_num = BigInt::from(self.cfg.coeff_num_max);
        for c in &solution {
            if c.denom().abs() > max_denom || c.numer().abs() > max_num {
                return;
            }
        }

        // Full verification: the elimination only used m rows.
        let ok = (0..k).all(|n| {
            let lhs: BigRational = (0..m).map(|c| &solution[c] * &columns[c][n]).sum();
            lhs == target[n]
        });
        if ok {
            self.accept(bucket, views, first, k, solution, seen, outcome);
        }
    }

    fn accept(
        &self,
        bucket: &CandidateBucket,
        views: &[View],
        first: usize,
        k: usize,
        coefficients: Vec<BigRational>,
        seen: &mut HashSet<String>,
        outcome: &mut ComboOutcome,
    ) {
        let component_ids: Vec<SeqId> = views.iter().map(|v| bucket.get(v.entry).id).collect();
        let shifts: Vec<i32> = views.iter().map(|v| v.shift).collect();
        let transforms: Vec<ComponentTransform> = views.iter().map(|v| v.transform).collect();

        let key = format!(
            "{:?}|{:?}|{:?}|{:?}",
            component_ids,
            shifts,
            transforms,
            coefficients
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
        );
        if !seen.insert(key) {
            return;
        }

        let complexity = combination_complexity(&coefficients, &shifts, &transforms);
        outcome.matches.push(CombinationMatch {
            component_ids,
            coefficients,
            shifts,
            component_transforms: transforms,
            first_index: first,
            length: k,
            complexity,
            score: k as f64 / (1.0 + complexity as f64),
        });
    }
}

/// `m + sum |coeff| + sum |shift| + sum transform weights`, where a rational
/// coefficient p/q contributes |p| + q - 1 so integers keep their plain
/// absolute value.
pub fn combination_complexity(
    coefficients: &[BigRational],
    shifts: &[i32],
    transforms: &[ComponentTransform],
) -> u32 {
    use num_traits::ToPrimitive;
    let m = coefficients.len() as u32;
    let coeff_sum: u32 = coefficients
        .iter()
        .map(|c| {
            let num = c.numer().abs().to_u32().unwrap_or(u32::MAX / 4);
            let den = c.denom().abs().to_u32().unwrap_or(u32::MAX / 4);
            num.saturating_add(den).saturating_sub(1)
        })
        .sum();
    let shift_sum: u32 = shifts.iter().map(|s| s.unsigned_abs()).sum();
    let transform_sum: u32 = transforms.iter().map(|t| t.weight()).sum();
    m + coeff_sum + shift_sum + transform_sum
}

fn set_truncated(outcome: &mut ComboOutcome, cap: CapKind) {
    outcome.truncated = true;
    if outcome.truncated_by.is_none() {
        outcome.truncated_by = Some(cap);
    }
}

/// Coefficient order for the enumeration: simplest first, positive before
/// negative at equal magnitude.
fn sorted_coeffs(coeffs: &[i64], allow_zero: bool) -> Vec<i64> {
    let mut out: Vec<i64> = coeffs
        .iter()
        .copied()
        .filter(|&c| allow_zero || c != 0)
        .collect();
    out.sort_by_key(|&c| (c.abs(), c < 0));
    out.dedup();
    out
}

/// Deterministic view order per bucket entry: transforms in configured
/// order (the map is rebuilt from it), keyed by name for stability.
fn ordered_views(
    _entry: usize,
    per: &HashMap<ComponentTransform, Vec<BigInt>>,
) -> Vec<(ComponentTransform, &[BigInt])> {
    let mut views: Vec<(ComponentTransform, &[BigInt])> = per
        .iter()
        .map(|(&t, series)| (t, series.as_slice()))
        .collect();
    views.sort_by_key(|(t, _)| t.as_str());
    views
}

/// Exact Gaussian elimination: find the first `m` linearly independent rows,
/// pivoting by largest absolute numerator, and back-substitute.
///
/// Returns `None` when the columns are dependent over the supplied rows or
/// the system is inconsistent (which doubles as an early reject).
fn solve_exact(columns: &[Vec<BigRational>], target: &[BigRational]) -> Option<Vec<BigRational>> {
    let m = columns.len();
    let rows = target.len();
    if rows < m {
        return None;
    }

    let mut reduced: Vec<Vec<BigRational>> = Vec::with_capacity(m);
    let mut pivot_cols: Vec<usize> = Vec::with_capacity(m);

    for n in 0..rows {
        let mut row: Vec<BigRational> = (0..m)
            .map(|c| columns[c][n].clone())
            .chain(std::iter::once(target[n].clone()))
            .collect();

        for (r, &pc) in reduced.iter().zip(&pivot_cols) {
            if !row[pc].is_zero() {
                let factor = &row[pc] / &r[pc];
                for c in 0..=m {
                    let delta = &factor * &r[c];
                    row[c] -= delta;
                }
            }
        }

        // Pivot on the largest absolute numerator to keep intermediates small.
        let pivot = (0..m)
            .filter(|c| !pivot_cols.contains(c) && !row[*c].is_zero())
            .max_by(|&c1, &c2| row[c1].numer().abs().cmp(&row[c2].numer().abs()));
        match pivot {
            Some(pc) => {
                reduced.push(row);
                pivot_cols.push(pc);
                if reduced.len() == m {
                    break;
                }
            }
            None => {
                // All coefficients eliminated; a nonzero residual means the
                // system has no solution at all.
                if !row[m].is_zero() {
                    return None;
                }
            }
        }
    }

    if reduced.len() < m {
        return None;
    }

    // Rows are triangular with respect to their own pivot order; solve in
    // reverse.
    let mut solution = vec![BigRational::zero(); m];
    for i in (0..m).rev() {
        let row = &reduced[i];
        let pc = pivot_cols[i];
        let mut rhs = row[m].clone();
        for c in 0..m {
            if c != pc && !row[c].is_zero() {
                rhs -= &row[c] * &solution[c];
            }
        }
        solution[pc] = rhs / &row[pc];
    }
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComboConfig, TripleConfig};
    use crate::invariants::derive_invariants;
    use crate::model::SequenceRecord;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn rec(id: u32, vals: &[i64]) -> SequenceRecord {
        let terms = ints(vals);
        SequenceRecord {
            id: SeqId(id),
            invariants: derive_invariants(&terms),
            terms,
            name: String::new(),
            keywords: String::new(),
        }
    }

    fn bucket(records: Vec<SequenceRecord>) -> CandidateBucket {
        let mut b = CandidateBucket::new();
        for r in records {
            b.push(r, 1.0);
        }
        b
    }

    fn rational(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn solve_exact_two_by_two() {
        // 2x + 3y = 8, x + y = 3 -> x = 1, y = 2 (rows extended for overlap)
        let columns = vec![
            vec![rational(2, 1), rational(1, 1), rational(3, 1)],
            vec![rational(3, 1), rational(1, 1), rational(4, 1)],
        ];
        let target = vec![rational(8, 1), rational(3, 1), rational(11, 1)];
        let solution = solve_exact(&columns, &target).unwrap();
        assert_eq!(solution, vec![rational(1, 1), rational(2, 1)]);
    }

    #[test]
    fn solve_exact_rational_solution() {
        // x/2 picked up exactly: 2x = 1 over two consistent rows.
        let columns = vec![vec![rational(2, 1), rational(4, 1)]];
        let target = vec![rational(1, 1), rational(2, 1)];
        let solution = solve_exact(&columns, &target).unwrap();
        assert_eq!(solution, vec![rational(1, 2)]);
    }

    #[test]
    fn solve_exact_rejects_dependent_columns() {
        let columns = vec![
            vec![rational(1, 1), rational(2, 1)],
            vec![rational(2, 1), rational(4, 1)],
        ];
        let target = vec![rational(3, 1), rational(6, 1)];
        assert!(solve_exact(&columns, &target).is_none());
    }

    #[test]
    fn solve_exact_rejects_inconsistent_system() {
        let columns = vec![
            vec![rational(1, 1), rational(1, 1), rational(1, 1)],
            vec![rational(1, 1), rational(1, 1), rational(2, 1)],
        ];
        // Rows 0 and 1 are identical in coefficients but differ in target.
        let target = vec![rational(1, 1), rational(2, 1), rational(3, 1)];
        assert!(solve_exact(&columns, &target).is_none());
    }

    fn solver_cfg() -> (ComboConfig, TripleConfig) {
        (ComboConfig::default(), TripleConfig::default())
    }

    #[test]
    fn finds_lucas_from_fibonacci_self_pair() {
        let query = ints(&[1, 3, 4, 7, 11, 18]);
        let fib = rec(45, &[0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]);
        let (cfg, triple) = solver_cfg();
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(vec![fib]), false);
        assert!(!outcome.matches.is_empty());
        let best = &outcome.matches[0];
        assert_eq!(best.component_ids, vec![SeqId(45), SeqId(45)]);
        assert!(best.length >= 6);
        // Exact verification across the reported window.
        assert_eq!(best.first_index, 0);
    }

    #[test]
    fn finds_scalar_multiple() {
        let query = ints(&[7, 14, 21, 28, 35]);
        let naturals = rec(27, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let (mut cfg, triple) = solver_cfg();
        cfg.integer_coeffs = (1..=5).collect();
        cfg.rational = false;
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(vec![naturals.clone(), rec(7, &[1, 1, 1, 1, 1, 1])]), false);
        // 7 is outside the coefficient set, but 5*A000027 + 2*A000007-ish
        // forms could exist; what must hold is that any reported match
        // verifies exactly. With the all-ones helper, 5*n + 2*1 fails; the
        // solver instead needs 7*n which is out of range, so check the
        // rational path separately below.
        for m in &outcome.matches {
            assert!(m.length >= 3);
        }

        let (cfg2, triple2) = solver_cfg();
        let solver2 = CombinationSolver::new(&cfg2, &triple2, 3);
        let outcome2 = solver2.solve(&query, &bucket(vec![naturals, rec(7, &[1, 1, 1, 1, 1, 1])]), false);
        let found = outcome2.matches.iter().any(|m| {
            m.coefficients
                .iter()
                .any(|c| c == &BigRational::from_integer(BigInt::from(7)))
        });
        assert!(found, "rational mode recovers the out-of-range coefficient");
    }

    #[test]
    fn rational_coefficients_verified_exactly() {
        // q(n) = (1/2) * (2n) + 0 -> use halves of even numbers.
        let query = ints(&[1, 2, 3, 4, 5]);
        let evens = rec(5843, &[2, 4, 6, 8, 10, 12]);
        let ones = rec(12, &[1, 1, 1, 1, 1, 1]);
        let (mut cfg, triple) = solver_cfg();
        cfg.integer_coeffs = vec![];
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(vec![evens, ones]), false);
        let half = rational(1, 2);
        assert!(outcome
            .matches
            .iter()
            .any(|m| m.coefficients.contains(&half)));
    }

    #[test]
    fn denominator_cap_rejects_wild_rationals() {
        let query = ints(&[1, 2, 3, 4, 5]);
        let scaled = rec(1, &[13, 26, 39, 52, 65, 78]);
        let ones = rec(2, &[1, 1, 1, 1, 1, 1]);
        let (mut cfg, triple) = solver_cfg();
        cfg.integer_coeffs = vec![];
        cfg.coeff_denom_max = 12;
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        // The exact solution needs 1/13, past the denominator cap.
        let outcome = solver.solve(&query, &bucket(vec![scaled, ones]), false);
        assert!(outcome
            .matches
            .iter()
            .all(|m| m.coefficients.iter().all(|c| c.denom() <= &BigInt::from(12))));
    }

    #[test]
    fn check_cap_truncates() {
        let query = ints(&[1, 4, 9, 16, 25, 36]);
        let records: Vec<_> = (1..=8).map(|i| rec(i, &[1, 2, 3, 4, 5, 6, 7, 8])).collect();
        let (mut cfg, triple) = solver_cfg();
        cfg.max_checks = 50;
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(records), false);
        assert!(outcome.truncated);
        assert_eq!(outcome.truncated_by, Some(CapKind::Checks));
    }

    #[test]
    fn triple_search_solves_three_components() {
        // q(n) = n^2 + n + 1 over the first rows.
        let query = ints(&[1, 3, 7, 13, 21, 31]);
        let squares = rec(290, &[0, 1, 4, 9, 16, 25, 36]);
        let naturals = rec(27, &[0, 1, 2, 3, 4, 5, 6]);
        let ones = rec(12, &[1, 1, 1, 1, 1, 1, 1]);
        let (mut cfg, triple) = solver_cfg();
        cfg.integer_coeffs = vec![];
        cfg.rational = false;
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(vec![squares, naturals, ones]), false);
        let hit = outcome
            .matches
            .iter()
            .find(|m| m.component_ids.len() == 3)
            .expect("triple combination");
        assert!(hit.length >= 3);
    }

    #[test]
    fn back_shift_trims_the_window_start() {
        // q(n) = S(n - 1) for a single component via a (1, 0) pair where the
        // second coefficient is zero.
        let query = ints(&[99, 1, 2, 3, 4, 5]);
        let naturals = rec(27, &[1, 2, 3, 4, 5, 6, 7]);
        let ones = rec(12, &[1, 1, 1, 1, 1, 1, 1]);
        let (cfg, triple) = solver_cfg();
        let solver = CombinationSolver::new(&cfg, &triple, 3);
        let outcome = solver.solve(&query, &bucket(vec![naturals, ones]), false);
        let hit = outcome
            .matches
            .iter()
            .find(|m| m.first_index == 1)
            .expect("window starting past the unmatched head");
        assert!(hit.length >= 5);
        assert!(hit.shifts.iter().any(|&s| s < 0));
    }

    #[test]
    fn complexity_and_score_ordering() {
        let coeffs = vec![rational(1, 1), rational(1, 1)];
        let simple = combination_complexity(&coeffs, &[0, 1], &[
            ComponentTransform::Identity,
            ComponentTransform::Identity,
        ]);
        assert_eq!(simple, 2 + 2 + 1);
        let with_transform = combination_complexity(&coeffs, &[0, 1], &[
            ComponentTransform::Diff,
            ComponentTransform::Identity,
        ]);
        assert_eq!(with_transform, simple + 1);
        // Rational coefficient 1/2 contributes |1| + 2 - 1 = 2.
        let rat = combination_complexity(&[rational(1, 2)], &[0], &[ComponentTransform::Identity]);
        assert_eq!(rat, 1 + 2);
    }

    #[test]
    fn sorted_coeffs_simple_first() {
        assert_eq!(
            sorted_coeffs(&[-5, -4, -3, -2, -1, 0, 1, 2, 3, 4, 5], false),
            vec![1, -1, 2, -2, 3, -3, 4, -4, 5, -5]
        );
        assert_eq!(sorted_coeffs(&[0, 1, -1], true), vec![0, 1, -1]);
    }
}
