//! Similarity ranking: best-fit affine error and correlation against the
//! query, feeding the combination solver's candidate bucket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use num_bigint::BigInt;
use rayon::prelude::*;

use crate::invariants::big_to_f64;
use crate::model::{SequenceRecord, SimilarityHit};

/// Absolute ceiling on `top_k`, whatever the configuration asks for.
pub const TOP_K_HARD_CAP: usize = 200;

pub struct SimilarityRanker {
    pub min_corr: f64,
    pub max_nmse: f64,
    pub top_k: usize,
}

/// Ranked hits plus a flag when the deadline cut scoring short.
pub struct Ranking {
    pub hits: Vec<SimilarityHit>,
    pub truncated: bool,
}

impl SimilarityRanker {
    /// Score every candidate and keep the top-K by `(-|rho|, nmse, id)`.
    ///
    /// Scoring is a pure per-record map, so it fans out over rayon; the
    /// deadline is observed per record and the final ordering is a
    /// deterministic sort, so parallelism never changes the result set for
    /// runs that finish in time.
    pub fn rank(
        &self,
        query_terms: &[BigInt],
        min_overlap: usize,
        candidates: &[SequenceRecord],
        deadline: Instant,
    ) -> Ranking {
        let query: Vec<f64> = query_terms.iter().map(big_to_f64).collect();
        let truncated = AtomicBool::new(false);

        let mut hits: Vec<SimilarityHit> = candidates
            .par_iter()
            .filter_map(|record| {
                if truncated.load(Ordering::Relaxed) {
                    return None;
                }
                if Instant::now() >= deadline {
                    truncated.store(true, Ordering::Relaxed);
                    return None;
                }
                score_candidate(&query, record, min_overlap, self.min_corr, self.max_nmse)
            })
            .collect();

        hits.sort_by(|a, b| {
            b.correlation
                .abs()
                .total_cmp(&a.correlation.abs())
                .then_with(|| a.nmse.total_cmp(&b.nmse))
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(self.top_k.min(TOP_K_HARD_CAP));

        Ranking {
            hits,
            truncated: truncated.into_inner(),
        }
    }
}

/// Overlap the record against the query on the first
/// `k = min(len(q), len(r))` positions and gate on correlation and
/// normalised affine-fit error.
fn score_candidate(
    query: &[f64],
    record: &SequenceRecord,
    min_overlap: usize,
    min_corr: f64,
    max_nmse: f64,
) -> Option<SimilarityHit> {
    let k = query.len().min(record.terms.len());
    if k < min_overlap || k < 2 {
        return None;
    }
    let q = &query[..k];
    let r: Vec<f64> = record.terms[..k].iter().map(big_to_f64).collect();

    let n = k as f64;
    let mean_q = q.iter().sum::<f64>() / n;
    let mean_r = r.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_q = 0.0;
    let mut var_r = 0.0;
    for (&qi, &ri) in q.iter().zip(&r) {
        cov += (qi - mean_q) * (ri - mean_r);
        var_q += (qi - mean_q) * (qi - mean_q);
        var_r += (ri - mean_r) * (ri - mean_r);
    }
    cov /= n;
    var_q /= n;
    var_r /= n;

    // A flat series on either side has no defined correlation.
    if var_q <= 0.0 || var_r <= 0.0 {
        return None;
    }

    let rho = cov / (var_q.sqrt() * var_r.sqrt());
    if !rho.is_finite() || rho.abs() < min_corr {
        return None;
    }

    let alpha = cov / var_r;
    let beta = mean_q - alpha * mean_r;
    let mse = q
        .iter()
        .zip(&r)
        .map(|(&qi, &ri)| {
            let e = alpha * ri + beta - qi;
            e * e
        })
        .sum::<f64>()
        / n;
    let peak = q.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    let nmse = mse / (1.0 + peak * peak);
    if !nmse.is_finite() || nmse > max_nmse {
        return None;
    }

    Some(SimilarityHit {
        id: record.id,
        correlation: rho,
        nmse,
        alpha,
        beta,
        overlap: k,
    })
}
