//! Pipeline orchestration: exact, transform, similarity, and combination
//! stages with per-stage budgets and diagnostics.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::Config;
use crate::filter::{exact_filter, relaxed_filter};
use crate::matcher::{prefix_match, subsequence_match};
use crate::model::{
    AnalysisResult, CandidateBucket, CapKind, Match, SeqId, SequenceQuery, SequenceRecord, Stage,
    StageDiagnostics,
};
use crate::combo::CombinationSolver;
use crate::similarity::SimilarityRanker;
use crate::store::{Store, StoreError};
use crate::transform::{render_chain, TransformEngine};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the full matching pipeline against one store.
///
/// Every call allocates its own working state; the store is the only shared
/// resource and is never mutated.
pub struct Analyzer<'a> {
    store: &'a Store,
    config: &'a Config,
    /// Attach stored-term windows to matches.
    pub snippets: bool,
    /// Run triple search even past the bucket-size gate.
    pub force_triples: bool,
}

impl<'a> Analyzer<'a> {
    pub fn new(store: &'a Store, config: &'a Config) -> Self {
        Analyzer {
            store,
            config,
            snippets: false,
            force_triples: false,
        }
    }

    /// Execute the enabled stages in order: exact prefix, exact
    /// subsequence, transform, similarity, combinations.
    pub fn analyze(&self, query: &SequenceQuery) -> Result<AnalysisResult, AnalyzeError> {
        self.validate(query)?;

        let mut result = AnalysisResult::default();
        // Records already matched, reused for the combination bucket.
        let mut matched_records: Vec<(SequenceRecord, f64)> = Vec::new();
        let mut similar_records: Vec<(SequenceRecord, f64)> = Vec::new();

        if self.config.stages.exact {
            self.exact_prefix_stage(query, &mut result, &mut matched_records)?;
            if query.allow_subsequence {
                self.exact_subsequence_stage(query, &mut result, &mut matched_records)?;
            }
        }

        if self.config.stages.transform {
            self.transform_stage(query, &mut result)?;
        }

        if self.config.stages.similarity {
            self.similarity_stage(query, &mut result, &mut similar_records)?;
        }

        if self.config.stages.combination {
            self.combination_stage(query, &mut result, matched_records, similar_records);
        }

        Ok(result)
    }

    fn validate(&self, query: &SequenceQuery) -> Result<(), AnalyzeError> {
        if query.is_empty() {
            return Err(AnalyzeError::InvalidQuery("empty query".into()));
        }
        if query.len() < self.config.min_match_length {
            return Err(AnalyzeError::InvalidQuery(format!(
                "{} terms, need at least {}",
                query.len(),
                self.config.min_match_length
            )));
        }
        if query.wildcards.len() > self.config.max_wildcards {
            return Err(AnalyzeError::InvalidQuery(format!(
                "{} wildcards, at most {} allowed",
                query.wildcards.len(),
                self.config.max_wildcards
            )));
        }
        Ok(())
    }

    fn exact_prefix_stage(
        &self,
        query: &SequenceQuery,
        result: &mut AnalysisResult,
        matched_records: &mut Vec<(SequenceRecord, f64)>,
    ) -> Result<(), AnalyzeError> {
        let start = Instant::now();
        let mut prefix_query = query.clone();
        prefix_query.allow_subsequence = false;
        let candidates = self.store.scan(&exact_filter(&prefix_query))?;
        let before = candidates.len();

        let mut matches = Vec::new();
        for record in candidates {
            if let Some(mut m) = prefix_match(query, &record) {
                if self.snippets {
                    m.snippet = Some(snippet(&record, m.offset, m.length));
                }
                matched_records.push((record, m.score));
                matches.push(m);
            }
        }
        sort_matches(&mut matches);
        let after = matches.len();
        result.exact.extend(matches);
        result.diagnostics.push(StageDiagnostics {
            stage: Stage::ExactPrefix,
            candidates_before: before,
            candidates_after: after,
            elapsed: start.elapsed(),
            truncated: false,
            truncated_by: None,
        });
        Ok(())
    }

    fn exact_subsequence_stage(
        &self,
        query: &SequenceQuery,
        result: &mut AnalysisResult,
        matched_records: &mut Vec<(SequenceRecord, f64)>,
    ) -> Result<(), AnalyzeError> {
        let start = Instant::now();
        let candidates = self.store.scan(&exact_filter(query))?;
        let before = candidates.len();
        let prefix_ids: HashSet<SeqId> = result.exact.iter().map(|m| m.id).collect();

        let mut matches = Vec::new();
        for record in candidates {
            let found = subsequence_match(query, &record);
            let mut kept_any = false;
            for mut m in found {
                // A prefix hit already covers the offset-0 alignment.
                if m.offset == 0 && prefix_ids.contains(&m.id) {
                    continue;
                }
                if self.snippets {
                    m.snippet = Some(snippet(&record, m.offset, m.length));
                }
                kept_any = true;
                matches.push(m);
            }
            if kept_any {
                let best = matches.last().map(|m| m.score).unwrap_or(0.0);
                matched_records.push((record, best));
            }
        }
        sort_matches(&mut matches);
        let after = matches.len();
        result.exact.extend(matches);
        result.diagnostics.push(StageDiagnostics {
            stage: Stage::ExactSubsequence,
            candidates_before: before,
            candidates_after: after,
            elapsed: start.elapsed(),
            truncated: false,
            truncated_by: None,
        });
        Ok(())
    }

    fn transform_stage(
        &self,
        query: &SequenceQuery,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalyzeError> {
        let start = Instant::now();
        let budget = Duration::from_millis(
            self.config
                .transform
                .max_time_ms_for(self.config.profile),
        );
        let deadline = start + budget;

        let engine = TransformEngine::new(&self.config.transform, self.config.profile);
        let enumeration = engine.enumerate(&query.terms, self.config.min_match_length);
        let mut truncated = enumeration.truncated;
        let mut truncated_by = enumeration.truncated_by;

        let mut candidates_seen = 0usize;
        let mut matches = Vec::new();
        for transformed in &enumeration.queries {
            // The stage deadline covers matching too, checked between chains.
            if Instant::now() >= deadline {
                truncated = true;
                truncated_by.get_or_insert(CapKind::Time);
                break;
            }
            // Transformed queries are matched at any offset: a chain output
            // often aligns with the interior of the canonical entry (diff of
            // the triangular numbers starts at the second natural number).
            // The subsequence-style filter skips the prefix-hash probe.
            let pseudo = SequenceQuery {
                terms: transformed.terms.clone(),
                wildcards: Vec::new(),
                allow_subsequence: true,
                min_match_length: self.config.min_match_length,
            };
            let candidates = self.store.scan(&exact_filter(&pseudo))?;
            candidates_seen += candidates.len();
            for record in candidates {
                let scale = 1.0 + transformed.complexity as f64;
                let mut record_matches = Vec::new();
                if let Some(m) = prefix_match(&pseudo, &record) {
                    record_matches.push(m);
                }
                for m in subsequence_match(&pseudo, &record) {
                    if m.offset == 0 && !record_matches.is_empty() {
                        continue;
                    }
                    record_matches.push(m);
                }
                for mut m in record_matches {
                    m.transform_chain = transformed.chain.clone();
                    m.score /= scale;
                    if self.snippets {
                        m.snippet = Some(snippet(&record, m.offset, m.length));
                    }
                    matches.push(m);
                }
            }
        }
        sort_matches(&mut matches);
        let after = matches.len();
        result.transformed.extend(matches);
        result.diagnostics.push(StageDiagnostics {
            stage: Stage::Transform,
            candidates_before: candidates_seen,
            candidates_after: after,
            elapsed: start.elapsed(),
            truncated,
            truncated_by,
        });
        Ok(())
    }

    fn similarity_stage(
        &self,
        query: &SequenceQuery,
        result: &mut AnalysisResult,
        similar_records: &mut Vec<(SequenceRecord, f64)>,
    ) -> Result<(), AnalyzeError> {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.config.similarity.max_time_ms);
        let filter = relaxed_filter(query, self.config.similarity.growth_band_delta);
        let candidates = self.store.scan(&filter)?;
        let before = candidates.len();

        let ranker = SimilarityRanker {
            min_corr: self.config.similarity.min_corr,
            max_nmse: self.config.similarity.max_nmse,
            top_k: self.config.similarity.top_k,
        };
        let ranking = ranker.rank(
            &query.terms,
            self.config.min_match_length,
            &candidates,
            deadline,
        );

        let by_id: HashMap<SeqId, &SequenceRecord> =
            candidates.iter().map(|r| (r.id, r)).collect();
        for hit in &ranking.hits {
            if let Some(record) = by_id.get(&hit.id) {
                similar_records.push(((*record).clone(), hit.correlation.abs()));
            }
        }

        result.diagnostics.push(StageDiagnostics {
            stage: Stage::Similarity,
            candidates_before: before,
            candidates_after: ranking.hits.len(),
            elapsed: start.elapsed(),
            truncated: ranking.truncated,
            truncated_by: ranking.truncated.then_some(CapKind::Time),
        });
        result.similar = ranking.hits;
        Ok(())
    }

    fn combination_stage(
        &self,
        query: &SequenceQuery,
        result: &mut AnalysisResult,
        matched_records: Vec<(SequenceRecord, f64)>,
        similar_records: Vec<(SequenceRecord, f64)>,
    ) {
        let start = Instant::now();
        let mut bucket = CandidateBucket::new();
        // Matcher hits first, then similarity in rank order; push dedupes.
        for (record, score) in matched_records {
            bucket.push(record, score);
        }
        for (record, score) in similar_records {
            bucket.push(record, score);
        }
        let mut truncated_by_bucket = false;
        if bucket.len() > self.config.combo.bucket_size {
            bucket.truncate(self.config.combo.bucket_size);
            truncated_by_bucket = true;
        }
        let before = bucket.len();

        let solver = CombinationSolver::new(
            &self.config.combo,
            &self.config.triple,
            self.config.min_match_length,
        );
        let outcome = solver.solve(&query.terms, &bucket, self.force_triples);

        result.diagnostics.push(StageDiagnostics {
            stage: Stage::Combination,
            candidates_before: before,
            candidates_after: outcome.matches.len(),
            elapsed: start.elapsed(),
            truncated: outcome.truncated || truncated_by_bucket,
            truncated_by: outcome
                .truncated_by
                .or(truncated_by_bucket.then_some(CapKind::Bucket)),
        });
        result.combinations = outcome.matches;
    }
}

/// Deterministic match order: score descending, id ascending, chain
/// rendering descending.
fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.offset.cmp(&b.offset))
            .then_with(|| render_chain(&b.transform_chain).cmp(&render_chain(&a.transform_chain)))
    });
}

/// Stored-term window around a match, with a little trailing context.
fn snippet(record: &SequenceRecord, offset: usize, length: usize) -> Vec<num_bigint::BigInt> {
    let end = (offset + length + 3).min(record.terms.len());
    record.terms[offset..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::derive_invariants;
    use num_bigint::BigInt;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn record(id: u32, vals: &[i64]) -> SequenceRecord {
        let terms = ints(vals);
        SequenceRecord {
            id: SeqId(id),
            invariants: derive_invariants(&terms),
            terms,
            name: String::new(),
            keywords: String::new(),
        }
    }

    fn test_store(records: &[SequenceRecord]) -> (Store, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        store.init().unwrap();
        store.insert_records(records).unwrap();
        (store, dir)
    }

    #[test]
    fn rejects_invalid_queries() {
        let (store, _dir) = test_store(&[]);
        let config = Config::default();
        let analyzer = Analyzer::new(&store, &config);

        let short = SequenceQuery::new(ints(&[1, 2]));
        assert!(matches!(
            analyzer.analyze(&short),
            Err(AnalyzeError::InvalidQuery(_))
        ));

        let mut wild = SequenceQuery::new(ints(&[1, 0, 0, 0, 5]));
        wild.wildcards = vec![1, 2, 3];
        assert!(matches!(
            analyzer.analyze(&wild),
            Err(AnalyzeError::InvalidQuery(_))
        ));
    }

    #[test]
    fn stage_toggles_skip_stages() {
        let (store, _dir) = test_store(&[record(45, &[0, 1, 1, 2, 3, 5, 8])]);
        let mut config = Config::default();
        config.stages.transform = false;
        config.stages.similarity = false;
        config.stages.combination = false;
        let analyzer = Analyzer::new(&store, &config);
        let result = analyzer
            .analyze(&SequenceQuery::new(ints(&[0, 1, 1, 2, 3])))
            .unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].stage, Stage::ExactPrefix);
        assert_eq!(result.exact.len(), 1);
        assert!(result.transformed.is_empty());
        assert!(result.similar.is_empty());
        assert!(result.combinations.is_empty());
    }

    #[test]
    fn subsequence_stage_skips_duplicate_offset_zero() {
        let (store, _dir) = test_store(&[record(7, &[1, 2, 3, 4, 1, 2, 3, 4])]);
        let mut config = Config::default();
        config.allow_subsequence = true;
        config.stages.transform = false;
        config.stages.similarity = false;
        config.stages.combination = false;
        let analyzer = Analyzer::new(&store, &config);
        let mut query = SequenceQuery::new(ints(&[1, 2, 3, 4]));
        query.allow_subsequence = true;
        let result = analyzer.analyze(&query).unwrap();
        // One prefix hit plus one interior subsequence hit at offset 4.
        assert_eq!(result.exact.len(), 2);
        assert_eq!(result.exact[0].offset, 0);
        assert_eq!(result.exact[1].offset, 4);
        assert!(result.exact[0].score > result.exact[1].score);
    }

    #[test]
    fn snippets_attached_when_requested() {
        let (store, _dir) = test_store(&[record(45, &[0, 1, 1, 2, 3, 5, 8, 13])]);
        let mut config = Config::default();
        config.stages.transform = false;
        config.stages.similarity = false;
        config.stages.combination = false;
        let mut analyzer = Analyzer::new(&store, &config);
        analyzer.snippets = true;
        let result = analyzer
            .analyze(&SequenceQuery::new(ints(&[0, 1, 1])))
            .unwrap();
        let snippet = result.exact[0].snippet.as_ref().unwrap();
        assert_eq!(snippet, &ints(&[0, 1, 1, 2, 3, 5]));
    }
}
