//! Core data model: records, queries, matches, and analysis results.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::transform::Op;

/// An OEIS A-number (`A` followed by six decimal digits).
///
/// Stored internally as the numeric part; formats back to the canonical
/// seven-character form. Ordering is numeric, which matches lexicographic
/// ordering of the zero-padded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqId(pub u32);

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{:06}", self.0)
    }
}

impl FromStr for SeqId {
    type Err = SeqIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = match s.strip_prefix(['A', 'a']) {
            Some(rest) => rest,
            None => s,
        };
        if digits.is_empty() || digits.len() > 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SeqIdError(s.to_string()));
        }
        // Up to six ASCII digits always fits in u32.
        Ok(SeqId(digits.parse().unwrap()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid A-number '{0}' (expected 'A' followed by up to six digits)")]
pub struct SeqIdError(String);

/// Sign classification of a term series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignPattern {
    AllZero,
    NonNegative,
    NonPositive,
    /// Strictly alternating signs, no zeros.
    Alternating,
    Mixed,
}

impl SignPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            SignPattern::AllZero => "zero",
            SignPattern::NonNegative => "nonneg",
            SignPattern::NonPositive => "nonpos",
            SignPattern::Alternating => "alternating",
            SignPattern::Mixed => "mixed",
        }
    }
}

impl FromStr for SignPattern {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" => Ok(SignPattern::AllZero),
            "nonneg" => Ok(SignPattern::NonNegative),
            "nonpos" => Ok(SignPattern::NonPositive),
            "alternating" => Ok(SignPattern::Alternating),
            "mixed" => Ok(SignPattern::Mixed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SignPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invariants derived from a record's terms at ingest time.
///
/// Every field is a pure function of `terms`; the store indexes most of
/// them so candidate selection can push predicates down to SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct Invariants {
    /// Order-sensitive hash of the first five terms (fewer if shorter).
    pub prefix_hash: i64,
    /// Smallest term, clamped to i64.
    pub min_val: i64,
    /// Largest term, clamped to i64.
    pub max_val: i64,
    /// Gcd of absolute values, 0 if all terms are zero, clamped to i64.
    pub gcd_val: i64,
    pub is_nondecreasing: bool,
    pub is_nonincreasing: bool,
    pub sign_pattern: SignPattern,
    pub nonzero_count: u32,
    /// Sign pattern of consecutive differences.
    pub first_diff_sign_pattern: SignPattern,
    /// Approximate exponent g with |a_n| ~ c*exp(g*n), fit on the nonzero
    /// suffix. `None` when the series is too short or flat.
    pub growth_rate: Option<f64>,
    pub variance: f64,
    pub diff_variance: f64,
}

/// An OEIS entry from the local snapshot.
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    pub id: SeqId,
    /// Stored terms, truncated to `max_stored_terms` at ingest.
    pub terms: Vec<BigInt>,
    /// Short human title; opaque to the matching core.
    pub name: String,
    /// Comma-separated OEIS keyword tags, possibly empty.
    pub keywords: String,
    pub invariants: Invariants,
}

impl SequenceRecord {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A normalised query against the corpus.
#[derive(Debug, Clone)]
pub struct SequenceQuery {
    pub terms: Vec<BigInt>,
    /// Positions that match any integer.
    pub wildcards: Vec<usize>,
    pub allow_subsequence: bool,
    pub min_match_length: usize,
}

impl SequenceQuery {
    /// A plain query with no wildcards and default matching options.
    pub fn new(terms: Vec<BigInt>) -> Self {
        SequenceQuery {
            terms,
            wildcards: Vec::new(),
            allow_subsequence: false,
            min_match_length: 3,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn has_wildcards(&self) -> bool {
        !self.wildcards.is_empty()
    }

    pub fn is_wildcard(&self, pos: usize) -> bool {
        self.wildcards.contains(&pos)
    }
}

/// How a match aligns against the stored sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Query equals the stored prefix.
    Prefix,
    /// Query occurs somewhere inside the stored terms.
    Subsequence,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Prefix => "prefix",
            MatchType::Subsequence => "subsequence",
        }
    }
}

/// A direct or transformed hit against one stored sequence.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: SeqId,
    pub match_type: MatchType,
    /// Start index within the stored sequence.
    pub offset: usize,
    /// Number of aligned terms.
    pub length: usize,
    pub score: f64,
    /// Operators applied to the query before matching; empty for exact hits.
    pub transform_chain: Vec<Op>,
    /// Window of the stored sequence around the match, when requested.
    pub snippet: Option<Vec<BigInt>>,
}

/// Per-component transform applied before shifting in combination search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentTransform {
    Identity,
    Diff,
    PartialSum,
}

impl ComponentTransform {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentTransform::Identity => "id",
            ComponentTransform::Diff => "diff",
            ComponentTransform::PartialSum => "psum",
        }
    }

    /// Contribution to combination complexity.
    pub fn weight(self) -> u32 {
        match self {
            ComponentTransform::Identity => 0,
            ComponentTransform::Diff => 1,
            ComponentTransform::PartialSum => 1,
        }
    }
}

/// A verified linear combination of two or three stored sequences.
///
/// The reported identity is
/// `q(n) = sum_i coeff_i * T_i(S_i)(n + shift_i)` for `n` in
/// `[first_index, first_index + length)`, exact in rational arithmetic.
#[derive(Debug, Clone)]
pub struct CombinationMatch {
    pub component_ids: Vec<SeqId>,
    /// Reduced rationals; integer solutions carry denominator 1.
    pub coefficients: Vec<BigRational>,
    pub shifts: Vec<i32>,
    pub component_transforms: Vec<ComponentTransform>,
    /// First query position covered (nonzero when a back-shift trims the head).
    pub first_index: usize,
    /// Number of query positions verified.
    pub length: usize,
    pub complexity: u32,
    pub score: f64,
}

/// A similarity candidate that survived the correlation and error gates.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    pub id: SeqId,
    /// Pearson correlation of the overlapped prefixes.
    pub correlation: f64,
    /// Normalised mean squared error of the best affine fit.
    pub nmse: f64,
    /// Best-fit scale and offset mapping record terms onto the query.
    pub alpha: f64,
    pub beta: f64,
    /// Positions compared.
    pub overlap: usize,
}

/// Deduplicated, capped candidate list handed to the combination solver.
#[derive(Debug, Clone, Default)]
pub struct CandidateBucket {
    entries: Vec<(SequenceRecord, f64)>,
}

impl CandidateBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping the first (highest-ranked) entry per id.
    pub fn push(&mut self, record: SequenceRecord, rank_score: f64) {
        if !self.entries.iter().any(|(r, _)| r.id == record.id) {
            self.entries.push((record, rank_score));
        }
    }

    pub fn truncate(&mut self, cap: usize) {
        self.entries.truncate(cap);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.entries.iter().map(|(r, _)| r)
    }

    pub fn get(&self, idx: usize) -> &SequenceRecord {
        &self.entries[idx].0
    }
}

/// Pipeline stage names for diagnostics and toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ExactPrefix,
    ExactSubsequence,
    Transform,
    Similarity,
    Combination,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ExactPrefix => "exact-prefix",
            Stage::ExactSubsequence => "exact-subsequence",
            Stage::Transform => "transform",
            Stage::Similarity => "similarity",
            Stage::Combination => "combination",
        }
    }
}

/// Which hard cap fired first when a stage was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    Time,
    Checks,
    Chains,
    Bucket,
}

impl CapKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CapKind::Time => "time",
            CapKind::Checks => "checks",
            CapKind::Chains => "chains",
            CapKind::Bucket => "bucket",
        }
    }
}

/// Per-stage counters recorded by the analyzer.
#[derive(Debug, Clone)]
pub struct StageDiagnostics {
    pub stage: Stage,
    /// Candidates produced by the store scan, before matching.
    pub candidates_before: usize,
    /// Results surviving the stage.
    pub candidates_after: usize,
    pub elapsed: Duration,
    pub truncated: bool,
    pub truncated_by: Option<CapKind>,
}

/// Aggregated output of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub exact: Vec<Match>,
    pub transformed: Vec<Match>,
    pub similar: Vec<SimilarityHit>,
    pub combinations: Vec<CombinationMatch>,
    pub diagnostics: Vec<StageDiagnostics>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
            && self.transformed.is_empty()
            && self.similar.is_empty()
            && self.combinations.is_empty()
    }

    /// True if any stage hit a time or check cap.
    pub fn truncated(&self) -> bool {
        self.diagnostics.iter().any(|d| d.truncated)
    }
}
