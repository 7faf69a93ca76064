//! # seqsift - offline OEIS sequence matching
//!
//! Answers "does my integer sequence already live in OEIS?" against a local
//! snapshot, entirely offline. Beyond direct lookups it searches for
//! transform chains (Superseeker style), ranks near-misses by affine fit,
//! and brute-forces small linear combinations of two or three entries.
//!
//! ## Pipeline
//!
//! - **exact**: prefix and (optionally) KMP subsequence matching over an
//!   invariant-filtered candidate stream
//! - **transform**: bounded-depth chains of sequence operators applied to
//!   the query, deduplicated, then matched
//! - **similarity**: best-fit affine error plus correlation, top-K
//! - **combinations**: integer or exact-rational coefficients over shifted
//!   (and per-component transformed) candidate pairs and triples
//!
//! ## Quick start
//!
//! ```no_run
//! use seqsift::config::{Config, Profile};
//! use seqsift::query::parse_query;
//! use seqsift::store::Store;
//! use seqsift::Analyzer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Store::open_existing(std::path::Path::new("oeis.db"))?;
//! let config = Config::default().with_profile(Profile::Deep);
//! let query = parse_query("0,1,1,2,3,5,8", config.min_match_length, config.max_wildcards)?;
//! let result = Analyzer::new(&store, &config).analyze(&query)?;
//! for m in &result.exact {
//!     println!("{} at offset {}", m.id, m.offset);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod combo;
pub mod config;
pub mod filter;
pub mod ingest;
pub mod invariants;
pub mod matcher;
pub mod model;
pub mod query;
pub mod render;
pub mod similarity;
pub mod store;
pub mod transform;

pub use analyzer::{AnalyzeError, Analyzer};
pub use model::{
    AnalysisResult, CandidateBucket, CombinationMatch, Match, MatchType, SeqId, SequenceQuery,
    SequenceRecord,
};
pub use store::{ScanFilter, Store};
