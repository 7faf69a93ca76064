//! Query-string parsing.
//!
//! Accepts comma- or whitespace-separated signed decimal integers with
//! optional `?` / `*` wildcards, and normalises into a [`SequenceQuery`].
//! Validation failures here mean no matching is attempted.

use std::str::FromStr;

use num_bigint::BigInt;
use thiserror::Error;

use crate::model::SequenceQuery;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("empty query")]
    Empty,
    #[error("query has {0} terms, need at least {1}")]
    TooShort(usize, usize),
    #[error("query has {0} wildcards, at most {1} allowed")]
    TooManyWildcards(usize, usize),
    #[error("'{0}' is not an integer")]
    BadToken(String),
}

/// Parse a raw query string.
///
/// Tokens are split on commas and whitespace; empty tokens (doubled commas,
/// trailing separators) are skipped. A leading `+` is accepted and dropped.
/// `?` and `*` both mark a wildcard position.
pub fn parse_query(
    input: &str,
    min_match_length: usize,
    max_wildcards: usize,
) -> Result<SequenceQuery, QueryError> {
    let mut terms = Vec::new();
    let mut wildcards = Vec::new();

    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token == "?" || token == "*" {
            wildcards.push(terms.len());
            // Placeholder value; the matcher never compares wildcard positions.
            terms.push(BigInt::from(0));
            continue;
        }
        let cleaned = token.strip_prefix('+').unwrap_or(token);
        match BigInt::from_str(cleaned) {
            Ok(v) => terms.push(v),
            Err(_) => return Err(QueryError::BadToken(token.to_string())),
        }
    }

    if terms.is_empty() {
        return Err(QueryError::Empty);
    }
    if terms.len() < min_match_length {
        return Err(QueryError::TooShort(terms.len(), min_match_length));
    }
    if wildcards.len() > max_wildcards {
        return Err(QueryError::TooManyWildcards(wildcards.len(), max_wildcards));
    }

    let mut query = SequenceQuery::new(terms);
    query.wildcards = wildcards;
    query.min_match_length = min_match_length;
    Ok(query)
}
