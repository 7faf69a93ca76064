//! Prefix and subsequence matching against candidate records.
//!
//! Subsequence search runs Knuth-Morris-Pratt over the stored terms. With
//! wildcards in the pattern the failure function is no longer reliable, so
//! the matcher falls back to a sliding-window scan; query lengths are small
//! enough that the quadratic worst case never bites.

use crate::model::{Match, MatchType, SequenceQuery, SequenceRecord};

/// Most subsequence offsets reported per record.
const MAX_OFFSETS_PER_RECORD: usize = 4;

/// Compare the query against the stored prefix, early-exiting on the first
/// mismatch. Wildcard positions match any term.
pub fn prefix_match(query: &SequenceQuery, record: &SequenceRecord) -> Option<Match> {
    let qlen = query.len();
    if record.len() < qlen || qlen == 0 {
        return None;
    }
    for (i, term) in query.terms.iter().enumerate() {
        if query.is_wildcard(i) {
            continue;
        }
        if record.terms[i] != *term {
            return None;
        }
    }
    Some(Match {
        id: record.id,
        match_type: MatchType::Prefix,
        offset: 0,
        length: qlen,
        score: qlen as f64,
        transform_chain: Vec::new(),
        snippet: None,
    })
}

/// Report every position where the query occurs inside the stored terms,
/// smallest offset first, capped at four per record.
pub fn subsequence_match(query: &SequenceQuery, record: &SequenceRecord) -> Vec<Match> {
    let qlen = query.len();
    if record.len() < qlen || qlen == 0 {
        return Vec::new();
    }

    let offsets = if query.has_wildcards() {
        naive_offsets(query, &record.terms)
    } else {
        kmp_offsets(&query.terms, &record.terms)
    };

    offsets
        .into_iter()
        .take(MAX_OFFSETS_PER_RECORD)
        .map(|offset| Match {
            id: record.id,
            match_type: MatchType::Subsequence,
            offset,
            length: qlen,
            // Ranked below a prefix hit of equal length.
            score: (qlen - 1) as f64,
            transform_chain: Vec::new(),
            snippet: None,
        })
        .collect()
}

fn naive_offsets(query: &SequenceQuery, haystack: &[num_bigint::BigInt]) -> Vec<usize> {
    let qlen = query.len();
    let mut out = Vec::new();
    'outer: for offset in 0..=(haystack.len() - qlen) {
        for (i, term) in query.terms.iter().enumerate() {
            if query.is_wildcard(i) {
                continue;
            }
            if haystack[offset + i] != *term {
                continue 'outer;
            }
        }
        out.push(offset);
        if out.len() >= MAX_OFFSETS_PER_RECORD {
            break;
        }
    }
    out
}

/// Standard KMP: failure function over the pattern, then a single left-to-
/// right pass over the haystack.
fn kmp_offsets<T: PartialEq>(pattern: &[T], haystack: &[T]) -> Vec<usize> {
    let m = pattern.len();
    let mut failure = vec![0usize; m];
    let mut k = 0;
    for i in 1..m {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }

    let mut out = Vec::new();
    let mut q = 0;
    for (i, item) in haystack.iter().enumerate() {
        while q > 0 && *item != pattern[q] {
            q = failure[q - 1];
        }
        if *item == pattern[q] {
            q += 1;
        }
        if q == m {
            out.push(i + 1 - m);
            if out.len() >= MAX_OFFSETS_PER_RECORD {
                break;
            }
            q = failure[q - 1];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::derive_invariants;
    use crate::model::SeqId;
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

    #[test]
    fn prefix_match_exact() {
        let q = SequenceQuery::new(ints(&[0, 1, 1, 2, 3]));
        let r = record(45, &[0, 1, 1, 2, 3, 5, 8]);
        let m = prefix_match(&q, &r).unwrap();
        assert_eq!(m.offset, 0);
        assert_eq!(m.length, 5);
        assert_eq!(m.score, 5.0);
        assert_eq!(m.match_type, MatchType::Prefix);
    }

    #[test]
    fn prefix_match_rejects_mismatch_and_short_records() {
        let q = SequenceQuery::new(ints(&[0, 1, 2]));
        assert!(prefix_match(&q, &record(1, &[0, 1, 1, 2])).is_none());
        assert!(prefix_match(&q, &record(1, &[0, 1])).is_none());
    }

    #[test]
    fn prefix_match_negative_terms_compare_by_value() {
        let q = SequenceQuery::new(ints(&[1, -1, 1]));
        assert!(prefix_match(&q, &record(1, &[1, -1, 1, -1])).is_some());
        assert!(prefix_match(&q, &record(1, &[1, 1, 1, 1])).is_none());
    }

    #[test]
    fn subsequence_finds_interior_offset() {
        let q = SequenceQuery::new(ints(&[2, 3, 5]));
        let r = record(40, &[0, 1, 1, 2, 3, 5, 8]);
        let ms = subsequence_match(&q, &r);
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].offset, 3);
        assert_eq!(ms[0].score, 2.0);
        // Soundness: the reported window equals the query.
        assert_eq!(&r.terms[3..6], &q.terms[..]);
    }

    #[test]
    fn subsequence_reports_multiple_offsets_capped() {
        let q = SequenceQuery::new(ints(&[1, 1]));
        let r = record(1, &[1, 1, 1, 1, 1, 1, 1, 1]);
        let ms = subsequence_match(&q, &r);
        assert_eq!(ms.len(), 4);
        assert_eq!(
            ms.iter().map(|m| m.offset).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn kmp_handles_self_overlapping_patterns() {
        // Pattern with nontrivial failure function.
        let pat = ints(&[1, 2, 1, 2, 3]);
        let hay = ints(&[1, 2, 1, 2, 1, 2, 3, 9]);
        assert_eq!(kmp_offsets(&pat, &hay), vec![2]);
    }

    #[test]
    fn kmp_agrees_with_naive_scan() {
        let pat = ints(&[0, 1, 0]);
        let hay = ints(&[0, 1, 0, 1, 0, 0, 1, 0]);
        let q = SequenceQuery::new(pat.clone());
        assert_eq!(kmp_offsets(&pat, &hay), naive_offsets(&q, &hay));
    }

    #[test]
    fn wildcard_matches_any_term() {
        let mut q = SequenceQuery::new(ints(&[1, 0, 3]));
        q.wildcards = vec![1];
        let r = record(1, &[9, 1, 77, 3, 4]);
        let ms = subsequence_match(&q, &r);
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].offset, 1);

        let mut qp = SequenceQuery::new(ints(&[9, 0, 77]));
        qp.wildcards = vec![1];
        assert!(prefix_match(&qp, &r).is_some());
    }

    #[test]
    fn zero_is_not_special() {
        let q = SequenceQuery::new(ints(&[0, 0, 1]));
        let r = record(1, &[5, 0, 0, 1, 2]);
        let ms = subsequence_match(&q, &r);
        assert_eq!(ms[0].offset, 1);
    }
}
