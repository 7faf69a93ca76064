//! Shared fixtures for the integration suites: a temp-backed store and a
//! small corpus of well-known OEIS entries.
//!
//! Pull in with `mod common;` from each test file.

use num_bigint::BigInt;
use seqsift::invariants::derive_invariants;
use seqsift::model::{SeqId, SequenceRecord};
use seqsift::store::Store;
use tempfile::TempDir;

/// A `Store` tied to the `TempDir` holding its database file, so the
/// directory outlives every query the test runs.
pub struct TestStore {
    pub store: Store,
    _dir: TempDir,
}

impl TestStore {
    /// Fresh empty store with its schema applied.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("index.db");
        let store = Store::open(&db_path).expect("Failed to open store");
        store.init().expect("Failed to init store");
        Self { store, _dir: dir }
    }

    /// Create a test store seeded with the fixture corpus
    pub fn with_corpus() -> Self {
        let ts = Self::new();
        ts.store
            .insert_records(&fixture_corpus())
            .expect("Failed to seed corpus");
        ts
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

pub fn ints(vals: &[i64]) -> Vec<BigInt> {
    vals.iter().map(|&v| BigInt::from(v)).collect()
}

/// Build a record with derived invariants
pub fn record(id: u32, name: &str, terms: Vec<BigInt>) -> SequenceRecord {
    SequenceRecord {
        id: SeqId(id),
        invariants: derive_invariants(&terms),
        terms,
        name: name.to_string(),
        keywords: String::new(),
    }
}

fn fibonacci(n: usize) -> Vec<BigInt> {
    let mut terms = vec![BigInt::from(0), BigInt::from(1)];
    while terms.len() < n {
        let next = &terms[terms.len() - 1] + &terms[terms.len() - 2];
        terms.push(next);
    }
    terms
}

fn factorials(n: usize) -> Vec<BigInt> {
    let mut terms = Vec::with_capacity(n);
    let mut acc = BigInt::from(1);
    terms.push(acc.clone());
    for i in 1..n {
        acc *= BigInt::from(i as u64);
        terms.push(acc.clone());
    }
    terms
}

/// A small corpus of well-known entries, 40 terms each.
pub fn fixture_corpus() -> Vec<SequenceRecord> {
    let n = 40usize;
    vec![
        record(12, "The simplest sequence of positive numbers: the all 1's sequence.",
            (0..n).map(|_| BigInt::from(1)).collect()),
        record(27, "The positive integers.",
            (1..=n as i64).map(BigInt::from).collect()),
        record(35, "Period 2: repeat [0, 1].",
            (0..n as i64).map(|i| BigInt::from(i % 2)).collect()),
        record(45, "Fibonacci numbers: a(n) = a(n-1) + a(n-2).", fibonacci(n)),
        record(79, "Powers of 2: a(n) = 2^n.",
            (0..n as u32).map(|i| BigInt::from(2u8).pow(i)).collect()),
        record(142, "Factorial numbers: n! = 1*2*3*4*...*n.", factorials(21)),
        record(217, "Triangular numbers: a(n) = binomial(n+1,2).",
            (0..n as i64).map(|i| BigInt::from(i * (i + 1) / 2)).collect()),
        record(290, "The squares: a(n) = n^2.",
            (0..n as i64).map(|i| BigInt::from(i * i)).collect()),
        record(5843, "The nonnegative even numbers: 2n.",
            (0..n as i64).map(|i| BigInt::from(2 * i)).collect()),
        record(7395, "Constant sequence: the all 2's sequence.",
            (0..n).map(|_| BigInt::from(2)).collect()),
        // Filler entries so scans have something to prune.
        record(33999, "Alternating factorials-ish filler.",
            (0..n as i64).map(|i| BigInt::from(if i % 2 == 0 { i } else { -i })).collect()),
        record(40000, "Mixed-sign filler.",
            (0..n as i64).map(|i| BigInt::from((i % 7) - 3)).collect()),
    ]
}
