//! One-shot ingestion of the raw OEIS dumps.
//!
//! Reads the `stripped` terms file (optionally gzip-compressed), the `names`
//! title file, and the optional `keywords` file, derives invariants, and
//! batch-inserts into the store. Malformed lines are skipped and counted,
//! never fatal; a snapshot with a few bad lines is still a snapshot.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use num_bigint::BigInt;
use thiserror::Error;

use crate::invariants::derive_invariants;
use crate::model::{SeqId, SequenceRecord};
use crate::store::{Store, StoreError};

/// Records per insert transaction.
const BATCH_SIZE: usize = 1_000;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters reported back to the CLI.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub records: usize,
    pub skipped: usize,
    pub names: usize,
    pub keywords: usize,
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Parse one stripped-file line: `A000045 ,0,1,1,2,3,5,...`.
///
/// Returns `None` for comments, blanks, and anything that does not parse as
/// an id plus at least one integer term.
fn parse_stripped_line(line: &str) -> Option<(SeqId, Vec<BigInt>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (id_part, rest) = line.split_once([' ', '\t'])?;
    let id = SeqId::from_str(id_part).ok()?;
    let terms: Vec<BigInt> = rest
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| BigInt::from_str(t).ok())
        .collect::<Option<_>>()?;
    if terms.is_empty() {
        return None;
    }
    Some((id, terms))
}

/// Parse one names- or keywords-file line: `A000045 <payload>`.
fn parse_tagged_line(line: &str) -> Option<(SeqId, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (id_part, rest) = line.split_once([' ', '\t'])?;
    let id = SeqId::from_str(id_part).ok()?;
    let payload = rest.trim();
    if payload.is_empty() {
        return None;
    }
    Some((id, payload.to_string()))
}

/// Ingest the stripped terms file, truncating each entry to
/// `max_stored_terms`. `on_batch` fires after every committed batch with the
/// running record count (the CLI drives its progress bar from it).
pub fn ingest_stripped(
    store: &Store,
    path: &Path,
    max_stored_terms: usize,
    mut on_batch: impl FnMut(usize),
) -> Result<IngestReport, IngestError> {
    let reader = open_reader(path)?;
    let mut report = IngestReport::default();
    let mut batch: Vec<SequenceRecord> = Vec::with_capacity(BATCH_SIZE);

    for line in reader.lines() {
        let line = line.map_err(|e| IngestError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let Some((id, mut terms)) = parse_stripped_line(&line) else {
            if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                report.skipped += 1;
                tracing::debug!(line = %line.chars().take(40).collect::<String>(), "skipped line");
            }
            continue;
        };
        terms.truncate(max_stored_terms);
        batch.push(SequenceRecord {
            id,
            invariants: derive_invariants(&terms),
            terms,
            name: String::new(),
            keywords: String::new(),
        });
        if batch.len() >= BATCH_SIZE {
            store.insert_records(&batch)?;
            report.records += batch.len();
            batch.clear();
            on_batch(report.records);
        }
    }
    if !batch.is_empty() {
        store.insert_records(&batch)?;
        report.records += batch.len();
        on_batch(report.records);
    }

    tracing::info!(
        records = report.records,
        skipped = report.skipped,
        "stripped file ingested"
    );
    Ok(report)
}

/// Attach titles from the names file.
pub fn ingest_names(store: &Store, path: &Path) -> Result<usize, IngestError> {
    let entries = read_tagged(path)?;
    store.apply_names(&entries)?;
    tracing::info!(names = entries.len(), "names applied");
    Ok(entries.len())
}

/// Attach keyword tags from the keywords file.
pub fn ingest_keywords(store: &Store, path: &Path) -> Result<usize, IngestError> {
    let entries = read_tagged(path)?;
    store.apply_keywords(&entries)?;
    tracing::info!(keywords = entries.len(), "keywords applied");
    Ok(entries.len())
}

fn read_tagged(path: &Path) -> Result<Vec<(SeqId, String)>, IngestError> {
    let reader = open_reader(path)?;
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| IngestError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if let Some(entry) = parse_tagged_line(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_stripped_lines() {
        let (id, terms) = parse_stripped_line("A000045 ,0,1,1,2,3,5,8,").unwrap();
        assert_eq!(id, SeqId(45));
        assert_eq!(terms.len(), 7);
        assert_eq!(terms[6], BigInt::from(8));
    }

    #[test]
    fn skips_comments_and_garbage() {
        assert!(parse_stripped_line("# OEIS terms table").is_none());
        assert!(parse_stripped_line("").is_none());
        assert!(parse_stripped_line("A000045 ,x,y,").is_none());
        assert!(parse_stripped_line("notanid ,1,2,3,").is_none());
    }

    #[test]
    fn parses_negative_and_big_terms() {
        let (_, terms) =
            parse_stripped_line("A000001 ,-1,2,-3,265252859812191058636308480000000,").unwrap();
        assert_eq!(terms[0], BigInt::from(-1));
        assert_eq!(
            terms[3],
            "265252859812191058636308480000000".parse::<BigInt>().unwrap()
        );
    }

    #[test]
    fn parses_tagged_lines() {
        let (id, name) = parse_tagged_line("A000045 Fibonacci numbers: a(n) = a(n-1) + a(n-2).")
            .unwrap();
        assert_eq!(id, SeqId(45));
        assert!(name.starts_with("Fibonacci"));
        assert!(parse_tagged_line("# names file").is_none());
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn end_to_end_ingest_plain_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        store.init().unwrap();

        let stripped = write_file(
            dir.path(),
            "stripped",
            "# header\nA000045 ,0,1,1,2,3,5,8,13,21,34,\nA000027 ,1,2,3,4,5,6,7,8,9,10,\nbadline\n",
        );
        let names = write_file(
            dir.path(),
            "names",
            "A000045 Fibonacci numbers.\nA000027 The positive integers.\n",
        );

        let report = ingest_stripped(&store, &stripped, 64, |_| {}).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(ingest_names(&store, &names).unwrap(), 2);

        let fib = store.get(SeqId(45)).unwrap().unwrap();
        assert_eq!(fib.terms.len(), 10);
        assert_eq!(fib.name, "Fibonacci numbers.");
        let stats = store.stats().unwrap();
        assert_eq!(stats.records, 2);
    }

    #[test]
    fn truncates_to_max_stored_terms() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        store.init().unwrap();
        let stripped = write_file(dir.path(), "stripped", "A000027 ,1,2,3,4,5,6,7,8,9,10,\n");
        ingest_stripped(&store, &stripped, 4, |_| {}).unwrap();
        let rec = store.get(SeqId(27)).unwrap().unwrap();
        assert_eq!(rec.terms.len(), 4);
    }

    #[test]
    fn reads_gzip_compressed_dumps() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        store.init().unwrap();

        let gz_path = dir.path().join("stripped.gz");
        {
            let file = File::create(&gz_path).unwrap();
            let mut encoder =
                flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder
                .write_all(b"A000290 ,0,1,4,9,16,25,36,49,64,81,\n")
                .unwrap();
            encoder.finish().unwrap();
        }

        let report = ingest_stripped(&store, &gz_path, 64, |_| {}).unwrap();
        assert_eq!(report.records, 1);
        let squares = store.get(SeqId(290)).unwrap().unwrap();
        assert_eq!(squares.terms[5], BigInt::from(25));
    }
}
