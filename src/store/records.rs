//! Record reads, filtered scans, and ingest writes.

use std::str::FromStr;

use num_bigint::BigInt;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{Store, StoreError};
use crate::model::{Invariants, SeqId, SequenceRecord, SignPattern};

const RECORD_COLUMNS: &str = "id, name, keywords, terms, length, prefix_hash, min_val, max_val, \
     gcd_val, nondecreasing, nonincreasing, sign_pattern, diff_sign_pattern, nonzero_count, \
     growth_rate, variance, diff_variance";

/// Conjunction of invariant-band predicates for a filtered scan.
///
/// Unset fields match all records. The store pushes every set field down to
/// SQL so the backing indices do the narrowing; iteration order is always by
/// id ascending, which keeps result ordering reproducible.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Exact prefix-hash probe.
    pub prefix_hash: Option<i64>,
    /// Acceptable stored sign patterns.
    pub sign_patterns: Option<Vec<SignPattern>>,
    /// Acceptable stored first-difference sign patterns.
    pub diff_sign_patterns: Option<Vec<SignPattern>>,
    /// Stored gcd must be one of these values (the divisors of the query gcd).
    pub gcd_in: Option<Vec<i64>>,
    pub nonzero_min: Option<u32>,
    pub nonzero_max: Option<u32>,
    /// Inclusive growth-rate band; excludes records with no growth estimate.
    pub growth_band: Option<(f64, f64)>,
    /// Inclusive variance band.
    pub variance_band: Option<(f64, f64)>,
    pub min_length: Option<u32>,
    /// Row cap, applied after ordering.
    pub limit: Option<u32>,
}

impl ScanFilter {
    pub fn is_unconstrained(&self) -> bool {
        self.prefix_hash.is_none()
            && self.sign_patterns.is_none()
            && self.diff_sign_patterns.is_none()
            && self.gcd_in.is_none()
            && self.nonzero_min.is_none()
            && self.nonzero_max.is_none()
            && self.growth_band.is_none()
            && self.variance_band.is_none()
            && self.min_length.is_none()
    }
}

/// Corpus-level counters for `seqsift stats`.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub records: u64,
    pub total_terms: u64,
    pub min_length: u32,
    pub max_length: u32,
}

enum Bind {
    Int(i64),
    Real(f64),
}

pub(crate) fn terms_to_text(terms: &[BigInt]) -> String {
    terms
        .iter()
        .map(|t| t.to_str_radix(10))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn terms_from_text(text: &str) -> Result<Vec<BigInt>, String> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|tok| BigInt::from_str(tok).map_err(|e| format!("bad term '{}': {}", tok, e)))
        .collect()
}

fn record_from_row(row: &SqliteRow) -> Result<SequenceRecord, StoreError> {
    let id_text: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        id: id_text.clone(),
        reason,
    };

    let id = SeqId::from_str(&id_text).map_err(|e| corrupt(e.to_string()))?;
    let terms = terms_from_text(&row.try_get::<String, _>("terms")?).map_err(corrupt)?;
    let sign_pattern = SignPattern::from_str(&row.try_get::<String, _>("sign_pattern")?)
        .map_err(|_| corrupt("bad sign_pattern".into()))?;
    let diff_sign_pattern = SignPattern::from_str(&row.try_get::<String, _>("diff_sign_pattern")?)
        .map_err(|_| corrupt("bad diff_sign_pattern".into()))?;

    Ok(SequenceRecord {
        id,
        terms,
        name: row.try_get("name")?,
        keywords: row.try_get("keywords")?,
        invariants: Invariants {
            prefix_hash: row.try_get("prefix_hash")?,
            min_val: row.try_get("min_val")?,
            max_val: row.try_get("max_val")?,
            gcd_val: row.try_get("gcd_val")?,
            is_nondecreasing: row.try_get::<i64, _>("nondecreasing")? != 0,
            is_nonincreasing: row.try_get::<i64, _>("nonincreasing")? != 0,
            sign_pattern,
            nonzero_count: row.try_get::<i64, _>("nonzero_count")? as u32,
            first_diff_sign_pattern: diff_sign_pattern,
            growth_rate: row.try_get("growth_rate")?,
            variance: row.try_get("variance")?,
            diff_variance: row.try_get("diff_variance")?,
        },
    })
}

impl Store {
    /// Fetch one record by id. `Ok(None)` when the id is not in the snapshot.
    pub fn get(&self, id: SeqId) -> Result<Option<SequenceRecord>, StoreError> {
        self.rt.block_on(async {
            let sql = format!("SELECT {} FROM sequences WHERE id = ?1", RECORD_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    /// All records whose stored prefix hash equals `hash`, ordered by id.
    pub fn lookup_by_prefix_hash(&self, hash: i64) -> Result<Vec<SequenceRecord>, StoreError> {
        self.rt.block_on(async {
            let sql = format!(
                "SELECT {} FROM sequences WHERE prefix_hash = ?1 ORDER BY id",
                RECORD_COLUMNS
            );
            let rows = sqlx::query(&sql).bind(hash).fetch_all(&self.pool).await?;
            rows.iter().map(record_from_row).collect()
        })
    }

    /// Filtered scan with predicate pushdown.
    ///
    /// An unconstrained filter enumerates the whole corpus. Results are
    /// ordered by id; the zero-padded A-number form makes lexicographic and
    /// numeric order agree.
    pub fn scan(&self, filter: &ScanFilter) -> Result<Vec<SequenceRecord>, StoreError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut binds: Vec<Bind> = Vec::new();

        if let Some(h) = filter.prefix_hash {
            binds.push(Bind::Int(h));
            conditions.push(format!("prefix_hash = ?{}", binds.len()));
        }
        if let Some(pats) = &filter.sign_patterns {
            conditions.push(sign_set_condition("sign_pattern", pats));
        }
        if let Some(pats) = &filter.diff_sign_patterns {
            conditions.push(sign_set_condition("diff_sign_pattern", pats));
        }
        if let Some(divisors) = &filter.gcd_in {
            let mut placeholders = Vec::with_capacity(divisors.len());
            for &d in divisors {
                binds.push(Bind::Int(d));
                placeholders.push(format!("?{}", binds.len()));
            }
            conditions.push(format!("gcd_val IN ({})", placeholders.join(", ")));
        }
        if let Some(lo) = filter.nonzero_min {
            binds.push(Bind::Int(lo as i64));
            conditions.push(format!("nonzero_count >= ?{}", binds.len()));
        }
        if let Some(hi) = filter.nonzero_max {
            binds.push(Bind::Int(hi as i64));
            conditions.push(format!("nonzero_count <= ?{}", binds.len()));
        }
        if let Some((lo, hi)) = filter.growth_band {
            binds.push(Bind::Real(lo));
            let lo_idx = binds.len();
            binds.push(Bind::Real(hi));
            conditions.push(format!(
                "growth_rate IS NOT NULL AND growth_rate >= ?{} AND growth_rate <= ?{}",
                lo_idx,
                binds.len()
            ));
        }
        if let Some((lo, hi)) = filter.variance_band {
            binds.push(Bind::Real(lo));
            let lo_idx = binds.len();
            binds.push(Bind::Real(hi));
            conditions.push(format!(
                "variance >= ?{} AND variance <= ?{}",
                lo_idx,
                binds.len()
            ));
        }
        if let Some(len) = filter.min_length {
            binds.push(Bind::Int(len as i64));
            conditions.push(format!("length >= ?{}", binds.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = match filter.limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        };
        let sql = format!(
            "SELECT {} FROM sequences{} ORDER BY id{}",
            RECORD_COLUMNS, where_clause, limit_clause
        );

        self.rt.block_on(async {
            let mut q = sqlx::query(&sql);
            for bind in &binds {
                q = match bind {
                    Bind::Int(v) => q.bind(*v),
                    Bind::Real(v) => q.bind(*v),
                };
            }
            let rows = q.fetch_all(&self.pool).await?;
            tracing::debug!(rows = rows.len(), conditions = conditions.len(), "scan");
            rows.iter().map(record_from_row).collect()
        })
    }

    /// Batch-insert records in one transaction (replacing on id collision).
    pub fn insert_records(&self, records: &[SequenceRecord]) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for rec in records {
                let inv = &rec.invariants;
                sqlx::query(
                    "INSERT OR REPLACE INTO sequences (id, name, keywords, terms, length, \
                     prefix_hash, min_val, max_val, gcd_val, nondecreasing, nonincreasing, \
                     sign_pattern, diff_sign_pattern, nonzero_count, growth_rate, variance, \
                     diff_variance) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17)",
                )
                .bind(rec.id.to_string())
                .bind(&rec.name)
                .bind(&rec.keywords)
                .bind(terms_to_text(&rec.terms))
                .bind(rec.terms.len() as i64)
                .bind(inv.prefix_hash)
                .bind(inv.min_val)
                .bind(inv.max_val)
                .bind(inv.gcd_val)
                .bind(inv.is_nondecreasing as i64)
                .bind(inv.is_nonincreasing as i64)
                .bind(inv.sign_pattern.as_str())
                .bind(inv.first_diff_sign_pattern.as_str())
                .bind(inv.nonzero_count as i64)
                .bind(inv.growth_rate)
                .bind(inv.variance)
                .bind(inv.diff_variance)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    /// Attach titles from the names file to already-ingested records.
    pub fn apply_names(&self, names: &[(SeqId, String)]) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (id, name) in names {
                sqlx::query("UPDATE sequences SET name = ?1 WHERE id = ?2")
                    .bind(name)
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    /// Attach keyword tags to already-ingested records.
    pub fn apply_keywords(&self, keywords: &[(SeqId, String)]) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (id, kw) in keywords {
                sqlx::query("UPDATE sequences SET keywords = ?1 WHERE id = ?2")
                    .bind(kw)
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.rt.block_on(async {
            let row: (i64, Option<i64>, Option<i64>, Option<i64>) = sqlx::query_as(
                "SELECT COUNT(*), COALESCE(SUM(length), 0), MIN(length), MAX(length) \
                 FROM sequences",
            )
            .fetch_one(&self.pool)
            .await?;
            Ok(StoreStats {
                records: row.0 as u64,
                total_terms: row.1.unwrap_or(0) as u64,
                min_length: row.2.unwrap_or(0) as u32,
                max_length: row.3.unwrap_or(0) as u32,
            })
        })
    }
}

fn sign_set_condition(column: &str, patterns: &[SignPattern]) -> String {
    // Pattern names are static enum strings, safe to inline.
    let set = patterns
        .iter()
        .map(|p| format!("'{}'", p.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} IN ({})", column, set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_text_roundtrip() {
        let terms = vec![BigInt::from(0), BigInt::from(-5), BigInt::from(123)];
        assert_eq!(terms_to_text(&terms), "0,-5,123");
        assert_eq!(terms_from_text("0,-5,123").unwrap(), terms);
        assert_eq!(terms_from_text("").unwrap(), Vec::<BigInt>::new());
        assert!(terms_from_text("1,x").is_err());
    }

    #[test]
    fn sign_set_condition_renders_in_clause() {
        let cond = sign_set_condition(
            "sign_pattern",
            &[SignPattern::NonNegative, SignPattern::AllZero],
        );
        assert_eq!(cond, "sign_pattern IN ('nonneg', 'zero')");
    }

    #[test]
    fn unconstrained_filter_detection() {
        assert!(ScanFilter::default().is_unconstrained());
        let f = ScanFilter {
            min_length: Some(3),
            ..Default::default()
        };
        assert!(!f.is_unconstrained());
    }
}
