//! SQLite storage for the indexed OEIS snapshot (sqlx async with sync wrappers)
//!
//! Provides sync methods that internally use a tokio runtime to execute async
//! sqlx operations, so the matching core can stay synchronous while the
//! backing pool keeps WAL-mode SQLite safe for concurrent readers.
//!
//! ## Module structure
//!
//! - `records` - record reads (get / prefix-hash lookup / filtered scan),
//!   batch ingest writes, and corpus stats

mod records;

pub use records::{ScanFilter, StoreStats};

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::runtime::Runtime;

/// Current database schema version.
///
/// v1: initial layout
/// v2: growth_rate made nullable, diff_variance column added
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("no index found at {}. Run 'seqsift ingest' first.", .0.display())]
    Missing(PathBuf),
    #[error("schema version mismatch: index is v{0}, seqsift expects v{1}. Re-run 'seqsift ingest --force' to rebuild.")]
    SchemaMismatch(i64, i64),
    #[error("corrupt row for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Read-mostly SQLite store for sequence records.
///
/// Uses sqlx connection pooling and WAL mode; all methods take `&self` and
/// are safe to call from multiple threads. Writes happen only during ingest,
/// never at query time.
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) rt: Runtime,
}

impl Store {
    /// Open (creating if necessary) the index at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let rt = Runtime::new().map_err(|e| StoreError::Runtime(e.to_string()))?;

        // Forward slashes for URL compatibility on Windows.
        let path_str = path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = rt.block_on(async {
            SqlitePoolOptions::new()
                .max_connections(4)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        // WAL mode: concurrent reads, single writer
                        sqlx::query("PRAGMA journal_mode = WAL")
                            .execute(&mut *conn)
                            .await?;
                        sqlx::query("PRAGMA busy_timeout = 5000")
                            .execute(&mut *conn)
                            .await?;
                        // NORMAL sync is safe with WAL
                        sqlx::query("PRAGMA synchronous = NORMAL")
                            .execute(&mut *conn)
                            .await?;
                        sqlx::query("PRAGMA temp_store = MEMORY")
                            .execute(&mut *conn)
                            .await?;
                        Ok(())
                    })
                })
                .connect(&db_url)
                .await
        })?;

        tracing::debug!(path = %path.display(), "database connected");

        Ok(Self { pool, rt })
    }

    /// Open an existing index, failing fast when none has been built yet.
    ///
    /// Also validates the schema version so a stale index produces an
    /// actionable error instead of empty results.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        let store = Self::open(path)?;
        store.check_schema_version()?;
        Ok(store)
    }

    /// Create the schema and stamp metadata. Idempotent.
    pub fn init(&self) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let schema = include_str!("../schema.sql");
            for statement in schema.split(';') {
                let stmt: String = statement
                    .lines()
                    .filter(|line| !line.trim().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let stmt = stmt.trim();
                if stmt.is_empty() {
                    continue;
                }
                sqlx::query(stmt).execute(&self.pool).await?;
            }

            let now = chrono::Utc::now().to_rfc3339();
            for (key, value) in [
                ("schema_version", CURRENT_SCHEMA_VERSION.to_string()),
                ("created_at", now),
                ("seqsift_version", env!("CARGO_PKG_VERSION").to_string()),
            ] {
                sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
                    .bind(key)
                    .bind(value)
                    .execute(&self.pool)
                    .await?;
            }

            tracing::info!(schema_version = CURRENT_SCHEMA_VERSION, "schema initialized");
            Ok(())
        })
    }

    /// Drop all record rows (for `ingest --force`).
    pub fn clear(&self) -> Result<(), StoreError> {
        self.rt.block_on(async {
            sqlx::query("DELETE FROM sequences")
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    pub fn metadata_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.rt.block_on(async {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT value FROM metadata WHERE key = ?1")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.map(|(v,)| v))
        })
    }

    pub fn metadata_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.rt.block_on(async {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn check_schema_version(&self) -> Result<(), StoreError> {
        let stored = self
            .metadata_get("schema_version")
            // A db file without a metadata table is not an index at all.
            .map_err(|_| StoreError::SchemaMismatch(0, CURRENT_SCHEMA_VERSION))?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        if stored != CURRENT_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch(stored, CURRENT_SCHEMA_VERSION));
        }
        Ok(())
    }
}
