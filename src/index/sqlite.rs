//! SQLite-backed commit index persistence.
//!
//! Stores per-root commit metadata so the demo binary (and any embedder)
//! gets incremental indexing across runs: a root whose recorded head still
//! matches is bulk-loaded instead of re-read from the VCS.

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{
    Pool, QueryBuilder, Row, Sqlite, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// Bump to rebuild existing index databases on schema changes.
pub const SCHEMA_VERSION: &str = "1";

/// One persisted commit row. Roots are keyed by their canonical path
/// string since session-local root ids are not stable across runs.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub oid: [u8; 20],
    pub author: String,
    pub timestamp: i64,
    pub message: String,
}

/// SQLite persistence for the commit index.
pub struct SqliteCommitIndex {
    pool: Pool<Sqlite>,
}

impl SqliteCommitIndex {
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-64000"); // 64MB cache

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to index database")?;

        Ok(Self { pool })
    }

    /// Initialize the schema, returns true if it was rebuilt.
    pub async fn init_schema(&self) -> Result<bool> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let stored_version: Option<String> =
            sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
                .fetch_optional(&self.pool)
                .await?
                .map(|row| row.get("value"));

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                tracing::info!(old, new = SCHEMA_VERSION, "index schema changed, rebuilding");
            }
            sqlx::query("DROP TABLE IF EXISTS commits").execute(&self.pool).await?;
            sqlx::query("DROP TABLE IF EXISTS indexed_roots").execute(&self.pool).await?;
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS commits (
                root TEXT NOT NULL,
                oid BLOB NOT NULL,
                author TEXT NOT NULL,
                committed_at INTEGER NOT NULL,
                message TEXT NOT NULL,
                PRIMARY KEY (root, oid)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexed_roots (
                root TEXT PRIMARY KEY,
                head TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        if needs_rebuild {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await?;
        }

        Ok(needs_rebuild)
    }

    /// Head hash the root was last fully indexed at, if any.
    pub async fn indexed_head(&self, root: &str) -> Option<String> {
        sqlx::query("SELECT head FROM indexed_roots WHERE root = ?")
            .bind(root)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("head"))
    }

    /// Persist commit rows and mark the root indexed at `head`, atomically.
    pub async fn apply_indexing(
        &self,
        root: &str,
        head_hex: &str,
        records: &[IndexRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.save_commits_in_tx(&mut tx, root, records).await?;
        sqlx::query("INSERT OR REPLACE INTO indexed_roots (root, head) VALUES (?, ?)")
            .bind(root)
            .bind(head_hex)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Load every persisted commit row for a root.
    pub async fn load_commits(&self, root: &str) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query("SELECT oid, author, committed_at, message FROM commits WHERE root = ?")
            .bind(root)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let oid: Vec<u8> = row.get("oid");
                let oid: [u8; 20] = oid.try_into().ok()?;
                Some(IndexRecord {
                    oid,
                    author: row.get("author"),
                    timestamp: row.get("committed_at"),
                    message: row.get("message"),
                })
            })
            .collect())
    }

    async fn save_commits_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        root: &str,
        records: &[IndexRecord],
    ) -> Result<()> {
        const BATCH_SIZE: usize = 5000;

        for chunk in records.chunks(BATCH_SIZE) {
            if chunk.is_empty() {
                continue;
            }

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR REPLACE INTO commits (root, oid, author, committed_at, message) ",
            );
            qb.push_values(chunk, |mut row, record| {
                row.push_bind(root)
                    .push_bind(record.oid.as_slice())
                    .push_bind(&record.author)
                    .push_bind(record.timestamp)
                    .push_bind(&record.message);
            });
            qb.build().execute(&mut **tx).await?;
        }

        Ok(())
    }
}
