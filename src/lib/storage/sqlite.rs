use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use uuid::Uuid;

use crate::core::{Message, NewMessage};
use crate::storage::{QUEUE_COLLECTION, Scan, Storage, keys};

/// How long opening or writing waits on a locked database before failing.
const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// SQLite in WAL mode: one writer at a time, readers work from a snapshot
/// and never wait on it.
pub struct SQLiteStorage {
    pool: SqlitePool,
    collection: String,
}

impl SQLiteStorage {
    pub async fn new(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(LOCK_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(2))
            .acquire_timeout(LOCK_TIMEOUT * 5)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open store at {}", path.display()))?;

        let storage = Self {
            pool,
            collection: QUEUE_COLLECTION.to_string(),
        };
        storage.ensure_collection(QUEUE_COLLECTION).await?;
        Ok(storage)
    }

    /// Create the tables and the sequence row for `name` if missing.
    pub async fn ensure_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entries (
                  collection TEXT NOT NULL,
                  key TEXT NOT NULL,
                  value BLOB NOT NULL,
                  PRIMARY KEY (collection, key))
                  WITHOUT ROWID",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sequences (
                  collection TEXT PRIMARY KEY,
                  value INTEGER NOT NULL)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT OR IGNORE INTO sequences (collection, value) VALUES (?, 0)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit()
            .await
            .with_context(|| format!("create collection {name}"))?;
        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Storage for SQLiteStorage {
    async fn insert_message(&self, msg: NewMessage, time: DateTime<Utc>, id: Uuid) -> Result<Message> {
        let mut tx = self.pool.begin().await?;
        let sequence: i64 = sqlx::query_scalar(
            "UPDATE sequences SET value = value + 1 WHERE collection = ? RETURNING value",
        )
        .bind(&self.collection)
        .fetch_one(&mut *tx)
        .await
        .context("next sequence")?;

        let message = Message::stamp(msg, keys::encode_key(time, u64::try_from(sequence)?), time, id);
        let value = serde_json::to_vec(&message)?;
        sqlx::query("INSERT INTO entries (collection, key, value) VALUES (?, ?, ?)")
            .bind(&self.collection)
            .bind(&message.sequence)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn remove_oldest(&self, count: usize) -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "DELETE FROM entries WHERE collection = ? AND key IN (
                  SELECT key FROM entries WHERE collection = ? ORDER BY key LIMIT ?)",
        )
        .bind(&self.collection)
        .bind(&self.collection)
        .bind(limit)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() as usize)
    }

    async fn scan(&self, visit: &mut (dyn for<'a> FnMut(&'a str, &'a [u8]) -> Scan + Send)) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let depth: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&mut *tx)
            .await?;
        {
            let mut rows = sqlx::query("SELECT key, value FROM entries WHERE collection = ? ORDER BY key")
                .bind(&self.collection)
                .fetch(&mut *tx);
            while let Some(row) = rows.try_next().await? {
                let key: String = row.try_get("key")?;
                let value: Vec<u8> = row.try_get("value")?;
                if visit(&key, &value) == Scan::Stop {
                    break;
                }
            }
        }
        tx.rollback().await?;
        Ok(depth as usize)
    }
}
