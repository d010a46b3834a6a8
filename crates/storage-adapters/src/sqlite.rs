//! # SQLite Entity Store
//!
//! Maps domain entities onto SQLite. Each entity is kept as a JSON document
//! next to the columns the queries filter on (expiry, uniqueness keys).
//!
//! # Developer Note
//! SQLite allows a single writer at a time, so mutations are serialized
//! through `write_lock` and run inside a transaction. That keeps the
//! read-check-write of `update_*` atomic without relying on busy retries.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;
use uuid::Uuid;

use domains::{
    CommentReport, ConflictReason, DomainError, DomainResult, EntityKind, Gossip, GossipRepo,
    Mutation, ReportRepo, Thread, ThreadRepo, User, UserRepo,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS threads (
        id          TEXT PRIMARY KEY,
        created_at  INTEGER NOT NULL,
        expires_at  INTEGER NOT NULL,
        body        TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS threads_expires_at ON threads (expires_at)",
    "CREATE TABLE IF NOT EXISTS gossips (
        id          TEXT PRIMARY KEY,
        created_at  INTEGER NOT NULL,
        body        TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY,
        username_key  TEXT NOT NULL UNIQUE,
        body          TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reports (
        id           TEXT PRIMARY KEY,
        comment_id   TEXT NOT NULL,
        reporter_id  TEXT NOT NULL,
        created_at   INTEGER NOT NULL,
        body         TEXT NOT NULL,
        UNIQUE (comment_id, reporter_id)
    )",
];

pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

fn storage_err(err: impl std::fmt::Display) -> DomainError {
    DomainError::storage(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn encode<T: Serialize>(entity: &T) -> DomainResult<String> {
    serde_json::to_string(entity).map_err(storage_err)
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> DomainResult<T> {
    let body: String = row.try_get("body").map_err(storage_err)?;
    serde_json::from_str(&body).map_err(storage_err)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<SqliteRow>) -> DomainResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn new(url: &str) -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage_err)?
            .create_if_missing(true);

        // Every connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage_err)?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(storage_err)?;
        }

        tracing::info!(url, "sqlite store ready");
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl ThreadRepo for SqliteStore {
    async fn insert_thread(&self, thread: Thread) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT INTO threads (id, created_at, expires_at, body) VALUES (?, ?, ?, ?)")
            .bind(thread.id.to_string())
            .bind(thread.created_at.timestamp_millis())
            .bind(thread.expires_at.timestamp_millis())
            .bind(encode(&thread)?)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_thread(&self, id: Uuid) -> DomainResult<Option<Thread>> {
        let row = sqlx::query("SELECT body FROM threads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(decode).transpose()
    }

    async fn list_threads(&self) -> DomainResult<Vec<Thread>> {
        let rows = sqlx::query("SELECT body FROM threads ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        decode_all(rows)
    }

    async fn list_active_threads(&self, now: DateTime<Utc>) -> DomainResult<Vec<Thread>> {
        // The column holds whole milliseconds. Narrow with it, then apply the
        // exact predicate to the decoded documents.
        let rows = sqlx::query("SELECT body FROM threads WHERE expires_at >= ? ORDER BY created_at DESC")
            .bind(now.timestamp_millis())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        let threads: Vec<Thread> = decode_all(rows)?;
        Ok(threads.into_iter().filter(|t| t.is_active(now)).collect())
    }

    async fn list_threads_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Thread>> {
        // Membership lives in the document; filter after decoding.
        let threads = self.list_threads().await?;
        Ok(threads.into_iter().filter(|t| t.is_member(user_id)).collect())
    }

    async fn update_thread(&self, id: Uuid, mutation: Mutation<Thread>) -> DomainResult<Thread> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query("SELECT body FROM threads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| DomainError::not_found(EntityKind::Thread, id))?;
        let mut thread: Thread = decode(&row)?;
        mutation(&mut thread)?;

        sqlx::query("UPDATE threads SET expires_at = ?, body = ? WHERE id = ?")
            .bind(thread.expires_at.timestamp_millis())
            .bind(encode(&thread)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(thread)
    }

    async fn delete_thread(&self, id: Uuid) -> DomainResult<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GossipRepo for SqliteStore {
    async fn insert_gossip(&self, gossip: Gossip) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT INTO gossips (id, created_at, body) VALUES (?, ?, ?)")
            .bind(gossip.id.to_string())
            .bind(gossip.created_at.timestamp_millis())
            .bind(encode(&gossip)?)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_gossip(&self, id: Uuid) -> DomainResult<Option<Gossip>> {
        let row = sqlx::query("SELECT body FROM gossips WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(decode).transpose()
    }

    async fn list_gossips(&self) -> DomainResult<Vec<Gossip>> {
        let rows = sqlx::query("SELECT body FROM gossips ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        decode_all(rows)
    }

    async fn update_gossip(&self, id: Uuid, mutation: Mutation<Gossip>) -> DomainResult<Gossip> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query("SELECT body FROM gossips WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| DomainError::not_found(EntityKind::Gossip, id))?;
        let mut gossip: Gossip = decode(&row)?;
        mutation(&mut gossip)?;

        sqlx::query("UPDATE gossips SET body = ? WHERE id = ?")
            .bind(encode(&gossip)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(gossip)
    }

    async fn delete_gossip(&self, id: Uuid) -> DomainResult<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM gossips WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn insert_user(&self, user: User) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT INTO users (id, username_key, body) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(user.username.to_lowercase())
            .bind(encode(&user)?)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ConflictReason::UsernameTaken.into()
                } else {
                    storage_err(err)
                }
            })?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>> {
        let row = sqlx::query("SELECT body FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(decode).transpose()
    }

    async fn count_users(&self) -> DomainResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ReportRepo for SqliteStore {
    async fn insert_report(&self, report: CommentReport) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO reports (id, comment_id, reporter_id, created_at, body) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(report.id.to_string())
        .bind(report.comment_id.to_string())
        .bind(report.reporter_id.to_string())
        .bind(report.created_at.timestamp_millis())
        .bind(encode(&report)?)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ConflictReason::AlreadyReported.into()
            } else {
                storage_err(err)
            }
        })?;
        Ok(())
    }

    async fn list_reports(&self) -> DomainResult<Vec<CommentReport>> {
        let rows = sqlx::query("SELECT body FROM reports ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        decode_all(rows)
    }
}
