//! SQLite turn store.
//!
//! One `turns` table, one row per turn. The integer primary key preserves
//! insertion order, which is the store-natural order reads return.
//! Timestamps are stored as RFC 3339 text with nanosecond precision so a
//! written turn reads back unchanged.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use skald_core::{RecordBatch, RejectedRecord, Role, StoreError, Turn, TurnStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A production SQLite turn store.
pub struct SqliteTurnStore {
    pool: SqlitePool,
}

impl SqliteTurnStore {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        if let Some(dir) = options.get_filename().parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Unavailable(format!("Cannot create {}: {e}", dir.display()))
                })?;
            }
        }

        // Every connection to `:memory:` is a separate database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(url, "SQLite turn store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL DEFAULT '',
                timestamp   TEXT NOT NULL,
                user_id     TEXT NOT NULL DEFAULT '',
                image       TEXT,
                image_name  TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_chat_id ON turns(chat_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("chat_id index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_user_id ON turns(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("user_id index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `Turn` from a row. Errors become rejected records, not read failures.
    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, String> {
        let chat_id: String = row
            .try_get("chat_id")
            .map_err(|e| format!("chat_id column: {e}"))?;
        let role: String = row.try_get("role").map_err(|e| format!("role column: {e}"))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| format!("content column: {e}"))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| format!("timestamp column: {e}"))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| format!("user_id column: {e}"))?;
        let image: Option<String> = row
            .try_get("image")
            .map_err(|e| format!("image column: {e}"))?;
        let image_name: Option<String> = row
            .try_get("image_name")
            .map_err(|e| format!("image_name column: {e}"))?;

        if chat_id.is_empty() {
            return Err("empty chat_id".into());
        }

        let role = Role::from_str(&role)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("timestamp '{timestamp}': {e}"))?;

        Ok(Turn {
            chat_id,
            role,
            content,
            timestamp,
            user_id,
            image,
            image_name,
        })
    }

    async fn find_where(&self, column: &str, value: &str) -> Result<RecordBatch, StoreError> {
        // `column` is always one of our own identifiers, never caller input
        let sql = format!("SELECT * FROM turns WHERE {column} = ?1 ORDER BY iid ASC");
        let rows = sqlx::query(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("SELECT by {column}: {e}")))?;

        let mut batch = RecordBatch::default();
        for (position, row) in rows.iter().enumerate() {
            match Self::row_to_turn(row) {
                Ok(turn) => batch.turns.push(turn),
                Err(reason) => batch.rejected.push(RejectedRecord { position, reason }),
            }
        }
        Ok(batch)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[async_trait]
impl TurnStore for SqliteTurnStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_by_chat(&self, chat_id: &str) -> Result<RecordBatch, StoreError> {
        self.find_where("chat_id", chat_id).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<RecordBatch, StoreError> {
        self.find_where("user_id", user_id).await
    }

    async fn insert_many(&self, turns: &[Turn]) -> Result<(), StoreError> {
        if turns.iter().any(|t| t.chat_id.is_empty()) {
            return Err(StoreError::WriteFailed("turn has an empty chat_id".into()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("BEGIN failed: {e}")))?;

        for turn in turns {
            sqlx::query(
                r#"
                INSERT INTO turns (chat_id, role, content, timestamp, user_id, image, image_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&turn.chat_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(format_timestamp(&turn.timestamp))
            .bind(&turn.user_id)
            .bind(&turn.image)
            .bind(&turn.image_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("COMMIT failed: {e}")))?;

        debug!(count = turns.len(), "Stored turns");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("ping: {e}")))?;
        Ok(())
    }
}
