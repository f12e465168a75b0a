use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::OutboxTask,
    error::{AppError, Result},
    repository::OutboxRepository,
};

#[derive(FromRow)]
struct OutboxRow {
    id: String,
    kind: String,
    payload: String,
    attempts: i64,
    next_attempt_at: NaiveDateTime,
    delivered_at: Option<NaiveDateTime>,
    last_error: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: OutboxRow) -> Result<OutboxTask> {
        Ok(OutboxTask {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            kind: row.kind,
            payload: serde_json::from_str(&row.payload)
                .map_err(|e| AppError::Database(format!("Invalid outbox payload: {}", e)))?,
            attempts: row.attempts,
            next_attempt_at: DateTime::from_naive_utc_and_offset(row.next_attempt_at, Utc),
            delivered_at: row
                .delivered_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            last_error: row.last_error,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<OutboxTask> {
        let task = OutboxTask {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            payload,
            attempts: 0,
            next_attempt_at: Utc::now(),
            delivered_at: None,
            last_error: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (id, kind, payload, attempts, next_attempt_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.kind)
        .bind(task.payload.to_string())
        .bind(task.attempts)
        .bind(task.next_attempt_at.naive_utc())
        .bind(task.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(task)
    }

    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxTask>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, kind, payload, attempts, next_attempt_at, delivered_at, last_error, created_at
            FROM notification_outbox
            WHERE delivered_at IS NULL AND next_attempt_at <= ?
            ORDER BY next_attempt_at
            LIMIT ?
            "#,
        )
        .bind(now.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_task).collect()
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notification_outbox SET delivered_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1, last_error = ?, next_attempt_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(next_attempt_at.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
