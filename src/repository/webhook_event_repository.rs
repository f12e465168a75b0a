use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::{
    domain::WebhookEventRecord,
    error::{AppError, Result},
    repository::WebhookEventRepository,
};

#[derive(FromRow)]
struct EventRow {
    event_id: String,
    event_type: String,
    processed: bool,
    created_at: NaiveDateTime,
    processed_at: Option<NaiveDateTime>,
}

pub struct SqliteWebhookEventRepository {
    pool: SqlitePool,
}

impl SqliteWebhookEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: EventRow) -> WebhookEventRecord {
        WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            processed: row.processed,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            processed_at: row
                .processed_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        }
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteWebhookEventRepository {
    async fn record_if_new(&self, event_id: &str, event_type: &str) -> Result<WebhookEventRecord> {
        // INSERT OR IGNORE against the primary key, then read back: two
        // concurrent deliveries of the same event both land on the same row,
        // and at most one of them will find processed = 0 work left to do.
        sqlx::query(
            "INSERT OR IGNORE INTO webhook_events (event_id, event_type, processed, created_at) VALUES (?, ?, 0, ?)",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let row = sqlx::query_as::<_, EventRow>(
            "SELECT event_id, event_type, processed, created_at, processed_at FROM webhook_events WHERE event_id = ?",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Self::row_to_record(row))
    }

    async fn mark_processed(&self, event_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET processed = 1, processed_at = ? WHERE event_id = ?",
        )
        .bind(Utc::now().naive_utc())
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
