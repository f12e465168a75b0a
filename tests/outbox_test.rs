mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bookwell::config::NotificationConfig;
use bookwell::domain::OutboxTask;
use bookwell::error::{AppError, Result};
use bookwell::notifications::{Notifier, OutboxWorker};
use chrono::Utc;
use common::*;

/// Notifier that can be flipped between succeeding and failing.
struct FlakyNotifier {
    fail: AtomicBool,
}

impl FlakyNotifier {
    fn new(fail: bool) -> Self {
        Self {
            fail: AtomicBool::new(fail),
        }
    }
}

#[async_trait]
impl Notifier for FlakyNotifier {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn deliver(&self, _task: &OutboxTask) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AppError::Upstream("relay unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn delivered_tasks_are_marked_and_not_redelivered() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.ctx
        .outbox_repo
        .enqueue("booking.confirmed", serde_json::json!({"booking_id": "b1"}))
        .await?;

    let worker = OutboxWorker::new(
        app.ctx.outbox_repo.clone(),
        Arc::new(FlakyNotifier::new(false)),
        NotificationConfig::default(),
    );
    worker.drain_once().await?;

    assert!(app.ctx.outbox_repo.due(Utc::now(), 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn failed_delivery_is_rescheduled_with_backoff() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let task = app
        .ctx
        .outbox_repo
        .enqueue("booking.cancelled", serde_json::json!({"booking_id": "b2"}))
        .await?;

    let worker = OutboxWorker::new(
        app.ctx.outbox_repo.clone(),
        Arc::new(FlakyNotifier::new(true)),
        NotificationConfig::default(),
    );
    worker.drain_once().await?;

    // Not due right now, but attempts and the error are recorded.
    assert!(app.ctx.outbox_repo.due(Utc::now(), 10).await?.is_empty());
    let row: (i64, Option<String>) = sqlx::query_as(
        "SELECT attempts, last_error FROM notification_outbox WHERE id = ?",
    )
    .bind(task.id.to_string())
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(row.0, 1);
    assert!(row.1.unwrap().contains("relay unavailable"));

    Ok(())
}
