use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use crate::{
    config::NotificationConfig,
    notifications::Notifier,
    repository::OutboxRepository,
};

const BATCH_SIZE: i64 = 32;
const MAX_BACKOFF_SECS: i64 = 3600;

/// Drains the notification outbox on an interval. Delivery failures are
/// logged and rescheduled with exponential backoff; nothing here can ever
/// fail a booking or cancellation request.
pub struct OutboxWorker {
    outbox: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl OutboxWorker {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        notifier: Arc<dyn Notifier>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            outbox,
            notifier,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_secs));
            loop {
                ticker.tick().await;
                if let Err(e) = self.drain_once().await {
                    tracing::error!("Outbox drain failed: {:?}", e);
                }
            }
        })
    }

    pub async fn drain_once(&self) -> crate::error::Result<()> {
        let due = self.outbox.due(Utc::now(), BATCH_SIZE).await?;
        for task in due {
            if task.attempts >= self.config.max_attempts {
                // Park it far out instead of deleting, so operators can
                // still inspect and requeue by hand.
                tracing::warn!(
                    "Notification {} ({}) dropped after {} attempts: {:?}",
                    task.id,
                    task.kind,
                    task.attempts,
                    task.last_error
                );
                self.outbox
                    .mark_failed(task.id, "max attempts exceeded", Utc::now() + Duration::days(3650))
                    .await?;
                continue;
            }

            match self.notifier.deliver(&task).await {
                Ok(()) => {
                    self.outbox.mark_delivered(task.id).await?;
                    tracing::debug!(
                        "Delivered notification {} via {}",
                        task.id,
                        self.notifier.name()
                    );
                }
                Err(e) => {
                    let backoff = backoff_secs(self.config.backoff_base_secs, task.attempts);
                    tracing::warn!(
                        "Notification {} delivery failed (attempt {}): {:?}; retrying in {}s",
                        task.id,
                        task.attempts + 1,
                        e,
                        backoff
                    );
                    self.outbox
                        .mark_failed(
                            task.id,
                            &e.to_string(),
                            Utc::now() + Duration::seconds(backoff),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }
}

fn backoff_secs(base: i64, attempts: i64) -> i64 {
    let exponent = attempts.min(10) as u32;
    (base.saturating_mul(1_i64 << exponent)).min(MAX_BACKOFF_SECS)
}
