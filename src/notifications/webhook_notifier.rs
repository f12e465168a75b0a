use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::OutboxTask,
    error::{AppError, Result},
    notifications::Notifier,
};

/// Delivers notifications by POSTing them to a configured endpoint,
/// typically an SMS/email relay owned by the notification team.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, task: &OutboxTask) -> Result<()> {
        let body = json!({
            "id": task.id,
            "kind": task.kind,
            "payload": task.payload,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Notification POST failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Notification endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
