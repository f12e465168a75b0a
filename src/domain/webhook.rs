use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Idempotency ledger row for a provider-delivered event. `processed` flips
/// to true at most once, and only after the event's side effects are durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
