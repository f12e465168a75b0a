use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A queued notification. Enqueued after the primary transaction commits;
/// a background worker delivers it with retry and backoff, so delivery can
/// never roll back or delay a booking operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxTask {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
