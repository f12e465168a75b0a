use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::domain::OutboxTask;
use crate::error::Result;

pub mod outbox_worker;
pub mod webhook_notifier;

pub use outbox_worker::OutboxWorker;
pub use webhook_notifier::WebhookNotifier;

/// Client-facing notifications this core emits. They are enqueued to the
/// outbox after the primary transaction commits and delivered out of band.
#[derive(Debug, Clone)]
pub enum Notification {
    BookingConfirmed {
        booking_id: Uuid,
        client_id: Uuid,
        start_at: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: Uuid,
        client_id: Uuid,
        refund_performed: bool,
        refund_error: Option<String>,
    },
    PaymentReceived {
        booking_id: Uuid,
        client_id: Uuid,
        amount_cents: i64,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BookingConfirmed { .. } => "booking.confirmed",
            Notification::BookingCancelled { .. } => "booking.cancelled",
            Notification::PaymentReceived { .. } => "payment.received",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Notification::BookingConfirmed {
                booking_id,
                client_id,
                start_at,
            } => json!({
                "booking_id": booking_id,
                "client_id": client_id,
                "start_at": start_at.to_rfc3339(),
            }),
            Notification::BookingCancelled {
                booking_id,
                client_id,
                refund_performed,
                refund_error,
            } => json!({
                "booking_id": booking_id,
                "client_id": client_id,
                "refund_performed": refund_performed,
                "refund_error": refund_error,
            }),
            Notification::PaymentReceived {
                booking_id,
                client_id,
                amount_cents,
            } => json!({
                "booking_id": booking_id,
                "client_id": client_id,
                "amount_cents": amount_cents,
            }),
        }
    }
}

/// Delivery boundary. Implementations must tolerate repeated delivery of the
/// same task; the worker retries on failure.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, task: &OutboxTask) -> Result<()>;
}

/// Fallback for deployments without a delivery channel configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, task: &OutboxTask) -> Result<()> {
        tracing::info!(
            "Notification {} ({}): {}",
            task.id,
            task.kind,
            task.payload
        );
        Ok(())
    }
}
