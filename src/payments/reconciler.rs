use std::sync::Arc;

use crate::{
    cache::CacheInvalidator,
    domain::PaymentStatus,
    error::{AppError, Result},
    notifications::Notification,
    repository::{BookingRepository, OutboxRepository, PaymentRepository, WebhookEventRepository},
};

/// A provider webhook event after signature verification, reduced to the
/// fields this core acts on.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub event_id: String,
    pub kind: ProviderEventKind,
    pub external_payment_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    PaymentSucceeded,
    PaymentFailed,
}

impl ProviderEventKind {
    fn as_str(&self) -> &'static str {
        match self {
            ProviderEventKind::PaymentSucceeded => "payment_intent.succeeded",
            ProviderEventKind::PaymentFailed => "payment_intent.payment_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    AlreadyProcessed,
}

/// Applies provider events to Payment and Booking records exactly once.
/// The webhook_events ledger gives at-most-once semantics across redeliveries;
/// the effects themselves stay idempotent so a crash between applying them
/// and writing the ledger is safe to retry.
pub struct PaymentReconciler {
    events: Arc<dyn WebhookEventRepository>,
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    outbox: Arc<dyn OutboxRepository>,
    cache: Arc<dyn CacheInvalidator>,
}

impl PaymentReconciler {
    pub fn new(
        events: Arc<dyn WebhookEventRepository>,
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        outbox: Arc<dyn OutboxRepository>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            events,
            payments,
            bookings,
            outbox,
            cache,
        }
    }

    pub async fn handle_event(&self, event: &ProviderEvent) -> Result<ReconcileOutcome> {
        let record = self
            .events
            .record_if_new(&event.event_id, event.kind.as_str())
            .await?;
        if record.processed {
            tracing::debug!("Webhook event {} already processed", event.event_id);
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        match event.kind {
            ProviderEventKind::PaymentSucceeded => self.apply_success(event).await?,
            ProviderEventKind::PaymentFailed => self.apply_failure(event).await?,
        }

        // The ledger write comes last: the effects above are already durable
        // when processed flips to true.
        self.events.mark_processed(&event.event_id).await?;
        Ok(ReconcileOutcome::Applied)
    }

    async fn apply_success(&self, event: &ProviderEvent) -> Result<()> {
        let payment = self
            .payments
            .find_by_external_id(&event.external_payment_id)
            .await?
            .ok_or_else(|| {
                // Internal (not a 4xx): the provider will redeliver, which is
                // exactly what we want if our payment row has not landed yet.
                AppError::Internal(format!(
                    "No payment for provider reference {}",
                    event.external_payment_id
                ))
            })?;

        let freshly_succeeded = match payment.status {
            PaymentStatus::Succeeded => false,
            PaymentStatus::Pending => self.payments.mark_succeeded(payment.id).await?,
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                tracing::warn!(
                    "Success event {} for payment {} in state {:?}; ignoring",
                    event.event_id,
                    payment.id,
                    payment.status
                );
                return Ok(());
            }
        };

        if let Some(booking_id) = payment.booking_id {
            // Idempotent: re-applies cleanly if a crash interrupted a
            // previous delivery between the payment and booking writes.
            self.bookings.mark_paid(booking_id).await?;

            if let Some(booking) = self.bookings.find_by_id(booking_id).await? {
                self.cache.invalidate_business(booking.business_id).await;
                if freshly_succeeded {
                    let notification = Notification::PaymentReceived {
                        booking_id,
                        client_id: booking.client_id,
                        amount_cents: payment.amount_cents,
                    };
                    if let Err(e) = self
                        .outbox
                        .enqueue(notification.kind(), notification.payload())
                        .await
                    {
                        tracing::error!("Failed to enqueue payment notification: {:?}", e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn apply_failure(&self, event: &ProviderEvent) -> Result<()> {
        let payment = self
            .payments
            .find_by_external_id(&event.external_payment_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "No payment for provider reference {}",
                    event.external_payment_id
                ))
            })?;

        match payment.status {
            PaymentStatus::Pending => {
                self.payments.mark_failed(payment.id).await?;
            }
            other => {
                tracing::debug!(
                    "Failure event {} for payment {} in state {:?}; nothing to do",
                    event.event_id,
                    payment.id,
                    other
                );
                return Ok(());
            }
        }

        // A failed payment marks the booking's payment state only; the
        // booking itself stays in place.
        if let Some(booking_id) = payment.booking_id {
            self.bookings.mark_payment_failed(booking_id).await?;
            if let Some(booking) = self.bookings.find_by_id(booking_id).await? {
                self.cache.invalidate_business(booking.business_id).await;
            }
        }

        Ok(())
    }
}
