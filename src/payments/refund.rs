use std::sync::Arc;

use crate::{
    domain::{ActorRole, Booking, Payment, PaymentMethod, PaymentStatus},
    payments::gateway::PaymentGateway,
    repository::PaymentRepository,
};

/// What a refund attempt came to. `performed` false with no error means the
/// refund was not applicable (not eligible, or already refunded); an error
/// means an attempt was made and failed, which never blocks the cancellation
/// that triggered it.
#[derive(Debug, Clone, Default)]
pub struct RefundOutcome {
    pub performed: bool,
    pub error: Option<String>,
}

impl RefundOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    fn performed() -> Self {
        Self {
            performed: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            performed: false,
            error: Some(error.into()),
        }
    }
}

pub struct RefundProcessor {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundProcessor {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { payments, gateway }
    }

    /// Client cancellations of paid card bookings refund automatically;
    /// staff cancellations refund only on explicit request; cash payments
    /// are never auto-refunded and stay available for credit reuse.
    fn eligible(
        booking: &Booking,
        payment: &Payment,
        actor: ActorRole,
        refund_requested: bool,
    ) -> bool {
        if !booking.paid {
            return false;
        }
        if payment.method != PaymentMethod::Card {
            tracing::info!(
                "Payment {} is not card-based; leaving it for credit reuse",
                payment.id
            );
            return false;
        }
        match actor {
            ActorRole::Client => true,
            ActorRole::BusinessOwner | ActorRole::Employee | ActorRole::PlatformAdmin => {
                refund_requested
            }
        }
    }

    pub async fn maybe_refund(
        &self,
        booking: &Booking,
        payment: Option<&Payment>,
        actor: ActorRole,
        refund_requested: bool,
    ) -> RefundOutcome {
        let Some(payment) = payment else {
            return RefundOutcome::skipped();
        };

        if !Self::eligible(booking, payment, actor, refund_requested) {
            return RefundOutcome::skipped();
        }

        // Local ledger already settled: repeating a refund is a no-op.
        if payment.status == PaymentStatus::Refunded {
            tracing::debug!("Payment {} already refunded locally", payment.id);
            return RefundOutcome::skipped();
        }

        let Some(external_id) = payment.external_payment_id.as_deref() else {
            return RefundOutcome::failed("card payment has no provider reference");
        };

        match self.refund_via_provider(payment, external_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Refund of payment {} failed: {}", payment.id, e);
                RefundOutcome::failed(e.to_string())
            }
        }
    }

    async fn refund_via_provider(
        &self,
        payment: &Payment,
        external_id: &str,
    ) -> crate::error::Result<RefundOutcome> {
        let intent = self.gateway.retrieve_intent(external_id).await?;
        if intent.latest_charge_id.is_none() {
            return Ok(RefundOutcome::failed(
                "payment intent has no charge to refund",
            ));
        }

        let charges = self.gateway.list_charges(external_id).await?;
        let Some(charge) = charges.first() else {
            return Ok(RefundOutcome::failed(
                "payment intent has no charge to refund",
            ));
        };

        // Provider-side idempotency: the charge may already be refunded even
        // if our ledger had not caught up yet.
        if charge.refunded {
            tracing::info!(
                "Charge {} already refunded at the provider; syncing ledger",
                charge.id
            );
            self.payments.mark_refunded(payment.id).await?;
            return Ok(RefundOutcome::skipped());
        }

        // Cap against both records so a unit or rounding mismatch between
        // them can never over-refund.
        let amount_cents = charge.amount_cents.min(payment.amount_cents);
        let refund = self.gateway.create_refund(external_id, amount_cents).await?;
        tracing::info!(
            "Refunded {} cents of payment {} (refund {})",
            refund.amount_cents,
            payment.id,
            refund.id
        );

        self.payments.mark_refunded(payment.id).await?;
        Ok(RefundOutcome::performed())
    }
}
