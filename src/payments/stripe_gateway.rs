use std::future::Future;
use std::time::Duration;

use stripe::{
    Charge, Client, CreateRefund, EventObject, EventType, ListCharges, PaymentIntent,
    PaymentIntentId, Refund, Webhook, WebhookError,
};

use crate::{
    error::{AppError, Result},
    payments::gateway::{ChargeView, IntentView, PaymentGateway, RefundView},
    payments::reconciler::{ProviderEvent, ProviderEventKind},
};

pub struct StripeGateway {
    client: Client,
    timeout: Duration,
}

impl StripeGateway {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(api_key),
            timeout,
        }
    }

    fn parse_intent_id(payment_intent_id: &str) -> Result<PaymentIntentId> {
        payment_intent_id
            .parse::<PaymentIntentId>()
            .map_err(|e| AppError::Validation(format!("Invalid payment intent id: {}", e)))
    }

    /// Bounds a provider call. Running out the clock is a failure like any
    /// other provider failure, never an implicit success.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, stripe::StripeError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Upstream(format!("Stripe {} failed: {}", operation, e))),
            Err(_) => Err(AppError::Upstream(format!(
                "Stripe {} timed out after {:?}",
                operation, self.timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    async fn retrieve_intent(&self, payment_intent_id: &str) -> Result<IntentView> {
        let id = Self::parse_intent_id(payment_intent_id)?;
        let intent = self
            .bounded(
                "retrieve_intent",
                PaymentIntent::retrieve(&self.client, &id, &[]),
            )
            .await?;

        Ok(IntentView {
            id: intent.id.to_string(),
            amount_cents: intent.amount,
            latest_charge_id: intent.latest_charge.map(|c| c.id().to_string()),
        })
    }

    async fn list_charges(&self, payment_intent_id: &str) -> Result<Vec<ChargeView>> {
        let id = Self::parse_intent_id(payment_intent_id)?;
        let mut params = ListCharges::new();
        params.payment_intent = Some(id);
        let charges = self
            .bounded("list_charges", Charge::list(&self.client, &params))
            .await?;

        Ok(charges
            .data
            .into_iter()
            .map(|charge| ChargeView {
                id: charge.id.to_string(),
                amount_cents: charge.amount,
                refunded: charge.refunded,
            })
            .collect())
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
    ) -> Result<RefundView> {
        let id = Self::parse_intent_id(payment_intent_id)?;
        let mut params = CreateRefund::new();
        params.payment_intent = Some(id);
        params.amount = Some(amount_cents);
        let refund = self
            .bounded("create_refund", Refund::create(&self.client, params))
            .await?;

        Ok(RefundView {
            id: refund.id.to_string(),
            amount_cents: refund.amount,
        })
    }
}

/// Verifies the signature over the raw payload (never a re-serialized form)
/// and maps the provider event onto the reconciler's input. Returns None for
/// event types this core does not act on.
pub fn parse_webhook_event(
    payload: &str,
    signature: &str,
    webhook_secret: &str,
) -> Result<Option<ProviderEvent>> {
    let event = Webhook::construct_event(payload, signature, webhook_secret).map_err(
        |e| match e {
            WebhookError::BadSignature => {
                AppError::Validation("Invalid webhook signature".to_string())
            }
            _ => AppError::Validation(format!("Malformed webhook event: {}", e)),
        },
    )?;

    let kind = match event.type_ {
        EventType::PaymentIntentSucceeded => ProviderEventKind::PaymentSucceeded,
        EventType::PaymentIntentPaymentFailed => ProviderEventKind::PaymentFailed,
        _ => {
            tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
            return Ok(None);
        }
    };

    match event.data.object {
        EventObject::PaymentIntent(intent) => Ok(Some(ProviderEvent {
            event_id: event.id.to_string(),
            kind,
            external_payment_id: intent.id.to_string(),
        })),
        other => {
            tracing::warn!("Payment event carried unexpected object: {:?}", other);
            Ok(None)
        }
    }
}
