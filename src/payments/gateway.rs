use async_trait::async_trait;

use crate::error::Result;

/// Payment-provider boundary. Implementations own their transport and must
/// bound every call with a timeout; a timeout surfaces as an Upstream error,
/// never as implicit success.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_intent(&self, payment_intent_id: &str) -> Result<IntentView>;
    async fn list_charges(&self, payment_intent_id: &str) -> Result<Vec<ChargeView>>;
    async fn create_refund(&self, payment_intent_id: &str, amount_cents: i64)
        -> Result<RefundView>;
}

/// Provider payment-intent fields this core acts on, fully enumerated.
#[derive(Debug, Clone)]
pub struct IntentView {
    pub id: String,
    pub amount_cents: i64,
    pub latest_charge_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChargeView {
    pub id: String,
    pub amount_cents: i64,
    pub refunded: bool,
}

#[derive(Debug, Clone)]
pub struct RefundView {
    pub id: String,
    pub amount_cents: i64,
}

/// Stand-in for deployments without provider credentials. Every call fails
/// with an Upstream error, which the refund path reports without blocking
/// the cancellation itself.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn retrieve_intent(&self, _payment_intent_id: &str) -> Result<IntentView> {
        Err(crate::error::AppError::Upstream(
            "Payment provider is not configured".to_string(),
        ))
    }

    async fn list_charges(&self, _payment_intent_id: &str) -> Result<Vec<ChargeView>> {
        Err(crate::error::AppError::Upstream(
            "Payment provider is not configured".to_string(),
        ))
    }

    async fn create_refund(
        &self,
        _payment_intent_id: &str,
        _amount_cents: i64,
    ) -> Result<RefundView> {
        Err(crate::error::AppError::Upstream(
            "Payment provider is not configured".to_string(),
        ))
    }
}
