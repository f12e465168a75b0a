use axum::{extract::State, http::HeaderMap, Json};
use serde_json::json;

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::parse_webhook_event,
};

/// Provider webhook ingress. The signature is verified against the raw
/// request body before anything is parsed or acted on; an already-processed
/// event is acknowledged exactly like a fresh one so the provider stops
/// retrying, while a processing failure bubbles up as a 5xx to trigger a
/// redelivery.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>> {
    let secret = state
        .settings
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal("Stripe webhook secret not configured".to_string()))?;

    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;

    if let Some(event) = parse_webhook_event(&body, signature, secret)? {
        state.service_context.reconciler.handle_event(&event).await?;
    }

    Ok(Json(json!({ "received": true })))
}
