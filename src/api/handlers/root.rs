use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Bookwell API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Appointment booking and payment reconciliation service",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "bookings": "/api/bookings",
            "availability": "/api/businesses/:id/availability",
            "webhooks": "/api/payments/webhook/stripe"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
