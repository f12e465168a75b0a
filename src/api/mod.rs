pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // API routes
        .nest("/api", api_routes())
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/bookings", booking_routes())
        // Availability is a public read; no actor identity required.
        .route(
            "/businesses/:id/availability",
            get(handlers::bookings::availability),
        )
        // Provider webhook: authenticated by signature, not by actor headers.
        .route(
            "/payments/webhook/stripe",
            post(handlers::webhooks::stripe_webhook),
        )
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::bookings::create))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/cancel", post(handlers::bookings::cancel))
        .route("/:id/consent", post(handlers::bookings::confirm_consent))
        .route("/:id/complete", post(handlers::bookings::complete))
        .route_layer(axum::middleware::from_fn(middleware::actor::require_actor))
}
