pub mod booking_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    cache::CacheInvalidator,
    config::BookingConfig,
    payments::{PaymentGateway, PaymentReconciler},
    repository::*,
};

pub use booking_service::{AvailabilityQuery, BookingService, CancellationResult};

/// Shared handle bundle passed to the API layer. Everything request handlers
/// touch hangs off this context; nothing lives in module-level state.
pub struct ServiceContext {
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub business_repo: Arc<dyn BusinessRepository>,
    pub blackout_repo: Arc<dyn BlackoutRepository>,
    pub webhook_repo: Arc<dyn WebhookEventRepository>,
    pub outbox_repo: Arc<dyn OutboxRepository>,
    pub booking_service: Arc<BookingService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        booking_config: BookingConfig,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let business_repo: Arc<dyn BusinessRepository> =
            Arc::new(SqliteBusinessRepository::new(db_pool.clone()));
        let blackout_repo: Arc<dyn BlackoutRepository> =
            Arc::new(SqliteBlackoutRepository::new(db_pool.clone()));
        let webhook_repo: Arc<dyn WebhookEventRepository> =
            Arc::new(SqliteWebhookEventRepository::new(db_pool.clone()));
        let outbox_repo: Arc<dyn OutboxRepository> =
            Arc::new(SqliteOutboxRepository::new(db_pool.clone()));

        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            business_repo.clone(),
            blackout_repo.clone(),
            payment_repo.clone(),
            outbox_repo.clone(),
            cache.clone(),
            gateway.clone(),
            booking_config,
        ));

        let reconciler = Arc::new(PaymentReconciler::new(
            webhook_repo.clone(),
            payment_repo.clone(),
            booking_repo.clone(),
            outbox_repo.clone(),
            cache,
        ));

        Self {
            booking_repo,
            payment_repo,
            business_repo,
            blackout_repo,
            webhook_repo,
            outbox_repo,
            booking_service,
            reconciler,
            db_pool,
        }
    }
}
