use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod blackout_repository;
pub mod booking_repository;
pub mod business_repository;
pub mod outbox_repository;
pub mod payment_repository;
pub mod webhook_event_repository;

pub use blackout_repository::SqliteBlackoutRepository;
pub use booking_repository::SqliteBookingRepository;
pub use business_repository::SqliteBusinessRepository;
pub use outbox_repository::SqliteOutboxRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use webhook_event_repository::SqliteWebhookEventRepository;

/// Scope of the conflict-candidate fetch. The buffer is derived from the
/// maximum configured booking duration; undersizing it hides true conflicts.
#[derive(Debug, Clone, Copy)]
pub struct ConflictGuard {
    pub buffer_minutes: i64,
    pub default_duration_minutes: i64,
}

/// A stored booking together with the default durations of its linked
/// service/court, so callers can resolve the effective interval without a
/// second round trip.
#[derive(Debug, Clone)]
pub struct OverlapCandidate {
    pub booking: Booking,
    pub service_default_minutes: Option<i64>,
    pub court_default_minutes: Option<i64>,
}

impl OverlapCandidate {
    /// Fallback chain: explicit duration, linked service/court default,
    /// business default.
    pub fn resolved_duration(&self, business_default_minutes: i64) -> i64 {
        self.booking
            .duration_minutes
            .or(self.service_default_minutes)
            .or(self.court_default_minutes)
            .unwrap_or(business_default_minutes)
    }
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    /// Non-cancelled bookings for the given resource slot (None = the pool
    /// of resource-less bookings) whose start lies within
    /// [window_start, window_end].
    async fn overlap_candidates(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Vec<OverlapCandidate>>;
    /// Insert the booking after re-verifying, under an exclusive write
    /// transaction, that no overlapping booking exists. Creates the consent
    /// record and flags the reused payment in the same transaction.
    async fn create_exclusive(
        &self,
        booking: Booking,
        consent: Option<ConsentRecord>,
        reuse_payment_id: Option<Uuid>,
        guard: ConflictGuard,
    ) -> Result<Booking>;
    /// Transition to Cancelled, keeping the row. Returns false when the
    /// booking was already cancelled (a concurrent cancel won the race).
    async fn cancel_retaining(&self, id: Uuid) -> Result<bool>;
    /// Remove an unpaid booking and its consent record in one transaction.
    /// Returns false when another cancel got there first.
    async fn delete_with_consent(&self, id: Uuid) -> Result<bool>;
    async fn mark_paid(&self, id: Uuid) -> Result<()>;
    async fn mark_payment_failed(&self, id: Uuid) -> Result<()>;
    async fn set_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// PendingConsent -> Confirmed, stamping the consent record, in one
    /// transaction. Returns false when the booking was not awaiting consent.
    async fn confirm_with_consent(&self, id: Uuid, signed_at: DateTime<Utc>) -> Result<bool>;
    /// Confirmed -> Completed. Returns false for any other current state.
    async fn complete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Payment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    /// Pending -> Succeeded. Returns false when the payment was not Pending
    /// (already settled one way or the other).
    async fn mark_succeeded(&self, id: Uuid) -> Result<bool>;
    /// Pending -> Failed, same contract as `mark_succeeded`.
    async fn mark_failed(&self, id: Uuid) -> Result<bool>;
    /// Succeeded -> Refunded, the only post-success transition. Returns
    /// false when the payment was not Succeeded, which makes a repeated
    /// refund a no-op.
    async fn mark_refunded(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Insert the event on first sight, or return the existing row. Safe
    /// under concurrent deliveries of the same event_id.
    async fn record_if_new(&self, event_id: &str, event_type: &str) -> Result<WebhookEventRecord>;
    async fn mark_processed(&self, event_id: &str) -> Result<()>;
}

#[async_trait]
pub trait BlackoutRepository: Send + Sync {
    async fn create(&self, period: BlackoutPeriod) -> Result<BlackoutPeriod>;
    /// Business-wide and resource-scoped periods whose date range touches
    /// [start_date, end_date] for the given resource.
    async fn find_overlapping(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BlackoutPeriod>>;
}

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn create(&self, business: Business) -> Result<Business>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Business>>;
    async fn create_service(&self, service: ServiceOffering) -> Result<ServiceOffering>;
    async fn find_service(&self, id: Uuid) -> Result<Option<ServiceOffering>>;
    async fn create_court(&self, court: Court) -> Result<Court>;
    async fn find_court(&self, id: Uuid) -> Result<Option<Court>>;
    async fn create_employee(&self, employee: Employee) -> Result<Employee>;
    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>>;
    async fn upsert_day_schedule(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        weekday: chrono::Weekday,
        schedule: DaySchedule,
    ) -> Result<()>;
    /// Resource-scoped schedule when one exists, business-wide otherwise.
    async fn week_schedule(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> Result<WeekSchedule>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<OutboxTask>;
    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxTask>>;
    async fn mark_delivered(&self, id: Uuid) -> Result<()>;
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;
}
