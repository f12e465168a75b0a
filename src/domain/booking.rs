use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::PaymentMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub business_id: Uuid,
    pub resource_kind: ResourceKind,
    pub resource_id: Option<Uuid>,
    pub client_id: Uuid,
    pub service_id: Option<Uuid>,
    pub court_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    /// None means the duration comes from the linked service/court default.
    pub duration_minutes: Option<i64>,
    pub status: BookingStatus,
    pub paid: bool,
    pub payment_method: PaymentMethod,
    pub payment_status: BookingPaymentStatus,
    pub payment_reused: bool,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// End of the booked interval once the duration has been resolved
    /// through the fallback chain.
    pub fn end_at(&self, resolved_duration_minutes: i64) -> DateTime<Utc> {
        self.start_at + Duration::minutes(resolved_duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    PendingConsent,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceKind {
    Employee,
    Court,
    Unassigned,
}

/// Payment progress tracked on the booking row itself. A Failed payment
/// leaves the booking status untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingPaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub client_id: Uuid,
    pub business_id: Uuid,
    pub service_id: Option<Uuid>,
    pub court_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub paid: bool,
    /// Payment credit carried over from a previously cancelled booking.
    pub reuse_payment_id: Option<Uuid>,
}

/// Consent paperwork attached to a PendingConsent booking. Deleted together
/// with an unpaid booking when it is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
