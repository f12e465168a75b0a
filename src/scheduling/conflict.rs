use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    config::BookingConfig,
    domain::Booking,
    error::Result,
    repository::BookingRepository,
};

/// Half-open interval overlap: touching boundaries do not conflict.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Finds existing bookings colliding with a proposed interval on a resource.
/// The fetch window is padded by the maximum configured booking duration on
/// both sides; anything smaller can hide a long booking that started before
/// the window and still runs into it.
pub struct ConflictDetector {
    bookings: Arc<dyn BookingRepository>,
    config: BookingConfig,
}

impl ConflictDetector {
    pub fn new(bookings: Arc<dyn BookingRepository>, config: BookingConfig) -> Self {
        Self { bookings, config }
    }

    /// `resource_id` None means the proposed booking has no resource
    /// assigned; it then competes with the business's pool of other
    /// resource-less bookings.
    pub async fn find_conflicts(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let buffer = Duration::minutes(self.config.max_duration_minutes);
        let candidates = self
            .bookings
            .overlap_candidates(
                business_id,
                resource_id,
                start - buffer,
                end + buffer,
                exclude_booking_id,
            )
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|c| {
                let other_end = c
                    .booking
                    .end_at(c.resolved_duration(self.config.default_duration_minutes));
                intervals_overlap(start, end, c.booking.start_at, other_end)
            })
            .map(|c| c.booking)
            .collect())
    }
}
