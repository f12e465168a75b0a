use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A date range during which no bookings may be placed. `resource_id` is
/// None for business-wide holidays and set for a single employee or court.
/// Both end dates are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub id: Uuid,
    pub business_id: Uuid,
    pub resource_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlackoutPeriod {
    /// True when the booking interval [start, end) touches any part of the
    /// blacked-out days.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let blackout_start = self
            .start_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let blackout_end = (self.end_date + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        start < blackout_end && end > blackout_start
    }

    /// Whether this period applies to the given resource: business-wide
    /// periods apply to everything, scoped periods only to their resource.
    pub fn applies_to(&self, resource_id: Option<Uuid>) -> bool {
        match self.resource_id {
            None => true,
            Some(scoped) => resource_id == Some(scoped),
        }
    }
}
