use chrono::{DateTime, Duration, Utc};

use crate::{
    config::BookingConfig,
    domain::{ActorRole, Booking, BookingStatus},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PolicyDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether an actor may cancel a booking right now. Staff roles
/// bypass the time windows; clients are held to the cancellation cutoff,
/// tightened further once a reminder has gone out.
pub struct CancellationPolicy {
    client_cutoff: Duration,
    reminder_grace: Duration,
}

impl CancellationPolicy {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            client_cutoff: Duration::minutes(config.client_cancel_cutoff_minutes),
            reminder_grace: Duration::minutes(config.reminder_grace_minutes),
        }
    }

    pub fn can_cancel(
        &self,
        role: ActorRole,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> PolicyDecision {
        if booking.status == BookingStatus::Cancelled {
            return PolicyDecision::deny("booking is already cancelled");
        }
        if booking.status == BookingStatus::Completed {
            return PolicyDecision::deny("booking is already completed");
        }

        if role.is_staff() {
            return PolicyDecision::allow();
        }

        // Client window: up to `client_cutoff` before the start, and once a
        // reminder went out, no later than `reminder_grace` after it --
        // whichever deadline comes first.
        let mut deadline = booking.start_at - self.client_cutoff;
        if let Some(reminder_sent_at) = booking.reminder_sent_at {
            deadline = deadline.min(reminder_sent_at + self.reminder_grace);
        }

        if now <= deadline {
            PolicyDecision::allow()
        } else if booking.reminder_sent_at.is_some() {
            PolicyDecision::deny("cancellation window closed after reminder was sent")
        } else {
            PolicyDecision::deny("too close to the appointment start to cancel")
        }
    }
}
