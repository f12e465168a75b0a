use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::CacheInvalidator,
    config::BookingConfig,
    domain::*,
    error::{AppError, Result},
    notifications::Notification,
    payments::{PaymentGateway, RefundProcessor},
    repository::{
        BlackoutRepository, BookingRepository, BusinessRepository, ConflictGuard,
        OutboxRepository, PaymentRepository,
    },
    scheduling::{
        available_slots, BusyInterval, CancellationPolicy, ConflictDetector, Slot, SlotContext,
    },
};

#[derive(Debug, Serialize)]
pub struct CancellationResult {
    pub success: bool,
    pub refund_performed: bool,
    pub refund_error: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub business_id: Uuid,
    pub date: NaiveDate,
    pub service_id: Option<Uuid>,
    pub court_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
}

/// Owns the booking lifecycle: creation behind the conflict/blackout gates
/// and cancellation behind the policy gate, with refunds and notifications
/// hanging off the cancel path.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    businesses: Arc<dyn BusinessRepository>,
    blackouts: Arc<dyn BlackoutRepository>,
    payments: Arc<dyn PaymentRepository>,
    outbox: Arc<dyn OutboxRepository>,
    cache: Arc<dyn CacheInvalidator>,
    conflicts: ConflictDetector,
    policy: CancellationPolicy,
    refunds: RefundProcessor,
    config: BookingConfig,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        businesses: Arc<dyn BusinessRepository>,
        blackouts: Arc<dyn BlackoutRepository>,
        payments: Arc<dyn PaymentRepository>,
        outbox: Arc<dyn OutboxRepository>,
        cache: Arc<dyn CacheInvalidator>,
        gateway: Arc<dyn PaymentGateway>,
        config: BookingConfig,
    ) -> Self {
        let conflicts = ConflictDetector::new(bookings.clone(), config.clone());
        let policy = CancellationPolicy::from_config(&config);
        let refunds = RefundProcessor::new(payments.clone(), gateway);
        Self {
            bookings,
            businesses,
            blackouts,
            payments,
            outbox,
            cache,
            conflicts,
            policy,
            refunds,
            config,
        }
    }

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if request.service_id.is_some() == request.court_id.is_some() {
            return Err(AppError::Validation(
                "Exactly one of service_id or court_id must be provided".to_string(),
            ));
        }

        let now = Utc::now();
        if request.start_at - now < Duration::minutes(self.config.min_lead_minutes) {
            return Err(AppError::Validation(format!(
                "Bookings must be placed at least {} minutes in advance",
                self.config.min_lead_minutes
            )));
        }

        let business = self
            .businesses
            .find_by_id(request.business_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;
        if business.status == BusinessStatus::Suspended {
            return Err(AppError::Forbidden(
                "Business is not accepting bookings".to_string(),
            ));
        }

        let (resource_kind, resource_id, default_duration) =
            self.resolve_resource(&request).await?;
        let duration_minutes = request.duration_minutes.unwrap_or(default_duration);
        if duration_minutes <= 0 || duration_minutes > self.config.max_duration_minutes {
            return Err(AppError::Validation(format!(
                "Booking duration must be between 1 and {} minutes",
                self.config.max_duration_minutes
            )));
        }

        let start = request.start_at;
        let end = start + Duration::minutes(duration_minutes);

        let colliders = self
            .conflicts
            .find_conflicts(business.id, resource_id, start, end, None)
            .await?;
        if !colliders.is_empty() {
            let ids: Vec<String> = colliders.iter().map(|b| b.id.to_string()).collect();
            return Err(AppError::Conflict(format!(
                "Requested time overlaps existing booking(s): {}",
                ids.join(", ")
            )));
        }

        self.check_blackouts(business.id, resource_id, start, end)
            .await?;

        if let Some(payment_id) = request.reuse_payment_id {
            self.check_reusable_payment(payment_id, request.client_id)
                .await?;
        }

        let status = if business.requires_consent {
            BookingStatus::PendingConsent
        } else {
            BookingStatus::Confirmed
        };

        let booking = Booking {
            id: Uuid::new_v4(),
            business_id: business.id,
            resource_kind,
            resource_id,
            client_id: request.client_id,
            service_id: request.service_id,
            court_id: request.court_id,
            start_at: start,
            duration_minutes: Some(duration_minutes),
            status,
            paid: request.paid,
            payment_method: request.payment_method,
            payment_status: if request.paid {
                BookingPaymentStatus::Paid
            } else {
                BookingPaymentStatus::Pending
            },
            payment_reused: request.reuse_payment_id.is_some(),
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        };

        let consent = business.requires_consent.then(|| ConsentRecord {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            signed_at: None,
            created_at: now,
        });

        // The repository re-verifies conflicts under the write lock before
        // inserting, so a request racing us cannot slip an overlap in
        // between the check above and this insert.
        let created = self
            .bookings
            .create_exclusive(
                booking,
                consent,
                request.reuse_payment_id,
                ConflictGuard {
                    buffer_minutes: self.config.max_duration_minutes,
                    default_duration_minutes: self.config.default_duration_minutes,
                },
            )
            .await?;

        self.cache.invalidate_business(business.id).await;
        if created.status == BookingStatus::Confirmed {
            self.enqueue(Notification::BookingConfirmed {
                booking_id: created.id,
                client_id: created.client_id,
                start_at: created.start_at,
            })
            .await;
        }

        Ok(created)
    }

    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor: &ActorContext,
        refund_requested: bool,
    ) -> Result<CancellationResult> {
        let mut booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if actor.role == ActorRole::Client && booking.client_id != actor.actor_id {
            return Err(AppError::Forbidden(
                "Cannot cancel another client's booking".to_string(),
            ));
        }

        let decision = self.policy.can_cancel(actor.role, &booking, Utc::now());
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "Cancellation not permitted".to_string());
            // Terminal states surface as conflicts; open-window violations
            // are plain validation failures.
            return match booking.status {
                BookingStatus::Cancelled | BookingStatus::Completed => {
                    Err(AppError::Conflict(reason))
                }
                _ => Err(AppError::Validation(reason)),
            };
        }

        // Conditional transition: the number of rows actually touched
        // decides whether refund/notification logic runs, so two racing
        // cancels cannot both get here with effects.
        let transitioned = if booking.paid {
            self.bookings.cancel_retaining(booking.id).await?
        } else {
            self.bookings.delete_with_consent(booking.id).await?
        };
        if !transitioned {
            return Err(AppError::Conflict("Booking is already cancelled".to_string()));
        }
        booking.status = BookingStatus::Cancelled;

        let payment = self.payments.find_by_booking(booking.id).await?;
        let refund = self
            .refunds
            .maybe_refund(&booking, payment.as_ref(), actor.role, refund_requested)
            .await;
        if let Some(ref error) = refund.error {
            tracing::warn!(
                "Refund for cancelled booking {} failed: {}",
                booking.id,
                error
            );
        }

        self.cache.invalidate_business(booking.business_id).await;
        self.enqueue(Notification::BookingCancelled {
            booking_id: booking.id,
            client_id: booking.client_id,
            refund_performed: refund.performed,
            refund_error: refund.error.clone(),
        })
        .await;

        let message = match (refund.performed, &refund.error) {
            (true, _) => "Booking cancelled; refund issued".to_string(),
            (false, Some(e)) => format!("Booking cancelled; refund failed: {}", e),
            (false, None) if booking.paid => {
                "Booking cancelled; payment held as credit".to_string()
            }
            (false, None) => "Booking cancelled".to_string(),
        };

        Ok(CancellationResult {
            success: true,
            refund_performed: refund.performed,
            refund_error: refund.error,
            message,
        })
    }

    pub async fn availability(&self, query: AvailabilityQuery) -> Result<Vec<Slot>> {
        let business = self
            .businesses
            .find_by_id(query.business_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;

        if query.service_id.is_some() == query.court_id.is_some() {
            return Err(AppError::Validation(
                "Exactly one of service_id or court_id must be provided".to_string(),
            ));
        }

        let (granularity, duration, resource_id) = if let Some(service_id) = query.service_id {
            let service = self.find_business_service(business.id, service_id).await?;
            if let Some(employee_id) = query.resource_id {
                self.find_business_employee(business.id, employee_id).await?;
            }
            (
                self.config.service_slot_minutes,
                service.duration_minutes,
                query.resource_id,
            )
        } else if let Some(court_id) = query.court_id {
            let court = self.find_business_court(business.id, court_id).await?;
            (
                self.config.court_slot_minutes,
                court.duration_minutes,
                Some(court.id),
            )
        } else {
            return Err(AppError::Validation(
                "Exactly one of service_id or court_id must be provided".to_string(),
            ));
        };

        let schedule = self
            .businesses
            .week_schedule(business.id, resource_id)
            .await?;
        let blackouts = self
            .blackouts
            .find_overlapping(business.id, resource_id, query.date, query.date)
            .await?;

        let day_start = query
            .date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let day_end = day_start + Duration::days(1);
        let buffer = Duration::minutes(self.config.max_duration_minutes);
        let busy: Vec<BusyInterval> = self
            .bookings
            .overlap_candidates(
                business.id,
                resource_id,
                day_start - buffer,
                day_end + buffer,
                None,
            )
            .await?
            .into_iter()
            .map(|c| {
                let end = c
                    .booking
                    .end_at(c.resolved_duration(self.config.default_duration_minutes));
                BusyInterval {
                    start: c.booking.start_at,
                    end,
                }
            })
            .collect();

        let ctx = SlotContext {
            date: query.date,
            now: Utc::now(),
            duration_minutes: duration,
            granularity_minutes: granularity,
            min_lead_minutes: self.config.min_lead_minutes,
            resource_id,
            schedule: &schedule,
            blackouts: &blackouts,
            busy: &busy,
        };
        Ok(available_slots(&ctx).collect())
    }

    /// PendingConsent -> Confirmed once the consent form is signed.
    pub async fn confirm_consent(
        &self,
        booking_id: Uuid,
        actor: &ActorContext,
    ) -> Result<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if actor.role == ActorRole::Client && booking.client_id != actor.actor_id {
            return Err(AppError::Forbidden(
                "Cannot sign consent for another client's booking".to_string(),
            ));
        }

        let transitioned = self
            .bookings
            .confirm_with_consent(booking_id, Utc::now())
            .await?;
        if !transitioned {
            return Err(AppError::Conflict(
                "Booking is not awaiting consent".to_string(),
            ));
        }

        self.cache.invalidate_business(booking.business_id).await;
        self.enqueue(Notification::BookingConfirmed {
            booking_id: booking.id,
            client_id: booking.client_id,
            start_at: booking.start_at,
        })
        .await;

        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve confirmed booking".to_string()))
    }

    /// Confirmed -> Completed, a staff-only action after the appointment
    /// took place. Terminal states cannot be completed.
    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        actor: &ActorContext,
    ) -> Result<Booking> {
        if !actor.role.is_staff() {
            return Err(AppError::Forbidden(
                "Only staff may mark a booking completed".to_string(),
            ));
        }

        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let transitioned = self.bookings.complete(booking_id).await?;
        if !transitioned {
            return Err(AppError::Conflict(
                "Only a confirmed booking can be completed".to_string(),
            ));
        }

        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve completed booking".to_string()))
    }

    async fn resolve_resource(
        &self,
        request: &CreateBookingRequest,
    ) -> Result<(ResourceKind, Option<Uuid>, i64)> {
        if let Some(service_id) = request.service_id {
            let service = self
                .find_business_service(request.business_id, service_id)
                .await?;
            match request.resource_id {
                Some(employee_id) => {
                    self.find_business_employee(request.business_id, employee_id)
                        .await?;
                    Ok((
                        ResourceKind::Employee,
                        Some(employee_id),
                        service.duration_minutes,
                    ))
                }
                None => Ok((ResourceKind::Unassigned, None, service.duration_minutes)),
            }
        } else if let Some(court_id) = request.court_id {
            let court = self.find_business_court(request.business_id, court_id).await?;
            Ok((ResourceKind::Court, Some(court.id), court.duration_minutes))
        } else {
            Err(AppError::Validation(
                "Exactly one of service_id or court_id must be provided".to_string(),
            ))
        }
    }

    async fn find_business_service(
        &self,
        business_id: Uuid,
        service_id: Uuid,
    ) -> Result<ServiceOffering> {
        let service = self
            .businesses
            .find_service(service_id)
            .await?
            .filter(|s| s.business_id == business_id)
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
        Ok(service)
    }

    async fn find_business_court(&self, business_id: Uuid, court_id: Uuid) -> Result<Court> {
        let court = self
            .businesses
            .find_court(court_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or_else(|| AppError::NotFound("Court not found".to_string()))?;
        Ok(court)
    }

    async fn find_business_employee(
        &self,
        business_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Employee> {
        let employee = self
            .businesses
            .find_employee(employee_id)
            .await?
            .filter(|e| e.business_id == business_id)
            .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;
        Ok(employee)
    }

    async fn check_blackouts(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let periods = self
            .blackouts
            .find_overlapping(
                business_id,
                resource_id,
                start.date_naive(),
                end.date_naive(),
            )
            .await?;
        let blocking = periods
            .iter()
            .find(|p| p.applies_to(resource_id) && p.overlaps(start, end));
        if let Some(period) = blocking {
            return Err(AppError::Conflict(format!(
                "Requested time falls in a blackout period ({} to {})",
                period.start_date, period.end_date
            )));
        }
        Ok(())
    }

    async fn check_reusable_payment(&self, payment_id: Uuid, client_id: Uuid) -> Result<()> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        if payment.client_id != client_id {
            return Err(AppError::Forbidden(
                "Payment belongs to another client".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::Conflict(
                "Payment is not available for reuse".to_string(),
            ));
        }
        if payment.reused {
            return Err(AppError::Conflict(
                "Payment credit has already been used".to_string(),
            ));
        }
        Ok(())
    }

    async fn enqueue(&self, notification: Notification) {
        // Outbox failures are logged, never propagated: a notification can
        // not fail the booking operation that produced it.
        if let Err(e) = self
            .outbox
            .enqueue(notification.kind(), notification.payload())
            .await
        {
            tracing::error!("Failed to enqueue notification: {:?}", e);
        }
    }
}
