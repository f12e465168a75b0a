use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{
        ActorContext, Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest,
        PaymentMethod, ResourceKind,
    },
    error::{AppError, Result},
    scheduling::Slot,
    service::{AvailabilityQuery, CancellationResult},
};

#[derive(Debug, Serialize)]
pub struct BookingDto {
    id: Uuid,
    business_id: Uuid,
    resource_kind: ResourceKind,
    resource_id: Option<Uuid>,
    client_id: Uuid,
    service_id: Option<Uuid>,
    court_id: Option<Uuid>,
    start_at: String,
    duration_minutes: Option<i64>,
    status: BookingStatus,
    paid: bool,
    payment_status: BookingPaymentStatus,
    payment_reused: bool,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            business_id: booking.business_id,
            resource_kind: booking.resource_kind,
            resource_id: booking.resource_id,
            client_id: booking.client_id,
            service_id: booking.service_id,
            court_id: booking.court_id,
            start_at: booking.start_at.to_rfc3339(),
            duration_minutes: booking.duration_minutes,
            status: booking.status,
            paid: booking.paid,
            payment_status: booking.payment_status,
            payment_reused: booking.payment_reused,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingDto {
    client_id: Uuid,
    business_id: Uuid,
    service_id: Option<Uuid>,
    court_id: Option<Uuid>,
    resource_id: Option<Uuid>,
    start: DateTime<Utc>,
    duration_minutes: Option<i64>,
    payment_method: PaymentMethod,
    #[serde(default)]
    paid: bool,
    reuse_payment_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(dto): Json<CreateBookingDto>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    // Clients book for themselves; staff may book on a client's behalf.
    if actor.role == crate::domain::ActorRole::Client && dto.client_id != actor.actor_id {
        return Err(AppError::Forbidden(
            "Cannot create a booking for another client".to_string(),
        ));
    }

    let request = CreateBookingRequest {
        client_id: dto.client_id,
        business_id: dto.business_id,
        service_id: dto.service_id,
        court_id: dto.court_id,
        resource_id: dto.resource_id,
        start_at: dto.start,
        duration_minutes: dto.duration_minutes,
        payment_method: dto.payment_method,
        paid: dto.paid,
        reuse_payment_id: dto.reuse_payment_id,
    };

    let booking = state
        .service_context
        .booking_service
        .create_booking(request)
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(_actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBookingDto {
    #[serde(default)]
    refund_payment: bool,
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelBookingDto>>,
) -> Result<Json<CancellationResult>> {
    let dto = body.map(|Json(dto)| dto).unwrap_or_default();
    let result = state
        .service_context
        .booking_service
        .cancel_booking(id, &actor, dto.refund_payment)
        .await?;

    Ok(Json(result))
}

pub async fn confirm_consent(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .confirm_consent(id, &actor)
        .await?;

    Ok(Json(booking.into()))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .complete_booking(id, &actor)
        .await?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    date: NaiveDate,
    service_id: Option<Uuid>,
    court_id: Option<Uuid>,
    resource_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    date: NaiveDate,
    slots: Vec<Slot>,
}

pub async fn availability(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>> {
    let slots = state
        .service_context
        .booking_service
        .availability(AvailabilityQuery {
            business_id,
            date: params.date,
            service_id: params.service_id,
            court_id: params.court_id,
            resource_id: params.resource_id,
        })
        .await?;

    Ok(Json(AvailabilityResponse {
        date: params.date,
        slots,
    }))
}
