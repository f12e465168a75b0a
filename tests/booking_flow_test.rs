mod common;

use bookwell::domain::*;
use bookwell::error::AppError;
use chrono::{Duration, Utc};
use common::*;
use uuid::Uuid;

#[tokio::test]
async fn overlapping_bookings_on_same_employee_are_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let e1 = app.employee(business.id).await?;
    let e2 = app.employee(business.id).await?;
    let client = Uuid::new_v4();

    // E1 booked 10:00-11:00.
    let start = future_start(30, 10);
    app.ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(e1.id),
            start,
        ))
        .await?;

    // E1 at 10:30-11:30 collides.
    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(e1.id),
            start + Duration::minutes(30),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    // E2 at 10:30-11:30 is free.
    app.ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(e2.id),
            start + Duration::minutes(30),
        ))
        .await?;

    Ok(())
}

#[tokio::test]
async fn touching_intervals_do_not_conflict() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let employee = app.employee(business.id).await?;
    let client = Uuid::new_v4();
    let start = future_start(30, 10);

    app.ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(employee.id),
            start,
        ))
        .await?;

    // Back-to-back at 11:00 is fine under the half-open rule.
    app.ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(employee.id),
            start + Duration::hours(1),
        ))
        .await?;

    Ok(())
}

#[tokio::test]
async fn resource_less_bookings_conflict_within_their_pool() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();
    let start = future_start(30, 10);

    app.ctx
        .booking_service
        .create_booking(booking_request(client, business.id, service.id, None, start))
        .await?;

    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            start + Duration::minutes(30),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn stored_booking_without_duration_falls_back_to_service_default() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 90).await?;
    let employee = app.employee(business.id).await?;
    let client = Uuid::new_v4();
    let start = future_start(30, 10);

    // Simulate a legacy row with no explicit duration.
    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(employee.id),
            start,
        ))
        .await?;
    sqlx::query("UPDATE bookings SET duration_minutes = NULL WHERE id = ?")
        .bind(booking.id.to_string())
        .execute(&app.pool)
        .await?;

    // 90-minute service default keeps 11:00 inside the booked range.
    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            Some(employee.id),
            start + Duration::minutes(60),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn short_lead_time_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            Utc::now() + Duration::hours(1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn suspended_business_rejects_bookings() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app
        .business_with(BusinessStatus::Suspended, false)
        .await?;
    let service = app.service(business.id, 60).await?;

    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            Uuid::new_v4(),
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn booking_inside_blackout_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let employee = app.employee(business.id).await?;
    let start = future_start(30, 10);

    app.blackout(
        business.id,
        None,
        start.date_naive(),
        start.date_naive(),
    )
    .await?;

    let err = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            Uuid::new_v4(),
            business.id,
            service.id,
            Some(employee.id),
            start,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // A blackout scoped to a different employee does not block.
    let other_day = future_start(31, 10);
    app.blackout(
        business.id,
        Some(Uuid::new_v4()),
        other_day.date_naive(),
        other_day.date_naive(),
    )
    .await?;
    app.ctx
        .booking_service
        .create_booking(booking_request(
            Uuid::new_v4(),
            business.id,
            service.id,
            Some(employee.id),
            other_day,
        ))
        .await?;

    Ok(())
}

#[tokio::test]
async fn consent_businesses_start_bookings_pending_consent() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business_with(BusinessStatus::Active, true).await?;
    let service = app.service(business.id, 60).await?;

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            Uuid::new_v4(),
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;

    assert_eq!(booking.status, BookingStatus::PendingConsent);
    assert_eq!(app.consent_count(booking.id).await?, 1);

    Ok(())
}

#[tokio::test]
async fn signing_consent_confirms_the_booking_once() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business_with(BusinessStatus::Active, true).await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;
    assert_eq!(booking.status, BookingStatus::PendingConsent);

    // Someone else's signature is rejected.
    let err = app
        .ctx
        .booking_service
        .confirm_consent(booking.id, &client_actor(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let confirmed = app
        .ctx
        .booking_service
        .confirm_consent(booking.id, &client_actor(client))
        .await?;
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let signed_at: Option<chrono::NaiveDateTime> =
        sqlx::query_scalar("SELECT signed_at FROM consents WHERE booking_id = ?")
            .bind(booking.id.to_string())
            .fetch_one(&app.pool)
            .await?;
    assert!(signed_at.is_some());

    // Signing twice is an error, not a silent success.
    let err = app
        .ctx
        .booking_service
        .confirm_consent(booking.id, &client_actor(client))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn cancelling_unpaid_booking_deletes_it_with_consent() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business_with(BusinessStatus::Active, true).await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;

    let result = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(client), false)
        .await?;
    assert!(result.success);

    assert!(app.ctx.booking_repo.find_by_id(booking.id).await?.is_none());
    assert_eq!(app.consent_count(booking.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn cancelling_paid_booking_retains_the_row() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let mut request = booking_request(client, business.id, service.id, None, future_start(30, 10));
    request.paid = true;
    request.payment_method = PaymentMethod::Cash;
    let booking = app.ctx.booking_service.create_booking(request).await?;

    app.ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(client), false)
        .await?;

    let cancelled = app
        .ctx
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("paid booking row is retained");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // Second cancellation is rejected and sends nothing further.
    let before = app.outbox_count("booking.cancelled").await?;
    let err = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(client), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(app.outbox_count("booking.cancelled").await?, before);

    Ok(())
}

#[tokio::test]
async fn client_cancellation_window_binds_only_clients() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    // Starts in ~20 hours: inside the 23h client cutoff.
    let request = booking_request(
        client,
        business.id,
        service.id,
        None,
        Utc::now() + Duration::hours(20),
    );
    let booking = app.ctx.booking_service.create_booking(request).await?;

    let err = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(client), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

    // The business owner bypasses the window.
    let result = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &owner_actor(), false)
        .await?;
    assert!(result.success);

    Ok(())
}

#[tokio::test]
async fn reminder_shrinks_the_cancellation_window() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;

    // Reminder went out two hours ago; the one-hour grace has elapsed even
    // though the start is weeks away.
    app.ctx
        .booking_repo
        .set_reminder_sent(booking.id, Utc::now() - Duration::hours(2))
        .await?;

    let err = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(client), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn clients_cannot_cancel_other_clients_bookings() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;

    let err = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &client_actor(Uuid::new_v4()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn reusing_a_credit_marks_the_source_payment() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    // Credit left behind by an earlier cancelled cash booking.
    let credit = app
        .cash_payment(None, client, 4500, PaymentStatus::Succeeded)
        .await?;

    let mut request = booking_request(client, business.id, service.id, None, future_start(30, 10));
    request.reuse_payment_id = Some(credit.id);
    request.paid = true;
    request.payment_method = PaymentMethod::Cash;
    let booking = app.ctx.booking_service.create_booking(request).await?;
    assert!(booking.payment_reused);

    let reloaded = app
        .ctx
        .payment_repo
        .find_by_id(credit.id)
        .await?
        .expect("payment exists");
    assert!(reloaded.reused);

    // The same credit cannot be spent twice.
    let mut second = booking_request(client, business.id, service.id, None, future_start(31, 10));
    second.reuse_payment_id = Some(credit.id);
    let err = app
        .ctx
        .booking_service
        .create_booking(second)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn exactly_one_of_service_or_court_is_required() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let court = app.court(business.id).await?;
    let client = Uuid::new_v4();

    let mut both = booking_request(client, business.id, service.id, None, future_start(30, 10));
    both.court_id = Some(court.id);
    let err = app
        .ctx
        .booking_service
        .create_booking(both)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut neither = booking_request(client, business.id, service.id, None, future_start(30, 10));
    neither.service_id = None;
    let err = app
        .ctx
        .booking_service
        .create_booking(neither)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn only_staff_complete_bookings_and_completed_is_terminal() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let service = app.service(business.id, 60).await?;
    let client = Uuid::new_v4();

    let booking = app
        .ctx
        .booking_service
        .create_booking(booking_request(
            client,
            business.id,
            service.id,
            None,
            future_start(30, 10),
        ))
        .await?;

    let err = app
        .ctx
        .booking_service
        .complete_booking(booking.id, &client_actor(client))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let completed = app
        .ctx
        .booking_service
        .complete_booking(booking.id, &owner_actor())
        .await?;
    assert_eq!(completed.status, BookingStatus::Completed);

    // Completed is terminal: neither a second completion nor a
    // cancellation can move it.
    let err = app
        .ctx
        .booking_service
        .complete_booking(booking.id, &owner_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = app
        .ctx
        .booking_service
        .cancel_booking(booking.id, &owner_actor(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn court_bookings_use_the_court_as_resource() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let business = app.business().await?;
    let court = app.court(business.id).await?;
    let client = Uuid::new_v4();
    let start = future_start(30, 10);

    let mut request = booking_request(client, business.id, Uuid::new_v4(), None, start);
    request.service_id = None;
    request.court_id = Some(court.id);
    let booking = app.ctx.booking_service.create_booking(request).await?;
    assert_eq!(booking.resource_kind, ResourceKind::Court);
    assert_eq!(booking.resource_id, Some(court.id));

    // The court is now taken for that hour.
    let mut second = booking_request(
        client,
        business.id,
        Uuid::new_v4(),
        None,
        start + Duration::minutes(30),
    );
    second.service_id = None;
    second.court_id = Some(court.id);
    let err = app
        .ctx
        .booking_service
        .create_booking(second)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}
