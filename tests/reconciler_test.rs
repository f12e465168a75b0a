mod common;

use bookwell::domain::*;
use bookwell::payments::{ProviderEvent, ProviderEventKind, ReconcileOutcome};
use common::*;
use uuid::Uuid;

fn success_event(event_id: &str, intent_id: &str) -> ProviderEvent {
    ProviderEvent {
        event_id: event_id.to_string(),
        kind: ProviderEventKind::PaymentSucceeded,
        external_payment_id: intent_id.to_string(),
    }
}

fn failure_event(event_id: &str, intent_id: &str) -> ProviderEvent {
    ProviderEvent {
        event_id: event_id.to_string(),
        kind: ProviderEventKind::PaymentFailed,
        external_payment_id: intent_id.to_string(),
    }
}

/// Creates a confirmed, unpaid card booking with a pending payment attached.
async fn booking_with_pending_payment(
    app: &TestApp,
    intent_id: &str,
) -> anyhow::Result<(Booking, Payment)> {
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
    let payment = app
        .card_payment(booking.id, client, 4500, PaymentStatus::Pending, intent_id)
        .await?;
    Ok((booking, payment))
}

#[tokio::test]
async fn replayed_success_event_applies_effects_exactly_once() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (booking, payment) = booking_with_pending_payment(&app, "pi_100").await?;

    let event = success_event("evt_1", "pi_100");
    let outcome = app.ctx.reconciler.handle_event(&event).await?;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let booking = app
        .ctx
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert!(booking.paid);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(app.outbox_count("payment.received").await?, 1);

    // Second delivery of the same event: acknowledged, no second
    // notification, nothing re-applied.
    let outcome = app.ctx.reconciler.handle_event(&event).await?;
    assert_eq!(outcome, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(app.outbox_count("payment.received").await?, 1);

    Ok(())
}

#[tokio::test]
async fn distinct_events_for_an_already_settled_payment_do_not_renotify() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_booking, _payment) = booking_with_pending_payment(&app, "pi_200").await?;

    app.ctx
        .reconciler
        .handle_event(&success_event("evt_a", "pi_200"))
        .await?;
    assert_eq!(app.outbox_count("payment.received").await?, 1);

    // The provider occasionally emits a fresh event id for the same intent.
    let outcome = app
        .ctx
        .reconciler
        .handle_event(&success_event("evt_b", "pi_200"))
        .await?;
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(app.outbox_count("payment.received").await?, 1);

    Ok(())
}

#[tokio::test]
async fn failure_event_marks_payment_without_touching_booking_status() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (booking, payment) = booking_with_pending_payment(&app, "pi_300").await?;

    app.ctx
        .reconciler
        .handle_event(&failure_event("evt_f", "pi_300"))
        .await?;

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Failed);

    let booking = app
        .ctx
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert_eq!(booking.payment_status, BookingPaymentStatus::Failed);
    // A failed payment does not cancel the booking.
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert!(!booking.paid);

    Ok(())
}

#[tokio::test]
async fn event_for_unknown_payment_fails_and_can_be_retried() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    // Arrives before our payment row exists: must error so the provider
    // redelivers, not be swallowed.
    let event = success_event("evt_early", "pi_400");
    assert!(app.ctx.reconciler.handle_event(&event).await.is_err());

    let (booking, _) = booking_with_pending_payment(&app, "pi_400").await?;
    let outcome = app.ctx.reconciler.handle_event(&event).await?;
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert!(app
        .ctx
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists")
        .paid);

    Ok(())
}

#[tokio::test]
async fn success_event_for_failed_payment_is_ignored() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (booking, payment) = booking_with_pending_payment(&app, "pi_500").await?;

    app.ctx
        .reconciler
        .handle_event(&failure_event("evt_1f", "pi_500"))
        .await?;
    let outcome = app
        .ctx
        .reconciler
        .handle_event(&success_event("evt_2s", "pi_500"))
        .await?;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    // Failed is terminal for the payment; nothing got marked paid.
    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(!app
        .ctx
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists")
        .paid);

    Ok(())
}
