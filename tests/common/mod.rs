#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use bookwell::{
    cache::NoopCacheInvalidator,
    config::BookingConfig,
    domain::*,
    error::{AppError, Result},
    payments::{ChargeView, IntentView, PaymentGateway, RefundView},
    service::ServiceContext,
};

// Re-exported so `use common::*` puts the repository traits in scope for
// method calls on the context's trait objects.
pub use bookwell::repository::{
    BlackoutRepository, BookingRepository, BusinessRepository, OutboxRepository,
    PaymentRepository, WebhookEventRepository,
};

/// In-memory payment provider. Charges are staged per payment-intent id;
/// refunds are recorded and flip the charge's refunded flag like the real
/// provider would.
pub struct FakeGateway {
    charges: Mutex<HashMap<String, ChargeView>>,
    refunds: Mutex<Vec<(String, i64)>>,
    fail_refunds: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            charges: Mutex::new(HashMap::new()),
            refunds: Mutex::new(Vec::new()),
            fail_refunds: AtomicBool::new(false),
        }
    }

    pub fn stage_charge(&self, intent_id: &str, amount_cents: i64, refunded: bool) {
        self.charges.lock().unwrap().insert(
            intent_id.to_string(),
            ChargeView {
                id: format!("ch_{}", intent_id),
                amount_cents,
                refunded,
            },
        );
    }

    pub fn fail_refunds(&self) {
        self.fail_refunds.store(true, Ordering::SeqCst);
    }

    pub fn refund_calls(&self) -> Vec<(String, i64)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn retrieve_intent(&self, payment_intent_id: &str) -> Result<IntentView> {
        let charges = self.charges.lock().unwrap();
        let charge = charges
            .get(payment_intent_id)
            .ok_or_else(|| AppError::Upstream("intent not found".to_string()))?;
        Ok(IntentView {
            id: payment_intent_id.to_string(),
            amount_cents: charge.amount_cents,
            latest_charge_id: Some(charge.id.clone()),
        })
    }

    async fn list_charges(&self, payment_intent_id: &str) -> Result<Vec<ChargeView>> {
        let charges = self.charges.lock().unwrap();
        Ok(charges
            .get(payment_intent_id)
            .cloned()
            .into_iter()
            .collect())
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
    ) -> Result<RefundView> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("provider refused the refund".to_string()));
        }
        let mut charges = self.charges.lock().unwrap();
        let charge = charges
            .get_mut(payment_intent_id)
            .ok_or_else(|| AppError::Upstream("intent not found".to_string()))?;
        charge.refunded = true;
        self.refunds
            .lock()
            .unwrap()
            .push((payment_intent_id.to_string(), amount_cents));
        Ok(RefundView {
            id: format!("re_{}", payment_intent_id),
            amount_cents,
        })
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        // One connection: pooled in-memory SQLite databases are otherwise
        // distinct per connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let gateway = Arc::new(FakeGateway::new());
        let ctx = Arc::new(ServiceContext::new(
            pool.clone(),
            BookingConfig::default(),
            gateway.clone(),
            Arc::new(NoopCacheInvalidator),
        ));

        Ok(Self { pool, ctx, gateway })
    }

    pub async fn business(&self) -> anyhow::Result<Business> {
        self.business_with(BusinessStatus::Active, false).await
    }

    pub async fn business_with(
        &self,
        status: BusinessStatus,
        requires_consent: bool,
    ) -> anyhow::Result<Business> {
        let now = Utc::now();
        let business = Business {
            id: Uuid::new_v4(),
            name: "Shear Genius".to_string(),
            category: "salon".to_string(),
            status,
            requires_consent,
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.business_repo.create(business).await?)
    }

    pub async fn service(
        &self,
        business_id: Uuid,
        duration_minutes: i64,
    ) -> anyhow::Result<ServiceOffering> {
        let now = Utc::now();
        let service = ServiceOffering {
            id: Uuid::new_v4(),
            business_id,
            name: "Haircut".to_string(),
            duration_minutes,
            price_cents: 4500,
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.business_repo.create_service(service).await?)
    }

    pub async fn court(&self, business_id: Uuid) -> anyhow::Result<Court> {
        let now = Utc::now();
        let court = Court {
            id: Uuid::new_v4(),
            business_id,
            name: "Court 1".to_string(),
            duration_minutes: 60,
            price_cents: 3000,
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.business_repo.create_court(court).await?)
    }

    pub async fn employee(&self, business_id: Uuid) -> anyhow::Result<Employee> {
        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4(),
            business_id,
            display_name: "Sam".to_string(),
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.business_repo.create_employee(employee).await?)
    }

    /// Enables every weekday 09:00-17:00 for the business or a resource.
    pub async fn open_hours(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        use chrono::Weekday::*;
        let window = TimeWindow {
            start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        for weekday in [Mon, Tue, Wed, Thu, Fri, Sat, Sun] {
            self.ctx
                .business_repo
                .upsert_day_schedule(
                    business_id,
                    resource_id,
                    weekday,
                    DaySchedule {
                        enabled: true,
                        windows: vec![window],
                    },
                )
                .await?;
        }
        Ok(())
    }

    pub async fn blackout(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> anyhow::Result<BlackoutPeriod> {
        let period = BlackoutPeriod {
            id: Uuid::new_v4(),
            business_id,
            resource_id,
            start_date: start,
            end_date: end,
            reason: Some("holiday".to_string()),
            created_at: Utc::now(),
        };
        Ok(self.ctx.blackout_repo.create(period).await?)
    }

    pub async fn card_payment(
        &self,
        booking_id: Uuid,
        client_id: Uuid,
        amount_cents: i64,
        status: PaymentStatus,
        external_id: &str,
    ) -> anyhow::Result<Payment> {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            external_payment_id: Some(external_id.to_string()),
            booking_id: Some(booking_id),
            client_id,
            amount_cents,
            method: PaymentMethod::Card,
            status,
            reused: false,
            description: "Booking payment".to_string(),
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.payment_repo.create(payment).await?)
    }

    pub async fn cash_payment(
        &self,
        booking_id: Option<Uuid>,
        client_id: Uuid,
        amount_cents: i64,
        status: PaymentStatus,
    ) -> anyhow::Result<Payment> {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            external_payment_id: None,
            booking_id,
            client_id,
            amount_cents,
            method: PaymentMethod::Cash,
            status,
            reused: false,
            description: "Booking payment".to_string(),
            created_at: now,
            updated_at: now,
        };
        Ok(self.ctx.payment_repo.create(payment).await?)
    }

    pub async fn outbox_count(&self, kind: &str) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE kind = ?")
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn consent_count(&self, booking_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM consents WHERE booking_id = ?")
            .bind(booking_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// A start far enough out that lead-time checks never interfere.
pub fn future_start(days: i64, hour: u32) -> DateTime<Utc> {
    (Utc::now() + Duration::days(days))
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn booking_request(
    client_id: Uuid,
    business_id: Uuid,
    service_id: Uuid,
    resource_id: Option<Uuid>,
    start_at: DateTime<Utc>,
) -> CreateBookingRequest {
    CreateBookingRequest {
        client_id,
        business_id,
        service_id: Some(service_id),
        court_id: None,
        resource_id,
        start_at,
        duration_minutes: None,
        payment_method: PaymentMethod::Card,
        paid: false,
        reuse_payment_id: None,
    }
}

pub fn client_actor(actor_id: Uuid) -> ActorContext {
    ActorContext {
        actor_id,
        role: ActorRole::Client,
    }
}

pub fn owner_actor() -> ActorContext {
    ActorContext {
        actor_id: Uuid::new_v4(),
        role: ActorRole::BusinessOwner,
    }
}
