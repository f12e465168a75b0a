use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    external_payment_id: Option<String>,
    booking_id: Option<String>,
    client_id: String,
    amount_cents: i64,
    method: String,
    status: String,
    reused: bool,
    description: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PAYMENT_COLUMNS: &str = "id, external_payment_id, booking_id, client_id, amount_cents, \
                               method, status, reused, description, created_at, updated_at";

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            external_payment_id: row.external_payment_id,
            booking_id: row
                .booking_id
                .map(|id| Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            client_id: Uuid::parse_str(&row.client_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            amount_cents: row.amount_cents,
            method: Self::parse_payment_method(&row.method)?,
            status: Self::parse_payment_status(&row.status)?,
            reused: row.reused,
            description: row.description,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Succeeded" => Ok(PaymentStatus::Succeeded),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn payment_status_to_str(status: &PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Succeeded => "Succeeded",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    fn parse_payment_method(s: &str) -> Result<PaymentMethod> {
        match s {
            "Card" => Ok(PaymentMethod::Card),
            "Cash" => Ok(PaymentMethod::Cash),
            _ => Err(AppError::Database(format!("Invalid payment method: {}", s))),
        }
    }

    fn payment_method_to_str(method: &PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::Card => "Card",
            PaymentMethod::Cash => "Cash",
        }
    }

    /// Conditional status transition; the WHERE clause is the monotonicity
    /// guard, rows affected says whether this call performed it.
    async fn transition(&self, id: Uuid, from: PaymentStatus, to: PaymentStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(Self::payment_status_to_str(&to))
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .bind(Self::payment_status_to_str(&from))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, external_payment_id, booking_id, client_id, amount_cents,
                method, status, reused, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.external_payment_id)
        .bind(payment.booking_id.map(|id| id.to_string()))
        .bind(payment.client_id.to_string())
        .bind(payment.amount_cents)
        .bind(Self::payment_method_to_str(&payment.method))
        .bind(Self::payment_status_to_str(&payment.status))
        .bind(payment.reused)
        .bind(&payment.description)
        .bind(payment.created_at.naive_utc())
        .bind(payment.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE external_payment_id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = ? ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_succeeded(&self, id: Uuid) -> Result<bool> {
        self.transition(id, PaymentStatus::Pending, PaymentStatus::Succeeded)
            .await
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        self.transition(id, PaymentStatus::Pending, PaymentStatus::Failed)
            .await
    }

    async fn mark_refunded(&self, id: Uuid) -> Result<bool> {
        self.transition(id, PaymentStatus::Succeeded, PaymentStatus::Refunded)
            .await
    }
}
