use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, BookingStatus, ConsentRecord, PaymentMethod, ResourceKind,
    },
    error::{AppError, Result},
    repository::{BookingRepository, ConflictGuard, OverlapCandidate},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    business_id: String,
    resource_kind: String,
    resource_id: Option<String>,
    client_id: String,
    service_id: Option<String>,
    court_id: Option<String>,
    start_at: NaiveDateTime,
    duration_minutes: Option<i64>,
    status: String,
    paid: bool,
    payment_method: String,
    payment_status: String,
    payment_reused: bool,
    reminder_sent_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct CandidateRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    service_default_minutes: Option<i64>,
    court_default_minutes: Option<i64>,
}

const CANDIDATE_SQL: &str = r#"
    SELECT b.id, b.business_id, b.resource_kind, b.resource_id, b.client_id,
           b.service_id, b.court_id, b.start_at, b.duration_minutes, b.status,
           b.paid, b.payment_method, b.payment_status, b.payment_reused,
           b.reminder_sent_at, b.created_at, b.updated_at,
           s.duration_minutes AS service_default_minutes,
           c.duration_minutes AS court_default_minutes
    FROM bookings b
    LEFT JOIN services s ON s.id = b.service_id
    LEFT JOIN courts c ON c.id = b.court_id
    WHERE b.business_id = ?
      AND b.status != 'Cancelled'
      AND ((? IS NULL AND b.resource_id IS NULL) OR b.resource_id = ?)
      AND b.start_at >= ? AND b.start_at <= ?
      AND (? IS NULL OR b.id != ?)
    ORDER BY b.start_at
"#;

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            business_id: parse_uuid(&row.business_id)?,
            resource_kind: Self::parse_resource_kind(&row.resource_kind)?,
            resource_id: row.resource_id.as_deref().map(parse_uuid).transpose()?,
            client_id: parse_uuid(&row.client_id)?,
            service_id: row.service_id.as_deref().map(parse_uuid).transpose()?,
            court_id: row.court_id.as_deref().map(parse_uuid).transpose()?,
            start_at: DateTime::from_naive_utc_and_offset(row.start_at, Utc),
            duration_minutes: row.duration_minutes,
            status: Self::parse_booking_status(&row.status)?,
            paid: row.paid,
            payment_method: Self::parse_payment_method(&row.payment_method)?,
            payment_status: Self::parse_payment_status(&row.payment_status)?,
            payment_reused: row.payment_reused,
            reminder_sent_at: row
                .reminder_sent_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_booking_status(s: &str) -> Result<BookingStatus> {
        match s {
            "PendingConsent" => Ok(BookingStatus::PendingConsent),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            "Completed" => Ok(BookingStatus::Completed),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    fn booking_status_to_str(status: &BookingStatus) -> &'static str {
        match status {
            BookingStatus::PendingConsent => "PendingConsent",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
        }
    }

    fn parse_resource_kind(s: &str) -> Result<ResourceKind> {
        match s {
            "Employee" => Ok(ResourceKind::Employee),
            "Court" => Ok(ResourceKind::Court),
            "Unassigned" => Ok(ResourceKind::Unassigned),
            _ => Err(AppError::Database(format!("Invalid resource kind: {}", s))),
        }
    }

    fn resource_kind_to_str(kind: &ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Employee => "Employee",
            ResourceKind::Court => "Court",
            ResourceKind::Unassigned => "Unassigned",
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

    fn parse_payment_status(s: &str) -> Result<BookingPaymentStatus> {
        match s {
            "Pending" => Ok(BookingPaymentStatus::Pending),
            "Paid" => Ok(BookingPaymentStatus::Paid),
            "Failed" => Ok(BookingPaymentStatus::Failed),
            _ => Err(AppError::Database(format!(
                "Invalid booking payment status: {}",
                s
            ))),
        }
    }

    fn payment_status_to_str(status: &BookingPaymentStatus) -> &'static str {
        match status {
            BookingPaymentStatus::Pending => "Pending",
            BookingPaymentStatus::Paid => "Paid",
            BookingPaymentStatus::Failed => "Failed",
        }
    }

    async fn candidates_on(
        conn: &mut SqliteConnection,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Vec<OverlapCandidate>> {
        let resource_str = resource_id.map(|id| id.to_string());
        let exclude_str = exclude_booking_id.map(|id| id.to_string());

        let rows = sqlx::query_as::<_, CandidateRow>(CANDIDATE_SQL)
            .bind(business_id.to_string())
            .bind(&resource_str)
            .bind(&resource_str)
            .bind(window_start.naive_utc())
            .bind(window_end.naive_utc())
            .bind(&exclude_str)
            .bind(&exclude_str)
            .fetch_all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(OverlapCandidate {
                    booking: Self::row_to_booking(row.booking)?,
                    service_default_minutes: row.service_default_minutes,
                    court_default_minutes: row.court_default_minutes,
                })
            })
            .collect()
    }

    async fn insert_booking(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, business_id, resource_kind, resource_id, client_id,
                service_id, court_id, start_at, duration_minutes, status,
                paid, payment_method, payment_status, payment_reused,
                reminder_sent_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.business_id.to_string())
        .bind(Self::resource_kind_to_str(&booking.resource_kind))
        .bind(booking.resource_id.map(|id| id.to_string()))
        .bind(booking.client_id.to_string())
        .bind(booking.service_id.map(|id| id.to_string()))
        .bind(booking.court_id.map(|id| id.to_string()))
        .bind(booking.start_at.naive_utc())
        .bind(booking.duration_minutes)
        .bind(Self::booking_status_to_str(&booking.status))
        .bind(booking.paid)
        .bind(Self::payment_method_to_str(&booking.payment_method))
        .bind(Self::payment_status_to_str(&booking.payment_status))
        .bind(booking.payment_reused)
        .bind(booking.reminder_sent_at.map(|dt| dt.naive_utc()))
        .bind(booking.created_at.naive_utc())
        .bind(booking.updated_at.naive_utc())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Body of `create_exclusive`, run with the write lock already held.
    async fn create_in_tx(
        conn: &mut SqliteConnection,
        booking: &Booking,
        resolved_duration_minutes: i64,
        consent: Option<&ConsentRecord>,
        reuse_payment_id: Option<Uuid>,
        guard: &ConflictGuard,
    ) -> Result<()> {
        let start = booking.start_at;
        let end = booking.end_at(resolved_duration_minutes);
        let window_start = start - Duration::minutes(guard.buffer_minutes);
        let window_end = end + Duration::minutes(guard.buffer_minutes);

        let candidates = Self::candidates_on(
            conn,
            booking.business_id,
            booking.resource_id,
            window_start,
            window_end,
            None,
        )
        .await?;

        let colliders: Vec<String> = candidates
            .iter()
            .filter(|c| {
                let other_end = c
                    .booking
                    .end_at(c.resolved_duration(guard.default_duration_minutes));
                start < other_end && end > c.booking.start_at
            })
            .map(|c| c.booking.id.to_string())
            .collect();

        if !colliders.is_empty() {
            return Err(AppError::Conflict(format!(
                "Requested time overlaps existing booking(s): {}",
                colliders.join(", ")
            )));
        }

        Self::insert_booking(conn, booking).await?;

        if let Some(consent) = consent {
            sqlx::query(
                "INSERT INTO consents (id, booking_id, signed_at, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(consent.id.to_string())
            .bind(consent.booking_id.to_string())
            .bind(consent.signed_at.map(|dt| dt.naive_utc()))
            .bind(consent.created_at.naive_utc())
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        if let Some(payment_id) = reuse_payment_id {
            sqlx::query("UPDATE payments SET reused = 1, updated_at = ? WHERE id = ?")
                .bind(Utc::now().naive_utc())
                .bind(payment_id.to_string())
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok(())
    }
}

/// Runs `body` inside a `BEGIN IMMEDIATE` transaction. IMMEDIATE takes the
/// write lock up front, so the conflict re-check and the insert commit as one
/// unit with respect to every other writer.
macro_rules! immediate_tx {
    ($conn:expr, $body:expr) => {{
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *$conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        match $body {
            Ok(value) => {
                sqlx::query("COMMIT")
                    .execute(&mut *$conn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *$conn).await;
                Err(err)
            }
        }
    }};
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, business_id, resource_kind, resource_id, client_id,
                   service_id, court_id, start_at, duration_minutes, status,
                   paid, payment_method, payment_status, payment_reused,
                   reminder_sent_at, created_at, updated_at
            FROM bookings
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn overlap_candidates(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Vec<OverlapCandidate>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Self::candidates_on(
            &mut *conn,
            business_id,
            resource_id,
            window_start,
            window_end,
            exclude_booking_id,
        )
        .await
    }

    async fn create_exclusive(
        &self,
        booking: Booking,
        consent: Option<ConsentRecord>,
        reuse_payment_id: Option<Uuid>,
        guard: ConflictGuard,
    ) -> Result<Booking> {
        let resolved_duration = booking
            .duration_minutes
            .unwrap_or(guard.default_duration_minutes);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        immediate_tx!(
            conn,
            Self::create_in_tx(
                &mut *conn,
                &booking,
                resolved_duration,
                consent.as_ref(),
                reuse_payment_id,
                &guard,
            )
            .await
        )?;
        // Release the connection before going back to the pool.
        drop(conn);

        self.find_by_id(booking.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created booking".to_string()))
    }

    async fn cancel_retaining(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'Cancelled', updated_at = ? WHERE id = ? AND status NOT IN ('Cancelled', 'Completed')",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_with_consent(&self, id: Uuid) -> Result<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        immediate_tx!(conn, {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM bookings WHERE id = ?")
                    .bind(id.to_string())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

            match status.as_deref() {
                Some(s) if s != "Cancelled" && s != "Completed" => {
                    sqlx::query("DELETE FROM consents WHERE booking_id = ?")
                        .bind(id.to_string())
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    sqlx::query("DELETE FROM bookings WHERE id = ?")
                        .bind(id.to_string())
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    async fn mark_paid(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE bookings SET paid = 1, payment_status = 'Paid', updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_payment_failed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE bookings SET payment_status = 'Failed', updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE bookings SET reminder_sent_at = ?, updated_at = ? WHERE id = ?")
            .bind(at.naive_utc())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn confirm_with_consent(&self, id: Uuid, signed_at: DateTime<Utc>) -> Result<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        immediate_tx!(conn, {
            let result = sqlx::query(
                "UPDATE bookings SET status = 'Confirmed', updated_at = ? WHERE id = ? AND status = 'PendingConsent'",
            )
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            if result.rows_affected() == 0 {
                Ok(false)
            } else {
                sqlx::query("UPDATE consents SET signed_at = ? WHERE booking_id = ?")
                    .bind(signed_at.naive_utc())
                    .bind(id.to_string())
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(true)
            }
        })
    }

    async fn complete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'Completed', updated_at = ? WHERE id = ? AND status = 'Confirmed'",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}
