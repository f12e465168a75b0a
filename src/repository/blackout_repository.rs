use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::BlackoutPeriod,
    error::{AppError, Result},
    repository::BlackoutRepository,
};

#[derive(FromRow)]
struct BlackoutRow {
    id: String,
    business_id: String,
    resource_id: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteBlackoutRepository {
    pool: SqlitePool,
}

impl SqliteBlackoutRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_period(row: BlackoutRow) -> Result<BlackoutPeriod> {
        Ok(BlackoutPeriod {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            business_id: Uuid::parse_str(&row.business_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            resource_id: row
                .resource_id
                .map(|id| Uuid::parse_str(&id).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl BlackoutRepository for SqliteBlackoutRepository {
    async fn create(&self, period: BlackoutPeriod) -> Result<BlackoutPeriod> {
        sqlx::query(
            r#"
            INSERT INTO blackout_periods (id, business_id, resource_id, start_date, end_date, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(period.id.to_string())
        .bind(period.business_id.to_string())
        .bind(period.resource_id.map(|id| id.to_string()))
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(&period.reason)
        .bind(period.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(period)
    }

    async fn find_overlapping(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BlackoutPeriod>> {
        let resource_str = resource_id.map(|id| id.to_string());
        let rows = sqlx::query_as::<_, BlackoutRow>(
            r#"
            SELECT id, business_id, resource_id, start_date, end_date, reason, created_at
            FROM blackout_periods
            WHERE business_id = ?
              AND (resource_id IS NULL OR resource_id = ?)
              AND start_date <= ?
              AND end_date >= ?
            ORDER BY start_date
            "#,
        )
        .bind(business_id.to_string())
        .bind(&resource_str)
        .bind(end_date)
        .bind(start_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_period).collect()
    }
}
