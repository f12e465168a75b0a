use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Business, BusinessStatus, Court, DaySchedule, Employee, ServiceOffering, TimeWindow,
        WeekSchedule,
    },
    error::{AppError, Result},
    repository::BusinessRepository,
};

#[derive(FromRow)]
struct BusinessRow {
    id: String,
    name: String,
    category: String,
    status: String,
    requires_consent: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct OfferingRow {
    id: String,
    business_id: String,
    name: String,
    duration_minutes: i64,
    price_cents: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct EmployeeRow {
    id: String,
    business_id: String,
    display_name: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct WorkingHoursRow {
    weekday: i64,
    enabled: bool,
    windows: String,
}

pub struct SqliteBusinessRepository {
    pool: SqlitePool,
}

impl SqliteBusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_business(row: BusinessRow) -> Result<Business> {
        Ok(Business {
            id: parse_uuid(&row.id)?,
            name: row.name,
            category: row.category,
            status: Self::parse_status(&row.status)?,
            requires_consent: row.requires_consent,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<BusinessStatus> {
        match s {
            "Active" => Ok(BusinessStatus::Active),
            "Suspended" => Ok(BusinessStatus::Suspended),
            _ => Err(AppError::Database(format!("Invalid business status: {}", s))),
        }
    }

    fn status_to_str(status: &BusinessStatus) -> &'static str {
        match status {
            BusinessStatus::Active => "Active",
            BusinessStatus::Suspended => "Suspended",
        }
    }

    async fn schedule_rows(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> Result<Vec<WorkingHoursRow>> {
        let resource_str = resource_id.map(|id| id.to_string());
        let rows = sqlx::query_as::<_, WorkingHoursRow>(
            r#"
            SELECT weekday, enabled, windows
            FROM working_hours
            WHERE business_id = ?
              AND ((? IS NULL AND resource_id IS NULL) OR resource_id = ?)
            ORDER BY weekday
            "#,
        )
        .bind(business_id.to_string())
        .bind(&resource_str)
        .bind(&resource_str)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows)
    }
}

#[async_trait]
impl BusinessRepository for SqliteBusinessRepository {
    async fn create(&self, business: Business) -> Result<Business> {
        sqlx::query(
            r#"
            INSERT INTO businesses (id, name, category, status, requires_consent, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(business.id.to_string())
        .bind(&business.name)
        .bind(&business.category)
        .bind(Self::status_to_str(&business.status))
        .bind(business.requires_consent)
        .bind(business.created_at.naive_utc())
        .bind(business.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(business)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Business>> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, category, status, requires_consent, created_at, updated_at FROM businesses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_business(r)?)),
            None => Ok(None),
        }
    }

    async fn create_service(&self, service: ServiceOffering) -> Result<ServiceOffering> {
        sqlx::query(
            r#"
            INSERT INTO services (id, business_id, name, duration_minutes, price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(service.id.to_string())
        .bind(service.business_id.to_string())
        .bind(&service.name)
        .bind(service.duration_minutes)
        .bind(service.price_cents)
        .bind(service.created_at.naive_utc())
        .bind(service.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(service)
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<ServiceOffering>> {
        let row = sqlx::query_as::<_, OfferingRow>(
            "SELECT id, business_id, name, duration_minutes, price_cents, created_at, updated_at FROM services WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(ServiceOffering {
                id: parse_uuid(&r.id)?,
                business_id: parse_uuid(&r.business_id)?,
                name: r.name,
                duration_minutes: r.duration_minutes,
                price_cents: r.price_cents,
                created_at: DateTime::from_naive_utc_and_offset(r.created_at, Utc),
                updated_at: DateTime::from_naive_utc_and_offset(r.updated_at, Utc),
            })),
            None => Ok(None),
        }
    }

    async fn create_court(&self, court: Court) -> Result<Court> {
        sqlx::query(
            r#"
            INSERT INTO courts (id, business_id, name, duration_minutes, price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(court.id.to_string())
        .bind(court.business_id.to_string())
        .bind(&court.name)
        .bind(court.duration_minutes)
        .bind(court.price_cents)
        .bind(court.created_at.naive_utc())
        .bind(court.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(court)
    }

    async fn find_court(&self, id: Uuid) -> Result<Option<Court>> {
        let row = sqlx::query_as::<_, OfferingRow>(
            "SELECT id, business_id, name, duration_minutes, price_cents, created_at, updated_at FROM courts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Court {
                id: parse_uuid(&r.id)?,
                business_id: parse_uuid(&r.business_id)?,
                name: r.name,
                duration_minutes: r.duration_minutes,
                price_cents: r.price_cents,
                created_at: DateTime::from_naive_utc_and_offset(r.created_at, Utc),
                updated_at: DateTime::from_naive_utc_and_offset(r.updated_at, Utc),
            })),
            None => Ok(None),
        }
    }

    async fn create_employee(&self, employee: Employee) -> Result<Employee> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, business_id, display_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee.id.to_string())
        .bind(employee.business_id.to_string())
        .bind(&employee.display_name)
        .bind(employee.created_at.naive_utc())
        .bind(employee.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(employee)
    }

    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, business_id, display_name, created_at, updated_at FROM employees WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Employee {
                id: parse_uuid(&r.id)?,
                business_id: parse_uuid(&r.business_id)?,
                display_name: r.display_name,
                created_at: DateTime::from_naive_utc_and_offset(r.created_at, Utc),
                updated_at: DateTime::from_naive_utc_and_offset(r.updated_at, Utc),
            })),
            None => Ok(None),
        }
    }

    async fn upsert_day_schedule(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
        weekday: Weekday,
        schedule: DaySchedule,
    ) -> Result<()> {
        let windows = serde_json::to_string(&schedule.windows)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let resource_str = resource_id.map(|id| id.to_string());

        // Delete-then-insert rather than ON CONFLICT: the unique index never
        // fires for NULL resource_id rows (SQLite treats NULLs as distinct).
        sqlx::query(
            r#"
            DELETE FROM working_hours
            WHERE business_id = ?
              AND ((? IS NULL AND resource_id IS NULL) OR resource_id = ?)
              AND weekday = ?
            "#,
        )
        .bind(business_id.to_string())
        .bind(&resource_str)
        .bind(&resource_str)
        .bind(weekday.num_days_from_monday() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO working_hours (id, business_id, resource_id, weekday, enabled, windows)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(business_id.to_string())
        .bind(&resource_str)
        .bind(weekday.num_days_from_monday() as i64)
        .bind(schedule.enabled)
        .bind(windows)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn week_schedule(
        &self,
        business_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> Result<WeekSchedule> {
        let mut rows = self.schedule_rows(business_id, resource_id).await?;
        // A resource without its own schedule works the business-wide hours.
        if rows.is_empty() && resource_id.is_some() {
            rows = self.schedule_rows(business_id, None).await?;
        }

        let mut schedule = WeekSchedule::default();
        for row in rows {
            let windows: Vec<TimeWindow> = serde_json::from_str(&row.windows)
                .map_err(|e| AppError::Database(format!("Invalid working-hours JSON: {}", e)))?;
            let index = row.weekday as usize;
            if index < 7 {
                schedule.days[index] = DaySchedule {
                    enabled: row.enabled,
                    windows,
                };
            }
        }
        Ok(schedule)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}
