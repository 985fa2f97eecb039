use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::{
    money::round2,
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Late,
    Absent,
    /// Justified absence (medical, permit)
    Leave,
}

impl AttendanceStatus {
    pub fn requires_times(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// One worker's attendance on one day at one obra
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Attendance {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub obra_id: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub hours_worked: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AttendanceRow {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub attendance: Attendance,
    pub worker_name: String,
    pub document_number: String,
    pub obra_code: String,
    pub discount_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAttendance {
    pub worker_id: Uuid,
    pub obra_id: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

pub type UpdateAttendance = CreateAttendance;

impl CreateAttendance {
    pub fn status(&self) -> AttendanceStatus {
        self.status.unwrap_or_default()
    }

    /// Hours between check-in and check-out; zero when either is missing or
    /// when the worker did not attend.
    pub fn hours_worked(&self) -> f64 {
        if !self.status().requires_times() {
            return 0.0;
        }
        match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) if check_out > check_in => {
                round2((check_out - check_in).num_minutes() as f64 / 60.0)
            }
            _ => 0.0,
        }
    }
}

impl Validate for CreateAttendance {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.max_len_opt("notes", self.notes.as_deref(), 500);
        if self.status().requires_times() && self.check_in.is_none() {
            v.add("check_in", "The check_in field is required when the worker attended.");
        }
        if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
            if check_out <= check_in {
                v.add("check_out", "The check_out must be a time after check_in.");
            }
        }
        v.finish()
    }
}

/// Filters the attendance table accepts on top of the common list query
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AttendanceFilter {
    pub obra_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AttendanceDiscount {
    pub id: Uuid,
    pub attendance_id: Uuid,
    pub amount: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAttendanceDiscount {
    /// Defaults to the worker's daily rate when the attendance is an absence
    pub amount: Option<f64>,
    pub reason: String,
}

impl Validate for CreateAttendanceDiscount {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("reason", &self.reason).max_len("reason", &self.reason, 255);
        if let Some(amount) = self.amount {
            v.positive("amount", amount);
        }
        v.finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DiscountSummaryQuery {
    pub worker_id: Uuid,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct DiscountSummary {
    pub worker_id: Uuid,
    pub discount_count: i64,
    pub total_amount: f64,
}

const ATTENDANCE_COLUMNS: &str = "a.id, a.worker_id, a.obra_id, a.date, a.check_in, a.check_out, a.status, a.hours_worked, a.notes, a.created_at, a.updated_at";

impl Attendance {
    pub async fn list(
        pool: &SqlitePool,
        page: &Page,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRow>, sqlx::Error> {
        let query = format!(
            r#"SELECT {ATTENDANCE_COLUMNS},
                      w.first_name || ' ' || w.last_name AS worker_name,
                      w.document_number,
                      o.code AS obra_code,
                      CAST(COALESCE((SELECT SUM(d.amount) FROM attendance_discounts d
                                     WHERE d.attendance_id = a.id), 0) AS REAL) AS discount_total
               FROM attendances a
               JOIN workers w ON w.id = a.worker_id
               JOIN obras o ON o.id = a.obra_id
               WHERE ($4 IS NULL OR a.obra_id = $4)
                 AND ($5 IS NULL OR a.date = $5)
                 AND ((w.first_name || ' ' || w.last_name) LIKE $1 ESCAPE '\' OR w.document_number LIKE $1 ESCAPE '\')
               ORDER BY a.date DESC, a.created_at DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .bind(filter.obra_id)
            .bind(filter.date)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "attendances").await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances a WHERE a.id = $1");
        sqlx::query_as::<_, Attendance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Whether the worker already has a record for that day (other than `except`)
    pub async fn exists_for_day(
        pool: &SqlitePool,
        worker_id: Uuid,
        date: NaiveDate,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendances WHERE worker_id = $1 AND date = $2 AND ($3 IS NULL OR id <> $3)",
        )
        .bind(worker_id)
        .bind(date)
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateAttendance,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(
            r#"INSERT INTO attendances (id, worker_id, obra_id, date, check_in, check_out, status, hours_worked, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, worker_id, obra_id, date, check_in, check_out, status, hours_worked, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.worker_id)
        .bind(data.obra_id)
        .bind(data.date)
        .bind(data.check_in)
        .bind(data.check_out)
        .bind(data.status())
        .bind(data.hours_worked())
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateAttendance,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(
            r#"UPDATE attendances
               SET worker_id = $2, obra_id = $3, date = $4, check_in = $5, check_out = $6, status = $7,
                   hours_worked = $8, notes = $9, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, worker_id, obra_id, date, check_in, check_out, status, hours_worked, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.worker_id)
        .bind(data.obra_id)
        .bind(data.date)
        .bind(data.check_in)
        .bind(data.check_out)
        .bind(data.status())
        .bind(data.hours_worked())
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendances WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl AttendanceDiscount {
    pub async fn find_by_attendance_id(
        pool: &SqlitePool,
        attendance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AttendanceDiscount>(
            r#"SELECT id, attendance_id, amount, reason, created_at
               FROM attendance_discounts
               WHERE attendance_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(attendance_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        attendance_id: Uuid,
        amount: f64,
        reason: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AttendanceDiscount>(
            r#"INSERT INTO attendance_discounts (id, attendance_id, amount, reason)
               VALUES ($1, $2, $3, $4)
               RETURNING id, attendance_id, amount, reason, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(attendance_id)
        .bind(amount)
        .bind(reason.trim())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(
        pool: &SqlitePool,
        attendance_id: Uuid,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM attendance_discounts WHERE id = $1 AND attendance_id = $2")
                .bind(id)
                .bind(attendance_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Discounts charged to a worker, optionally bounded by attendance date
    pub async fn summary(
        pool: &SqlitePool,
        query: &DiscountSummaryQuery,
    ) -> Result<DiscountSummary, sqlx::Error> {
        sqlx::query_as::<_, DiscountSummary>(
            r#"SELECT $1 AS worker_id,
                      COUNT(d.id) AS discount_count,
                      CAST(COALESCE(SUM(d.amount), 0) AS REAL) AS total_amount
               FROM attendance_discounts d
               JOIN attendances a ON a.id = d.attendance_id
               WHERE a.worker_id = $1
                 AND ($2 IS NULL OR a.date >= $2)
                 AND ($3 IS NULL OR a.date <= $3)"#,
        )
        .bind(query.worker_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_one(pool)
        .await
    }
}
