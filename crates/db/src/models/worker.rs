use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Worker {
    pub id: Uuid,
    pub document_number: String, // DNI
    pub first_name: String,
    pub last_name: String,
    pub position_id: Uuid,
    pub obra_id: Option<Uuid>, // Current assignment
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WorkerWithPosition {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub worker: Worker,
    pub position_name: String,
    pub daily_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateWorker {
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub position_id: Uuid,
    pub obra_id: Option<Uuid>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

pub type UpdateWorker = CreateWorker;

impl Validate for CreateWorker {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .digits("document_number", self.document_number.trim(), 8)
            .required("first_name", &self.first_name)
            .max_len("first_name", &self.first_name, 100)
            .required("last_name", &self.last_name)
            .max_len("last_name", &self.last_name, 100)
            .max_len_opt("phone", self.phone.as_deref(), 20)
            .finish()
    }
}

impl Worker {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

const WORKER_COLUMNS: &str = "w.id, w.document_number, w.first_name, w.last_name, w.position_id, w.obra_id, w.phone, w.active, w.created_at, w.updated_at";

impl Worker {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<WorkerWithPosition>, sqlx::Error> {
        let query = format!(
            r#"SELECT {WORKER_COLUMNS}, p.name AS position_name, p.daily_rate
               FROM workers w
               JOIN positions p ON p.id = w.position_id
               WHERE w.document_number LIKE $1 ESCAPE '\'
                  OR (w.first_name || ' ' || w.last_name) LIKE $1 ESCAPE '\'
               ORDER BY w.created_at DESC, w.rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, WorkerWithPosition>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "workers").await
    }

    pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        super::row_exists(pool, "workers", id).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {WORKER_COLUMNS} FROM workers w WHERE w.id = $1");
        sqlx::query_as::<_, Worker>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_with_position(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<WorkerWithPosition>, sqlx::Error> {
        let query = format!(
            r#"SELECT {WORKER_COLUMNS}, p.name AS position_name, p.daily_rate
               FROM workers w
               JOIN positions p ON p.id = w.position_id
               WHERE w.id = $1"#
        );
        sqlx::query_as::<_, WorkerWithPosition>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn document_taken(
        pool: &SqlitePool,
        document_number: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM workers WHERE document_number = $1 AND ($2 IS NULL OR id <> $2)",
        )
        .bind(document_number.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateWorker, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Worker>(
            r#"INSERT INTO workers (id, document_number, first_name, last_name, position_id, obra_id, phone, active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, document_number, first_name, last_name, position_id, obra_id, phone, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.document_number.trim())
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.position_id)
        .bind(data.obra_id)
        .bind(&data.phone)
        .bind(data.active.unwrap_or(true))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateWorker,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Worker>(
            r#"UPDATE workers
               SET document_number = $2, first_name = $3, last_name = $4, position_id = $5, obra_id = $6,
                   phone = $7, active = COALESCE($8, active), updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, document_number, first_name, last_name, position_id, obra_id, phone, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.document_number.trim())
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.position_id)
        .bind(data.obra_id)
        .bind(&data.phone)
        .bind(data.active)
        .fetch_optional(pool)
        .await
    }

    /// Attendance rows and training seats held by the worker
    pub async fn usage_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT (SELECT COUNT(*) FROM attendances WHERE worker_id = $1)
                    + (SELECT COUNT(*) FROM training_attendees WHERE worker_id = $1)"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
