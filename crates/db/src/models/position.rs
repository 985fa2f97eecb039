use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

/// Job position (cargo) held by workers; carries the daily wage used for discounts
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Position {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub daily_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePosition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub daily_rate: f64,
}

pub type UpdatePosition = CreatePosition;

impl Validate for CreatePosition {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 100)
            .max_len_opt("description", self.description.as_deref(), 500)
            .non_negative("daily_rate", self.daily_rate)
            .finish()
    }
}

impl Position {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Position>(
            r#"SELECT id, name, description, daily_rate, created_at, updated_at
               FROM positions
               WHERE name LIKE $1 ESCAPE '\'
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(page.like_pattern())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "positions").await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Position>(
            "SELECT id, name, description, daily_rate, created_at, updated_at FROM positions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn name_taken(
        pool: &SqlitePool,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM positions WHERE name = $1 COLLATE NOCASE AND ($2 IS NULL OR id <> $2)",
        )
        .bind(name.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreatePosition,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Position>(
            r#"INSERT INTO positions (id, name, description, daily_rate)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, description, daily_rate, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.daily_rate)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePosition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Position>(
            r#"UPDATE positions
               SET name = $2, description = $3, daily_rate = $4, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, description, daily_rate, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.daily_rate)
        .fetch_optional(pool)
        .await
    }

    pub async fn worker_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workers WHERE position_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM positions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
