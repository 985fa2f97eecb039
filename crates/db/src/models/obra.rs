use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "obra_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObraStatus {
    #[default]
    Planned,
    Active,
    Paused,
    Finished,
}

/// A construction work (project site)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Obra {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub client: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: f64,
    pub status: ObraStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateObra {
    pub code: String,
    pub name: String,
    pub client: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: f64,
    pub status: Option<ObraStatus>,
}

pub type UpdateObra = CreateObra;

impl Validate for CreateObra {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("code", &self.code)
            .max_len("code", &self.code, 30)
            .required("name", &self.name)
            .max_len("name", &self.name, 200)
            .max_len_opt("client", self.client.as_deref(), 200)
            .max_len_opt("location", self.location.as_deref(), 255)
            .non_negative("budget", self.budget)
            .date_order(self.start_date, "end_date", self.end_date)
            .finish()
    }
}

/// Rows in other tables that point at an obra. Any non-zero count blocks deletion.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct ObraReferences {
    pub requirements: i64,
    pub purchase_orders: i64,
    pub attendances: i64,
    pub trainings: i64,
    pub quotations: i64,
    pub workers: i64,
}

impl ObraReferences {
    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Names of the referencing resources, for the conflict message
    pub fn names(&self) -> Vec<&'static str> {
        [
            ("requerimientos", self.requirements),
            ("órdenes de compra", self.purchase_orders),
            ("asistencias", self.attendances),
            ("capacitaciones", self.trainings),
            ("cotizaciones", self.quotations),
            ("trabajadores", self.workers),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, _)| name)
        .collect()
    }
}

const OBRA_COLUMNS: &str =
    "id, code, name, client, location, start_date, end_date, budget, status, created_at, updated_at";

impl Obra {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"SELECT {OBRA_COLUMNS}
               FROM obras
               WHERE code LIKE $1 ESCAPE '\' OR name LIKE $1 ESCAPE '\' OR COALESCE(client, '') LIKE $1 ESCAPE '\'
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, Obra>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "obras").await
    }

    pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        super::row_exists(pool, "obras", id).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {OBRA_COLUMNS} FROM obras WHERE id = $1");
        sqlx::query_as::<_, Obra>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn code_taken(
        pool: &SqlitePool,
        code: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM obras WHERE code = $1 COLLATE NOCASE AND ($2 IS NULL OR id <> $2)",
        )
        .bind(code.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateObra, id: Uuid) -> Result<Self, sqlx::Error> {
        let status = data.status.clone().unwrap_or_default();
        let query = format!(
            r#"INSERT INTO obras (id, code, name, client, location, start_date, end_date, budget, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {OBRA_COLUMNS}"#
        );
        sqlx::query_as::<_, Obra>(&query)
            .bind(id)
            .bind(data.code.trim())
            .bind(data.name.trim())
            .bind(&data.client)
            .bind(&data.location)
            .bind(data.start_date)
            .bind(data.end_date)
            .bind(data.budget)
            .bind(status)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateObra,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"UPDATE obras
               SET code = $2, name = $3, client = $4, location = $5, start_date = $6, end_date = $7,
                   budget = $8, status = COALESCE($9, status), updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {OBRA_COLUMNS}"#
        );
        sqlx::query_as::<_, Obra>(&query)
            .bind(id)
            .bind(data.code.trim())
            .bind(data.name.trim())
            .bind(&data.client)
            .bind(&data.location)
            .bind(data.start_date)
            .bind(data.end_date)
            .bind(data.budget)
            .bind(data.status.clone())
            .fetch_optional(pool)
            .await
    }

    pub async fn references(pool: &SqlitePool, id: Uuid) -> Result<ObraReferences, sqlx::Error> {
        sqlx::query_as::<_, ObraReferences>(
            r#"SELECT
                (SELECT COUNT(*) FROM requirements WHERE obra_id = $1)    AS requirements,
                (SELECT COUNT(*) FROM purchase_orders WHERE obra_id = $1) AS purchase_orders,
                (SELECT COUNT(*) FROM attendances WHERE obra_id = $1)     AS attendances,
                (SELECT COUNT(*) FROM trainings WHERE obra_id = $1)       AS trainings,
                (SELECT COUNT(*) FROM quotations WHERE obra_id = $1)      AS quotations,
                (SELECT COUNT(*) FROM workers WHERE obra_id = $1)         AS workers"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Sum of purchase-order totals that are issued or received
    pub async fn committed_spend(pool: &SqlitePool, id: Uuid) -> Result<f64, sqlx::Error> {
        sqlx::query_scalar::<_, f64>(
            r#"SELECT CAST(COALESCE(SUM(total), 0) AS REAL)
               FROM purchase_orders
               WHERE obra_id = $1 AND status IN ('issued', 'received')"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM obras WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
