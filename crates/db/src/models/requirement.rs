use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

pub const NUMBER_PREFIX: &str = "REQ";

/// Lifecycle of a material requisition
#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "requirement_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequirementStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// A purchase order was issued against it
    Attended,
}

/// Material requisition (requerimiento) raised by an obra
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Requirement {
    pub id: Uuid,
    pub number: String,
    pub obra_id: Uuid,
    pub requested_by: String,
    pub required_date: Option<NaiveDate>,
    pub status: RequirementStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct RequirementSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub requirement: Requirement,
    pub obra_code: String,
    pub obra_name: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct RequirementItem {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub product_id: Uuid,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub quantity: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RequirementDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub requirement: Requirement,
    pub items: Vec<RequirementItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRequirementItem {
    pub product_id: Uuid,
    pub quantity: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRequirement {
    pub obra_id: Uuid,
    pub requested_by: String,
    pub required_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<CreateRequirementItem>,
}

pub type UpdateRequirement = CreateRequirement;

impl Validate for CreateRequirementItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .positive("quantity", self.quantity)
            .max_len_opt("notes", self.notes.as_deref(), 255)
            .finish()
    }
}

impl Validate for CreateRequirement {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("requested_by", &self.requested_by)
            .max_len("requested_by", &self.requested_by, 150)
            .not_empty("items", &self.items);
        for (index, item) in self.items.iter().enumerate() {
            v.nested("items", index, item.validate());
        }
        v.finish()
    }
}

const REQUIREMENT_COLUMNS: &str = "r.id, r.number, r.obra_id, r.requested_by, r.required_date, r.status, r.notes, r.created_at, r.updated_at";

impl Requirement {
    pub async fn list(
        pool: &SqlitePool,
        page: &Page,
        obra_id: Option<Uuid>,
    ) -> Result<Vec<RequirementSummary>, sqlx::Error> {
        let query = format!(
            r#"SELECT {REQUIREMENT_COLUMNS}, o.code AS obra_code, o.name AS obra_name,
                      (SELECT COUNT(*) FROM requirement_items ri WHERE ri.requirement_id = r.id) AS item_count
               FROM requirements r
               JOIN obras o ON o.id = r.obra_id
               WHERE ($4 IS NULL OR r.obra_id = $4)
                 AND (r.number LIKE $1 ESCAPE '\' OR r.requested_by LIKE $1 ESCAPE '\' OR o.name LIKE $1 ESCAPE '\')
               ORDER BY r.created_at DESC, r.rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, RequirementSummary>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .bind(obra_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "requirements").await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!("SELECT {REQUIREMENT_COLUMNS} FROM requirements r WHERE r.id = $1");
        sqlx::query_as::<_, Requirement>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn items(pool: &SqlitePool, id: Uuid) -> Result<Vec<RequirementItem>, sqlx::Error> {
        sqlx::query_as::<_, RequirementItem>(
            r#"SELECT ri.id, ri.requirement_id, ri.product_id, p.code AS product_code,
                      p.name AS product_name, p.unit, ri.quantity, ri.notes
               FROM requirement_items ri
               JOIN products p ON p.id = ri.product_id
               WHERE ri.requirement_id = $1
               ORDER BY ri.rowid ASC"#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_detail(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<RequirementDetail>, sqlx::Error> {
        let Some(requirement) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let items = Self::items(pool, id).await?;
        Ok(Some(RequirementDetail { requirement, items }))
    }

    /// Insert the header. Items are written separately with [`Requirement::replace_items`].
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &CreateRequirement,
    ) -> Result<Self, sqlx::Error> {
        let seq = super::next_sequence(&mut *conn, "requirements").await?;
        let number = super::document_number(NUMBER_PREFIX, seq);
        sqlx::query_as::<_, Requirement>(
            r#"INSERT INTO requirements (id, seq, number, obra_id, requested_by, required_date, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, number, obra_id, requested_by, required_date, status, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(seq)
        .bind(number)
        .bind(data.obra_id)
        .bind(data.requested_by.trim())
        .bind(data.required_date)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update_header(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &UpdateRequirement,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Requirement>(
            r#"UPDATE requirements
               SET obra_id = $2, requested_by = $3, required_date = $4, notes = $5,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, number, obra_id, requested_by, required_date, status, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.obra_id)
        .bind(data.requested_by.trim())
        .bind(data.required_date)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn replace_items(
        conn: &mut SqliteConnection,
        id: Uuid,
        items: &[CreateRequirementItem],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM requirement_items WHERE requirement_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for item in items {
            sqlx::query(
                r#"INSERT INTO requirement_items (id, requirement_id, product_id, quantity, notes)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.notes)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Moves the requirement from `from` to `to`. Returns false when it was not
    /// in `from` (or does not exist), leaving the row untouched.
    pub async fn transition_status<'e, E>(
        executor: E,
        id: Uuid,
        from: RequirementStatus,
        to: RequirementStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE requirements SET status = $3, updated_at = datetime('now', 'subsec') WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn purchase_order_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchase_orders WHERE requirement_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM requirements WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{db, seed_obra, seed_product};
    use utils::pagination::ListQuery;

    #[tokio::test]
    async fn numbers_follow_sequence_and_items_cascade() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-100").await;
        let product = seed_product(&db.pool, "FIE-03", 4.2).await;
        let data = CreateRequirement {
            obra_id: obra.id,
            requested_by: "Ing. Residente".to_string(),
            required_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            notes: None,
            items: vec![CreateRequirementItem {
                product_id: product.id,
                quantity: 120.0,
                notes: Some("Fierro 3/8".to_string()),
            }],
        };

        let mut tx = db.pool.begin().await.unwrap();
        let first = Requirement::insert(&mut tx, Uuid::new_v4(), &data).await.unwrap();
        Requirement::replace_items(&mut tx, first.id, &data.items).await.unwrap();
        let second = Requirement::insert(&mut tx, Uuid::new_v4(), &data).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.number, "REQ-000001");
        assert_eq!(second.number, "REQ-000002");
        assert_eq!(first.status, RequirementStatus::Pending);

        let detail = Requirement::find_detail(&db.pool, first.id).await.unwrap().unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].product_code, "FIE-03");

        let rows = Requirement::list(&db.pool, &ListQuery::default().page(100).unwrap(), Some(obra.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().map(|r| r.item_count).sum::<i64>(), 1);

        Requirement::delete(&db.pool, first.id).await.unwrap();
        assert!(Requirement::items(&db.pool, first.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_only_moves_from_the_expected_status() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-101").await;
        let product = seed_product(&db.pool, "CEM-01", 28.0).await;
        let data = CreateRequirement {
            obra_id: obra.id,
            requested_by: "Almacén".to_string(),
            required_date: None,
            notes: None,
            items: vec![CreateRequirementItem {
                product_id: product.id,
                quantity: 10.0,
                notes: None,
            }],
        };
        let mut conn = db.pool.acquire().await.unwrap();
        let requirement = Requirement::insert(&mut conn, Uuid::new_v4(), &data).await.unwrap();
        drop(conn);

        let moved = Requirement::transition_status(
            &db.pool,
            requirement.id,
            RequirementStatus::Pending,
            RequirementStatus::Approved,
        )
        .await
        .unwrap();
        assert!(moved);

        // a second decision sees the row is no longer pending
        let moved = Requirement::transition_status(
            &db.pool,
            requirement.id,
            RequirementStatus::Pending,
            RequirementStatus::Rejected,
        )
        .await
        .unwrap();
        assert!(!moved);
        let current = Requirement::find_by_id(&db.pool, requirement.id).await.unwrap().unwrap();
        assert_eq!(current.status, RequirementStatus::Approved);

        assert!(
            !Requirement::transition_status(
                &db.pool,
                Uuid::new_v4(),
                RequirementStatus::Approved,
                RequirementStatus::Attended,
            )
            .await
            .unwrap()
        );
    }

    #[test]
    fn requires_at_least_one_positive_item() {
        let mut data = CreateRequirement {
            obra_id: Uuid::new_v4(),
            requested_by: "Almacén".to_string(),
            required_date: None,
            notes: None,
            items: vec![],
        };
        assert!(data.validate().unwrap_err().fields().contains_key("items"));

        data.items.push(CreateRequirementItem {
            product_id: Uuid::new_v4(),
            quantity: 0.0,
            notes: None,
        });
        assert!(data.validate().unwrap_err().fields().contains_key("items.0.quantity"));
    }
}
