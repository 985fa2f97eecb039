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
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid, // Foreign key to Category
    pub code: String,
    pub name: String,
    pub unit: String, // und, m3, bls, kg ...
    pub unit_price: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shown in the products table, with the category name joined in
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub product: Product,
    pub category_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProduct {
    pub category_id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub unit_price: f64,
    pub description: Option<String>,
}

pub type UpdateProduct = CreateProduct;

impl Validate for CreateProduct {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("code", &self.code)
            .max_len("code", &self.code, 30)
            .required("name", &self.name)
            .max_len("name", &self.name, 150)
            .required("unit", &self.unit)
            .max_len("unit", &self.unit, 20)
            .non_negative("unit_price", self.unit_price)
            .finish()
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.code, p.name, p.unit, p.unit_price, p.description, p.created_at, p.updated_at";

impl Product {
    pub async fn list(
        pool: &SqlitePool,
        page: &Page,
    ) -> Result<Vec<ProductWithCategory>, sqlx::Error> {
        let query = format!(
            r#"SELECT {PRODUCT_COLUMNS}, c.name AS category_name
               FROM products p
               JOIN categories c ON c.id = p.category_id
               WHERE p.code LIKE $1 ESCAPE '\' OR p.name LIKE $1 ESCAPE '\'
               ORDER BY p.created_at DESC, p.rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, ProductWithCategory>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "products").await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1");
        sqlx::query_as::<_, Product>(&query)
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
            "SELECT COUNT(*) FROM products WHERE code = $1 COLLATE NOCASE AND ($2 IS NULL OR id <> $2)",
        )
        .bind(code.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Ids from `ids` that have no product row, in input order.
    pub async fn missing_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
        let mut missing = Vec::new();
        for id in ids {
            if !super::row_exists(pool, "products", *id).await? {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProduct,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"INSERT INTO products (id, category_id, code, name, unit, unit_price, description)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, category_id, code, name, unit, unit_price, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.category_id)
        .bind(data.code.trim())
        .bind(data.name.trim())
        .bind(data.unit.trim())
        .bind(data.unit_price)
        .bind(&data.description)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"UPDATE products
               SET category_id = $2, code = $3, name = $4, unit = $5, unit_price = $6,
                   description = $7, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, category_id, code, name, unit, unit_price, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.category_id)
        .bind(data.code.trim())
        .bind(data.name.trim())
        .bind(data.unit.trim())
        .bind(data.unit_price)
        .bind(&data.description)
        .fetch_optional(pool)
        .await
    }

    /// Number of requirement and purchase-order lines that reference the product
    pub async fn usage_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT (SELECT COUNT(*) FROM requirement_items WHERE product_id = $1)
                    + (SELECT COUNT(*) FROM purchase_order_items WHERE product_id = $1)"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        category::{Category, CreateCategory},
        test_support::db,
    };
    use utils::pagination::ListQuery;

    async fn seed_category(pool: &SqlitePool) -> Category {
        Category::create(
            pool,
            &CreateCategory {
                name: "Cementos".to_string(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    fn payload(category_id: Uuid, code: &str, name: &str) -> CreateProduct {
        CreateProduct {
            category_id,
            code: code.to_string(),
            name: name.to_string(),
            unit: "bls".to_string(),
            unit_price: 28.5,
            description: None,
        }
    }

    #[tokio::test]
    async fn list_joins_category_name() {
        let db = db().await;
        let category = seed_category(&db.pool).await;
        Product::create(&db.pool, &payload(category.id, "CEM-01", "Cemento Sol tipo I"), Uuid::new_v4())
            .await
            .unwrap();

        let rows = Product::list(&db.pool, &ListQuery::default().page(100).unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category_name, "Cementos");
        assert_eq!(rows[0].product.unit_price, 28.5);
    }

    #[tokio::test]
    async fn unknown_category_violates_foreign_key() {
        let db = db().await;
        let err = Product::create(&db.pool, &payload(Uuid::new_v4(), "X-1", "Huérfano"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(crate::is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn duplicate_code_is_detected() {
        let db = db().await;
        let category = seed_category(&db.pool).await;
        Product::create(&db.pool, &payload(category.id, "CEM-01", "Cemento"), Uuid::new_v4())
            .await
            .unwrap();
        assert!(Product::code_taken(&db.pool, "cem-01", None).await.unwrap());

        let err = Product::create(&db.pool, &payload(category.id, "CEM-01", "Otro"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn negative_price_fails_validation() {
        let mut data = payload(Uuid::new_v4(), "A", "B");
        data.unit_price = -1.0;
        assert!(data.validate().unwrap_err().fields().contains_key("unit_price"));
    }
}
