pub mod attendance;
pub mod category;
pub mod obra;
pub mod position;
pub mod product;
pub mod purchase_order;
pub mod quotation;
pub mod requirement;
pub mod role;
pub mod training;
pub mod user;
pub mod worker;

use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

/// Whether a row with `id` exists in `table`. Table names are compile-time constants.
pub async fn row_exists(pool: &SqlitePool, table: &'static str, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    let found = sqlx::query_scalar::<_, i64>(&query)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(found > 0)
}

/// Count every row of `table`.
pub async fn count_rows(pool: &SqlitePool, table: &'static str) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await
}

/// Next value of a per-table document sequence (`REQ-000042`). Call inside the
/// [`crate::begin_write`] transaction that inserts the row, which holds the
/// write lock until commit.
pub async fn next_sequence<'e, E>(executor: E, table: &'static str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {table}");
    sqlx::query_scalar::<_, i64>(&query).fetch_one(executor).await
}

pub fn document_number(prefix: &str, seq: i64) -> String {
    format!("{prefix}-{seq:06}")
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use uuid::Uuid;

    use super::{
        category::{Category, CreateCategory},
        obra::{CreateObra, Obra},
        position::{CreatePosition, Position},
        product::{CreateProduct, Product},
        worker::{CreateWorker, Worker},
    };
    use crate::DBService;

    pub async fn db() -> DBService {
        DBService::new_in_memory()
            .await
            .expect("in-memory database with migrations")
    }

    pub async fn seed_obra(pool: &SqlitePool, code: &str) -> Obra {
        let data = CreateObra {
            code: code.to_string(),
            name: format!("Obra {code}"),
            client: None,
            location: None,
            start_date: None,
            end_date: None,
            budget: 0.0,
            status: None,
        };
        Obra::create(pool, &data, Uuid::new_v4()).await.unwrap()
    }

    pub async fn seed_position(pool: &SqlitePool, name: &str, daily_rate: f64) -> Position {
        let data = CreatePosition {
            name: name.to_string(),
            description: None,
            daily_rate,
        };
        Position::create(pool, &data, Uuid::new_v4()).await.unwrap()
    }

    pub async fn seed_worker(pool: &SqlitePool, dni: &str, daily_rate: f64) -> Worker {
        let position = seed_position(pool, &format!("Cargo {dni}"), daily_rate).await;
        let data = CreateWorker {
            document_number: dni.to_string(),
            first_name: "Pedro".to_string(),
            last_name: format!("Huamán {dni}"),
            position_id: position.id,
            obra_id: None,
            phone: None,
            active: None,
        };
        Worker::create(pool, &data, Uuid::new_v4()).await.unwrap()
    }

    pub async fn seed_product(pool: &SqlitePool, code: &str, unit_price: f64) -> Product {
        let category = Category::create(
            pool,
            &CreateCategory {
                name: format!("Categoría {code}"),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let data = CreateProduct {
            category_id: category.id,
            code: code.to_string(),
            name: format!("Producto {code}"),
            unit: "und".to_string(),
            unit_price,
            description: None,
        };
        Product::create(pool, &data, Uuid::new_v4()).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_numbers_are_zero_padded() {
        assert_eq!(document_number("OC", 42), "OC-000042");
        assert_eq!(document_number("REQ", 1_234_567), "REQ-1234567");
    }
}
