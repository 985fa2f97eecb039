//! Existence checks for ids carried in request bodies. Failures are field
//! errors (422), not missing resources.

use db::models::{obra::Obra, product::Product, worker::Worker};
use sqlx::SqlitePool;
use utils::validation::ValidationErrors;
use uuid::Uuid;

pub fn invalid(field: &str) -> String {
    format!("The selected {field} is invalid.")
}

pub fn taken(field: &str) -> String {
    format!("The {field} has already been taken.")
}

pub async fn check_obra(
    pool: &SqlitePool,
    field: &str,
    obra_id: Option<Uuid>,
    errors: &mut ValidationErrors,
) -> Result<(), sqlx::Error> {
    if let Some(obra_id) = obra_id {
        if !Obra::exists(pool, obra_id).await? {
            errors.add(field, invalid(field));
        }
    }
    Ok(())
}

pub async fn check_worker(
    pool: &SqlitePool,
    field: &str,
    worker_id: Uuid,
    errors: &mut ValidationErrors,
) -> Result<(), sqlx::Error> {
    if !Worker::exists(pool, worker_id).await? {
        errors.add(field, invalid(field));
    }
    Ok(())
}

/// Flags `items.N.product_id` for every line whose product does not exist
pub async fn check_products(
    pool: &SqlitePool,
    product_ids: &[Uuid],
    errors: &mut ValidationErrors,
) -> Result<(), sqlx::Error> {
    let missing = Product::missing_ids(pool, product_ids).await?;
    for (index, id) in product_ids.iter().enumerate() {
        if missing.contains(id) {
            errors.add(&format!("items.{index}.product_id"), invalid("product_id"));
        }
    }
    Ok(())
}
