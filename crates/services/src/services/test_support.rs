use db::{
    DBService,
    models::{
        category::{Category, CreateCategory},
        obra::{CreateObra, Obra},
        position::{CreatePosition, Position},
        product::{CreateProduct, Product},
        role::Role,
        user::User,
        worker::{CreateWorker, Worker},
    },
};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::auth::hash_password;

pub async fn db() -> DBService {
    DBService::new_in_memory()
        .await
        .expect("in-memory database with migrations")
}

pub async fn seed_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    permissions: &[&str],
    active: bool,
) -> User {
    let mut conn = pool.acquire().await.unwrap();
    let role = Role::insert(&mut conn, Uuid::new_v4(), &format!("Rol {email}"), None, false)
        .await
        .unwrap();
    let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    Role::replace_permissions(&mut conn, role.id, &permissions)
        .await
        .unwrap();
    drop(conn);
    let hash = hash_password(password).unwrap();
    User::create(pool, Uuid::new_v4(), "Usuario", email, &hash, role.id, active)
        .await
        .unwrap()
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

pub async fn seed_worker(pool: &SqlitePool, dni: &str, daily_rate: f64) -> Worker {
    let position = Position::create(
        pool,
        &CreatePosition {
            name: format!("Cargo {dni}"),
            description: None,
            daily_rate,
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap();
    let data = CreateWorker {
        document_number: dni.to_string(),
        first_name: "Rosa".to_string(),
        last_name: format!("Condori {dni}"),
        position_id: position.id,
        obra_id: None,
        phone: None,
        active: None,
    };
    Worker::create(pool, &data, Uuid::new_v4()).await.unwrap()
}
