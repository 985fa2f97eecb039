//! First-start provisioning: the `admin` role and, on an empty database, an admin user.

use db::models::{role::Role, user::User};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::{
    auth::{AuthError, hash_password},
    config::AdminSeed,
};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Ensure the admin role exists and return it.
pub async fn ensure_admin_role(pool: &SqlitePool) -> Result<Role, BootstrapError> {
    if let Some(role) = Role::find_by_name(pool, ADMIN_ROLE).await? {
        return Ok(role);
    }
    let mut conn = pool.acquire().await?;
    let role = Role::insert(
        &mut conn,
        Uuid::new_v4(),
        ADMIN_ROLE,
        Some("Acceso total"),
        true,
    )
    .await?;
    info!(role_id = %role.id, "Created admin role");
    Ok(role)
}

/// Returns the created user, or `None` when users already exist or no seed is configured.
pub async fn run(pool: &SqlitePool, seed: Option<&AdminSeed>) -> Result<Option<User>, BootstrapError> {
    let role = ensure_admin_role(pool).await?;

    let Some(seed) = seed else {
        return Ok(None);
    };
    if User::count(pool).await? > 0 {
        return Ok(None);
    }

    let hash = hash_password(&seed.password)?;
    let user = User::create(
        pool,
        Uuid::new_v4(),
        "Administrador",
        &seed.email,
        &hash,
        role.id,
        true,
    )
    .await?;
    info!(user_id = %user.id, email = %user.email, "Created bootstrap admin user");
    Ok(Some(user))
}
