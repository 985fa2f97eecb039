use db::models::{
    role::Role,
    user::{CreateUser, UpdateUser, User, UserWithRole},
};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::validation::{Validate, ValidationErrors};
use uuid::Uuid;

use super::{
    auth::{AuthError, hash_password},
    references,
};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("user not found")]
    NotFound,
    #[error("You cannot delete your own account.")]
    SelfDelete,
}

#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check_unique(
        &self,
        mut errors: ValidationErrors,
        email: &str,
        role_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<(), UserError> {
        if User::email_taken(&self.pool, email, except).await? {
            errors.add("email", "The email has already been taken.");
        }
        if !Role::exists(&self.pool, role_id).await? {
            errors.add("role_id", references::invalid("role_id"));
        }
        Ok(errors.into_result()?)
    }

    async fn with_role(&self, id: Uuid) -> Result<UserWithRole, UserError> {
        User::find_with_role(&self.pool, id)
            .await?
            .ok_or(UserError::NotFound)
    }

    pub async fn create(&self, data: &CreateUser) -> Result<UserWithRole, UserError> {
        let errors = data.validate().err().unwrap_or_default();
        self.check_unique(errors, &data.email, data.role_id, None).await?;

        let hash = hash_password(&data.password)?;
        let user = User::create(
            &self.pool,
            Uuid::new_v4(),
            &data.name,
            &data.email,
            &hash,
            data.role_id,
            data.active.unwrap_or(true),
        )
        .await?;
        self.with_role(user.id).await
    }

    pub async fn update(&self, id: Uuid, data: &UpdateUser) -> Result<UserWithRole, UserError> {
        if User::find_by_id(&self.pool, id).await?.is_none() {
            return Err(UserError::NotFound);
        }
        let errors = data.validate().err().unwrap_or_default();
        self.check_unique(errors, &data.email, data.role_id, Some(id)).await?;

        let hash = data.new_password().map(hash_password).transpose()?;
        User::update(&self.pool, id, data, hash.as_deref())
            .await?
            .ok_or(UserError::NotFound)?;
        self.with_role(id).await
    }

    pub async fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<(), UserError> {
        if id == actor_id {
            return Err(UserError::SelfDelete);
        }
        if User::delete(&self.pool, id).await? == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }
}
