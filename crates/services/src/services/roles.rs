use db::models::role::{CreateRole, Role, RoleWithPermissions, UpdateRole};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::validation::{Validate, ValidationErrors};
use uuid::Uuid;

use super::permissions;

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("role not found")]
    NotFound,
    #[error("The role is assigned to {0} user(s).")]
    InUse(i64),
    #[error("The administrator role cannot be modified.")]
    AdminRole,
}

#[derive(Clone)]
pub struct RoleService {
    pool: SqlitePool,
}

impl RoleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check(&self, data: &CreateRole, except: Option<Uuid>) -> Result<(), RoleError> {
        let mut errors = data.validate().err().unwrap_or_default();
        if let Err(unknown) = permissions::check_known(&data.permissions) {
            errors.merge(unknown);
        }
        if Role::name_taken(&self.pool, &data.name, except).await? {
            errors.add("name", "The name has already been taken.");
        }
        Ok(errors.into_result()?)
    }

    async fn editable(&self, id: Uuid) -> Result<Role, RoleError> {
        let role = Role::find_by_id(&self.pool, id)
            .await?
            .ok_or(RoleError::NotFound)?;
        if role.is_admin {
            return Err(RoleError::AdminRole);
        }
        Ok(role)
    }

    async fn with_permissions(&self, id: Uuid) -> Result<RoleWithPermissions, RoleError> {
        Role::find_with_permissions(&self.pool, id)
            .await?
            .ok_or(RoleError::NotFound)
    }

    pub async fn create(&self, data: &CreateRole) -> Result<RoleWithPermissions, RoleError> {
        self.check(data, None).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        let role = Role::insert(
            &mut tx,
            Uuid::new_v4(),
            &data.name,
            data.description.as_deref(),
            false,
        )
        .await?;
        Role::replace_permissions(&mut tx, role.id, &data.permissions).await?;
        tx.commit().await?;

        self.with_permissions(role.id).await
    }

    pub async fn update(&self, id: Uuid, data: &UpdateRole) -> Result<RoleWithPermissions, RoleError> {
        self.editable(id).await?;
        self.check(data, Some(id)).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        Role::update_header(&mut tx, id, data)
            .await?
            .ok_or(RoleError::NotFound)?;
        Role::replace_permissions(&mut tx, id, &data.permissions).await?;
        tx.commit().await?;

        self.with_permissions(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RoleError> {
        self.editable(id).await?;
        let users = Role::user_count(&self.pool, id).await?;
        if users > 0 {
            return Err(RoleError::InUse(users));
        }
        Role::delete(&self.pool, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        bootstrap,
        test_support::{db, seed_user},
    };

    fn payload(name: &str, permissions: &[&str]) -> CreateRole {
        CreateRole {
            name: name.to_string(),
            description: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn permissions_must_come_from_the_catalog() {
        let db = db().await;
        let service = RoleService::new(db.pool.clone());

        let Err(RoleError::Validation(errors)) = service
            .create(&payload("Logística", &["ordenes_compra.view", "ordenes_compra.fly"]))
            .await
        else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains_key("permissions.1"));

        let role = service
            .create(&payload("Logística", &["ordenes_compra.view", "ordenes_compra.create"]))
            .await
            .unwrap();
        assert_eq!(
            role.permissions,
            vec!["ordenes_compra.create", "ordenes_compra.view"]
        );
    }

    #[tokio::test]
    async fn role_with_users_cannot_be_deleted() {
        let db = db().await;
        let user = seed_user(&db.pool, "capataz@obra.pe", "password1", &[], true).await;
        let service = RoleService::new(db.pool.clone());
        assert!(matches!(
            service.delete(user.role_id).await,
            Err(RoleError::InUse(1))
        ));

        let unused = service.create(&payload("Temporal", &[])).await.unwrap();
        service.delete(unused.role.id).await.unwrap();
        assert!(matches!(
            service.delete(unused.role.id).await,
            Err(RoleError::NotFound)
        ));
    }

    #[tokio::test]
    async fn admin_role_is_protected() {
        let db = db().await;
        let admin = bootstrap::ensure_admin_role(&db.pool).await.unwrap();
        let service = RoleService::new(db.pool.clone());
        assert!(matches!(
            service.update(admin.id, &payload("root", &[])).await,
            Err(RoleError::AdminRole)
        ));
        assert!(matches!(service.delete(admin.id).await, Err(RoleError::AdminRole)));
    }
}
