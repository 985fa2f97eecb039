use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Admin roles hold every permission regardless of `role_permissions`
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct RoleSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub role: Role,
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    #[ts(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub type UpdateRole = CreateRole;

impl Validate for CreateRole {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 50)
            .max_len_opt("description", self.description.as_deref(), 255)
            .finish()
    }
}

const ROLE_COLUMNS: &str = "r.id, r.name, r.description, r.is_admin, r.created_at, r.updated_at";

impl Role {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<RoleSummary>, sqlx::Error> {
        let query = format!(
            r#"SELECT {ROLE_COLUMNS},
                      (SELECT COUNT(*) FROM users u WHERE u.role_id = r.id) AS user_count
               FROM roles r
               WHERE r.name LIKE $1 ESCAPE '\'
               ORDER BY r.name ASC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, RoleSummary>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "roles").await
    }

    pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        super::row_exists(pool, "roles", id).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles r WHERE r.id = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ROLE_COLUMNS} FROM roles r WHERE r.name = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(name.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_with_permissions(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, sqlx::Error> {
        let Some(role) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let permissions = Self::permissions(pool, id).await?;
        Ok(Some(RoleWithPermissions { role, permissions }))
    }

    pub async fn name_taken(
        pool: &SqlitePool,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM roles WHERE name = $1 AND ($2 IS NULL OR id <> $2)",
        )
        .bind(name.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Granted permission tags, sorted
    pub async fn permissions(pool: &SqlitePool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT permission FROM role_permissions WHERE role_id = $1 ORDER BY permission ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"INSERT INTO roles (id, name, description, is_admin)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, description, is_admin, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(description)
        .bind(is_admin)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn update_header(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &UpdateRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"UPDATE roles
               SET name = $2, description = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, description, is_admin, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.description)
        .fetch_optional(&mut *conn)
        .await
    }

    pub async fn replace_permissions(
        conn: &mut SqliteConnection,
        id: Uuid,
        permissions: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for permission in permissions {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(permission)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn user_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
