use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub role_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct UserWithRole {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub user: User,
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: Uuid,
    pub active: Option<bool>,
}

/// Empty or missing `password` keeps the current hash
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role_id: Uuid,
    pub active: Option<bool>,
}

impl UpdateUser {
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl Validate for CreateUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 150)
            .required("email", &self.email)
            .email("email", &self.email)
            .min_len("password", &self.password, MIN_PASSWORD_LEN)
            .finish()
    }
}

impl Validate for UpdateUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("name", &self.name)
            .max_len("name", &self.name, 150)
            .required("email", &self.email)
            .email("email", &self.email);
        if let Some(password) = self.new_password() {
            v.min_len("password", password, MIN_PASSWORD_LEN);
        }
        v.finish()
    }
}

const USER_COLUMNS: &str =
    "u.id, u.name, u.email, u.password_hash, u.role_id, u.active, u.created_at, u.updated_at";

impl User {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<UserWithRole>, sqlx::Error> {
        let query = format!(
            r#"SELECT {USER_COLUMNS}, r.name AS role_name
               FROM users u
               JOIN roles r ON r.id = u.role_id
               WHERE u.name LIKE $1 ESCAPE '\' OR u.email LIKE $1 ESCAPE '\'
               ORDER BY u.name ASC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, UserWithRole>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "users").await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_with_role(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<UserWithRole>, sqlx::Error> {
        let query = format!(
            r#"SELECT {USER_COLUMNS}, r.name AS role_name
               FROM users u
               JOIN roles r ON r.id = u.role_id
               WHERE u.id = $1"#
        );
        sqlx::query_as::<_, UserWithRole>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn email_taken(
        pool: &SqlitePool,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1 AND ($2 IS NULL OR id <> $2)",
        )
        .bind(email.trim())
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        role_id: Uuid,
        active: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, email, password_hash, role_id, active)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, name, email, password_hash, role_id, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(email.trim())
        .bind(password_hash)
        .bind(role_id)
        .bind(active)
        .fetch_one(executor)
        .await
    }

    /// `password_hash` of `None` leaves the stored hash untouched
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateUser,
        password_hash: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET name = $2, email = $3, role_id = $4, active = COALESCE($5, active),
                   password_hash = COALESCE($6, password_hash), updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, email, password_hash, role_id, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.email.trim())
        .bind(data.role_id)
        .bind(data.active)
        .bind(password_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
