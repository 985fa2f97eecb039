//! Checks that the database schema matches the embedded migrations.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tables every request path touches
pub const REQUIRED_TABLES: &[&str] = &[
    "roles",
    "role_permissions",
    "users",
    "categories",
    "products",
    "obras",
    "positions",
    "workers",
    "requirements",
    "purchase_orders",
    "attendances",
    "trainings",
    "quotations",
];

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_one(&self.pool)
        .await?
            > 0;

        if !migrations_table_exists {
            warn!("Database has no _sqlx_migrations table");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                latest_migration: None,
                pending_migrations: db::MIGRATOR
                    .iter()
                    .map(|m| m.description.to_string())
                    .collect(),
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let applied: Vec<i64> =
            sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?;
        let pending_migrations = db::MIGRATOR
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .map(|m| m.description.to_string())
            .collect::<Vec<_>>();
        let missing_tables = self.missing_tables(REQUIRED_TABLES).await?;
        let latest_migration = self.latest_migration().await?;

        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: applied.len(),
            latest_migration,
            pending_migrations,
            missing_tables,
        };
        if result.is_ok() {
            info!(migrations_applied = result.migrations_applied, "Database validation complete");
        } else {
            warn!(summary = %result.summary(), "Database validation found problems");
        }
        Ok(result)
    }

    pub async fn missing_tables(
        &self,
        required_tables: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing = Vec::new();
        for table in required_tables {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            )
            .bind(*table)
            .fetch_one(&self.pool)
            .await?
                > 0;
            if !exists {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    async fn latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        let migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(migration)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub pending_migrations: Vec<String>,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.pending_migrations.is_empty() && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.pending_migrations.is_empty() {
            format!("Pending migrations: {}", self.pending_migrations.join(", "))
        } else if !self.missing_tables.is_empty() {
            format!("Missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}
