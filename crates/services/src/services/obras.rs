use db::models::obra::{CreateObra, Obra, ObraReferences, UpdateObra};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use utils::{
    money::round2,
    validation::{Validate, ValidationErrors},
};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObraError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("obra not found")]
    NotFound,
    #[error("The obra is still referenced by: {}", .0.join(", "))]
    Referenced(Vec<&'static str>),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ObraSummary {
    pub obra: Obra,
    pub references: ObraReferences,
    /// Issued and received purchase orders
    pub committed_spend: f64,
    pub budget_remaining: f64,
}

#[derive(Clone)]
pub struct ObraService {
    pool: SqlitePool,
}

impl ObraService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check(&self, data: &CreateObra, except: Option<Uuid>) -> Result<(), ObraError> {
        let mut errors = data.validate().err().unwrap_or_default();
        if Obra::code_taken(&self.pool, &data.code, except).await? {
            errors.add("code", "The code has already been taken.");
        }
        Ok(errors.into_result()?)
    }

    pub async fn create(&self, data: &CreateObra) -> Result<Obra, ObraError> {
        self.check(data, None).await?;
        Ok(Obra::create(&self.pool, data, Uuid::new_v4()).await?)
    }

    pub async fn update(&self, id: Uuid, data: &UpdateObra) -> Result<Obra, ObraError> {
        if !Obra::exists(&self.pool, id).await? {
            return Err(ObraError::NotFound);
        }
        self.check(data, Some(id)).await?;
        Obra::update(&self.pool, id, data)
            .await?
            .ok_or(ObraError::NotFound)
    }

    /// Refuses while anything still points at the obra; nothing is removed in that case.
    pub async fn delete(&self, id: Uuid) -> Result<(), ObraError> {
        if !Obra::exists(&self.pool, id).await? {
            return Err(ObraError::NotFound);
        }
        let references = Obra::references(&self.pool, id).await?;
        if !references.is_empty() {
            return Err(ObraError::Referenced(references.names()));
        }
        Obra::delete(&self.pool, id).await?;
        Ok(())
    }

    pub async fn summary(&self, id: Uuid) -> Result<ObraSummary, ObraError> {
        let obra = Obra::find_by_id(&self.pool, id)
            .await?
            .ok_or(ObraError::NotFound)?;
        let references = Obra::references(&self.pool, id).await?;
        let committed_spend = round2(Obra::committed_spend(&self.pool, id).await?);
        Ok(ObraSummary {
            budget_remaining: round2(obra.budget - committed_spend),
            obra,
            references,
            committed_spend,
        })
    }
}
