//! Requisition workflow: drafting while pending, approval, rejection.

use db::models::requirement::{
    CreateRequirement, Requirement, RequirementDetail, RequirementStatus, UpdateRequirement,
};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use utils::validation::{Validate, ValidationErrors};
use uuid::Uuid;

use super::references;

#[derive(Debug, Error)]
pub enum RequirementError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("requirement not found")]
    NotFound,
    #[error("The requirement is {0}; only pending requirements can be changed.")]
    NotPending(RequirementStatus),
}

#[derive(Clone)]
pub struct RequirementService {
    pool: SqlitePool,
}

impl RequirementService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check(&self, data: &CreateRequirement) -> Result<(), RequirementError> {
        let mut errors = data.validate().err().unwrap_or_default();
        references::check_obra(&self.pool, "obra_id", Some(data.obra_id), &mut errors).await?;
        let product_ids: Vec<Uuid> = data.items.iter().map(|i| i.product_id).collect();
        references::check_products(&self.pool, &product_ids, &mut errors).await?;
        Ok(errors.into_result()?)
    }

    /// Loads the requirement inside a write transaction and fails unless it is
    /// still pending. The transaction keeps it pending until commit.
    async fn find_pending(tx: &mut SqliteConnection, id: Uuid) -> Result<Requirement, RequirementError> {
        let requirement = Requirement::find_by_id(&mut *tx, id)
            .await?
            .ok_or(RequirementError::NotFound)?;
        if requirement.status != RequirementStatus::Pending {
            return Err(RequirementError::NotPending(requirement.status));
        }
        Ok(requirement)
    }

    async fn detail(&self, id: Uuid) -> Result<RequirementDetail, RequirementError> {
        Requirement::find_detail(&self.pool, id)
            .await?
            .ok_or(RequirementError::NotFound)
    }

    pub async fn create(&self, data: &CreateRequirement) -> Result<RequirementDetail, RequirementError> {
        self.check(data).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        let requirement = Requirement::insert(&mut tx, Uuid::new_v4(), data).await?;
        Requirement::replace_items(&mut tx, requirement.id, &data.items).await?;
        tx.commit().await?;

        self.detail(requirement.id).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        data: &UpdateRequirement,
    ) -> Result<RequirementDetail, RequirementError> {
        self.check(data).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        Self::find_pending(&mut tx, id).await?;
        Requirement::update_header(&mut tx, id, data).await?;
        Requirement::replace_items(&mut tx, id, &data.items).await?;
        tx.commit().await?;

        self.detail(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RequirementError> {
        let mut tx = db::begin_write(&self.pool).await?;
        Self::find_pending(&mut tx, id).await?;
        Requirement::delete(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn approve(&self, id: Uuid) -> Result<RequirementDetail, RequirementError> {
        self.decide(id, RequirementStatus::Approved).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<RequirementDetail, RequirementError> {
        self.decide(id, RequirementStatus::Rejected).await
    }

    async fn decide(
        &self,
        id: Uuid,
        status: RequirementStatus,
    ) -> Result<RequirementDetail, RequirementError> {
        let moved = Requirement::transition_status(
            &self.pool,
            id,
            RequirementStatus::Pending,
            status,
        )
        .await?;
        if !moved {
            let current = Requirement::find_by_id(&self.pool, id)
                .await?
                .ok_or(RequirementError::NotFound)?;
            return Err(RequirementError::NotPending(current.status));
        }
        self.detail(id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::models::requirement::CreateRequirementItem;

    use super::*;
    use crate::services::test_support::{db, seed_obra, seed_product};

    fn payload(obra_id: Uuid, product_id: Uuid, quantity: f64) -> CreateRequirement {
        CreateRequirement {
            obra_id,
            requested_by: "Ing. Residente".to_string(),
            required_date: NaiveDate::from_ymd_opt(2025, 6, 15),
            notes: None,
            items: vec![CreateRequirementItem {
                product_id,
                quantity,
                notes: None,
            }],
        }
    }

    #[tokio::test]
    async fn unknown_references_are_field_errors() {
        let db = db().await;
        let service = RequirementService::new(db.pool.clone());
        let result = service.create(&payload(Uuid::new_v4(), Uuid::new_v4(), 5.0)).await;
        let Err(RequirementError::Validation(errors)) = result else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains_key("obra_id"));
        assert!(errors.fields().contains_key("items.0.product_id"));
    }

    #[tokio::test]
    async fn edits_only_while_pending() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-10").await;
        let product = seed_product(&db.pool, "FIE-3/8", 32.5).await;
        let service = RequirementService::new(db.pool.clone());

        let created = service.create(&payload(obra.id, product.id, 5.0)).await.unwrap();
        assert_eq!(created.requirement.number, "REQ-000001");
        assert_eq!(created.requirement.status, RequirementStatus::Pending);

        let updated = service
            .update(created.requirement.id, &payload(obra.id, product.id, 12.0))
            .await
            .unwrap();
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].quantity, 12.0);

        let approved = service.approve(created.requirement.id).await.unwrap();
        assert_eq!(approved.requirement.status, RequirementStatus::Approved);

        assert!(matches!(
            service.update(created.requirement.id, &payload(obra.id, product.id, 1.0)).await,
            Err(RequirementError::NotPending(RequirementStatus::Approved))
        ));
        assert!(matches!(
            service.reject(created.requirement.id).await,
            Err(RequirementError::NotPending(_))
        ));
        assert!(matches!(
            service.delete(created.requirement.id).await,
            Err(RequirementError::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn pending_requirement_can_be_deleted() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-11").await;
        let product = seed_product(&db.pool, "CLAV-3", 8.0).await;
        let service = RequirementService::new(db.pool.clone());
        let created = service.create(&payload(obra.id, product.id, 2.0)).await.unwrap();

        service.delete(created.requirement.id).await.unwrap();
        assert!(matches!(
            service.delete(created.requirement.id).await,
            Err(RequirementError::NotFound)
        ));
    }
}
