//! Purchase orders: IGV totals, requirement linkage and the status machine.

use db::models::{
    purchase_order::{
        CreatePurchaseOrder, CreatePurchaseOrderItem, PurchaseOrder, PurchaseOrderDetail,
        PurchaseOrderStatus, PurchaseOrderTotals, UpdatePurchaseOrder,
    },
    requirement::{Requirement, RequirementStatus},
};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use utils::{
    money::{round2, tax_on},
    validation::{Validate, ValidationErrors},
};
use uuid::Uuid;

use super::references;

#[derive(Debug, Error)]
pub enum PurchaseOrderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("purchase order not found")]
    NotFound,
    #[error("Cannot change a purchase order from {from} to {to}.")]
    InvalidTransition {
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    },
    #[error("Only draft purchase orders can be edited.")]
    NotDraft,
    #[error("Only draft or cancelled purchase orders can be deleted.")]
    NotDeletable,
}

/// Line totals (parallel to `items`) and the order totals derived from them
pub fn compute_totals(
    items: &[CreatePurchaseOrderItem],
    igv_rate: f64,
) -> (Vec<f64>, PurchaseOrderTotals) {
    let line_totals: Vec<f64> = items
        .iter()
        .map(|item| round2(item.quantity * item.unit_price))
        .collect();
    let subtotal = round2(line_totals.iter().sum());
    let tax = tax_on(subtotal, igv_rate);
    let totals = PurchaseOrderTotals {
        subtotal,
        tax,
        total: round2(subtotal + tax),
    };
    (line_totals, totals)
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    pool: SqlitePool,
    igv_rate: f64,
}

impl PurchaseOrderService {
    pub fn new(pool: SqlitePool, igv_rate: f64) -> Self {
        Self { pool, igv_rate }
    }

    /// `current` is the order being edited, whose own requirement may already be attended
    async fn check(
        &self,
        data: &CreatePurchaseOrder,
        current: Option<&PurchaseOrder>,
    ) -> Result<(), PurchaseOrderError> {
        let mut errors = data.validate().err().unwrap_or_default();
        references::check_obra(&self.pool, "obra_id", Some(data.obra_id), &mut errors).await?;
        let product_ids: Vec<Uuid> = data.items.iter().map(|i| i.product_id).collect();
        references::check_products(&self.pool, &product_ids, &mut errors).await?;

        if let Some(requirement_id) = data.requirement_id {
            let already_linked = current.and_then(|po| po.requirement_id) == Some(requirement_id);
            match Requirement::find_by_id(&self.pool, requirement_id).await? {
                None => errors.add("requirement_id", references::invalid("requirement_id")),
                Some(requirement) if requirement.obra_id != data.obra_id => errors.add(
                    "requirement_id",
                    "The requirement belongs to a different obra.",
                ),
                Some(requirement) => {
                    let usable = requirement.status == RequirementStatus::Approved
                        || (already_linked && requirement.status == RequirementStatus::Attended);
                    if !usable {
                        errors.add("requirement_id", "The requirement must be approved.");
                    }
                }
            }
        }
        Ok(errors.into_result()?)
    }

    async fn detail(&self, id: Uuid) -> Result<PurchaseOrderDetail, PurchaseOrderError> {
        PurchaseOrder::find_detail(&self.pool, id)
            .await?
            .ok_or(PurchaseOrderError::NotFound)
    }

    pub async fn create(
        &self,
        data: &CreatePurchaseOrder,
    ) -> Result<PurchaseOrderDetail, PurchaseOrderError> {
        self.check(data, None).await?;
        let (line_totals, totals) = compute_totals(&data.items, self.igv_rate);

        let mut tx = db::begin_write(&self.pool).await?;
        let order = PurchaseOrder::insert(&mut tx, Uuid::new_v4(), data, totals).await?;
        PurchaseOrder::replace_items(&mut tx, order.id, &data.items, &line_totals).await?;
        if let Some(requirement_id) = data.requirement_id {
            attend(&mut tx, requirement_id).await?;
        }
        tx.commit().await?;

        self.detail(order.id).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        data: &UpdatePurchaseOrder,
    ) -> Result<PurchaseOrderDetail, PurchaseOrderError> {
        let current = PurchaseOrder::find_by_id(&self.pool, id)
            .await?
            .ok_or(PurchaseOrderError::NotFound)?;
        if current.status != PurchaseOrderStatus::Draft {
            return Err(PurchaseOrderError::NotDraft);
        }
        self.check(data, Some(&current)).await?;
        let (line_totals, totals) = compute_totals(&data.items, self.igv_rate);

        let mut tx = db::begin_write(&self.pool).await?;
        // re-read under the write lock, the checks above ran without it
        let current = PurchaseOrder::find_by_id(&mut *tx, id)
            .await?
            .ok_or(PurchaseOrderError::NotFound)?;
        if current.status != PurchaseOrderStatus::Draft {
            return Err(PurchaseOrderError::NotDraft);
        }
        PurchaseOrder::update_header(&mut tx, id, data, totals).await?;
        PurchaseOrder::replace_items(&mut tx, id, &data.items, &line_totals).await?;
        if data.requirement_id != current.requirement_id {
            if let Some(previous) = current.requirement_id {
                release(&mut tx, previous).await?;
            }
            if let Some(requirement_id) = data.requirement_id {
                attend(&mut tx, requirement_id).await?;
            }
        }
        tx.commit().await?;

        self.detail(id).await
    }

    pub async fn change_status(
        &self,
        id: Uuid,
        next: PurchaseOrderStatus,
    ) -> Result<PurchaseOrderDetail, PurchaseOrderError> {
        let mut tx = db::begin_write(&self.pool).await?;
        let order = PurchaseOrder::find_by_id(&mut *tx, id)
            .await?
            .ok_or(PurchaseOrderError::NotFound)?;
        if !order.status.can_transition_to(next) {
            return Err(PurchaseOrderError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }
        PurchaseOrder::update_status(&mut *tx, id, next).await?;
        tx.commit().await?;

        self.detail(id).await
    }

    /// Deleting the order hands its requirement back to `approved`.
    pub async fn delete(&self, id: Uuid) -> Result<(), PurchaseOrderError> {
        let mut tx = db::begin_write(&self.pool).await?;
        let order = PurchaseOrder::find_by_id(&mut *tx, id)
            .await?
            .ok_or(PurchaseOrderError::NotFound)?;
        if !order.status.is_deletable() {
            return Err(PurchaseOrderError::NotDeletable);
        }
        PurchaseOrder::delete(&mut *tx, id).await?;
        if let Some(requirement_id) = order.requirement_id {
            release(&mut tx, requirement_id).await?;
        }
        tx.commit().await?;

        Ok(())
    }
}

/// Links the requirement to an order. Only an `approved` requirement can be
/// attended, so a second order racing for the same one is rejected here.
async fn attend(tx: &mut SqliteConnection, requirement_id: Uuid) -> Result<(), PurchaseOrderError> {
    let moved = Requirement::transition_status(
        &mut *tx,
        requirement_id,
        RequirementStatus::Approved,
        RequirementStatus::Attended,
    )
    .await?;
    if !moved {
        return Err(
            ValidationErrors::single("requirement_id", "The requirement must be approved.").into(),
        );
    }
    Ok(())
}

async fn release(tx: &mut SqliteConnection, requirement_id: Uuid) -> Result<(), PurchaseOrderError> {
    Requirement::transition_status(
        &mut *tx,
        requirement_id,
        RequirementStatus::Attended,
        RequirementStatus::Approved,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::models::requirement::{CreateRequirement, CreateRequirementItem};

    use super::*;
    use crate::services::{
        requirements::RequirementService,
        test_support::{db, seed_obra, seed_product},
    };

    fn item(product_id: Uuid, quantity: f64, unit_price: f64) -> CreatePurchaseOrderItem {
        CreatePurchaseOrderItem {
            product_id,
            description: None,
            quantity,
            unit_price,
        }
    }

    fn payload(
        obra_id: Uuid,
        requirement_id: Option<Uuid>,
        items: Vec<CreatePurchaseOrderItem>,
    ) -> CreatePurchaseOrder {
        CreatePurchaseOrder {
            obra_id,
            requirement_id,
            supplier_name: "Ferretería El Constructor EIRL".to_string(),
            supplier_ruc: "20512345678".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            currency: None,
            notes: None,
            items,
        }
    }

    #[test]
    fn totals_apply_igv_on_rounded_subtotal() {
        let product = Uuid::new_v4();
        let (lines, totals) = compute_totals(
            &[item(product, 3.0, 10.1), item(product, 2.0, 4.5)],
            0.18,
        );
        assert_eq!(lines, vec![30.3, 9.0]);
        assert_eq!(totals.subtotal, 39.3);
        assert_eq!(totals.tax, 7.07);
        assert_eq!(totals.total, 46.37);
    }

    #[tokio::test]
    async fn order_from_approved_requirement_marks_it_attended() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-20").await;
        let product = seed_product(&db.pool, "CEM-T1", 28.5).await;
        let requirements = RequirementService::new(db.pool.clone());
        let requirement = requirements
            .create(&CreateRequirement {
                obra_id: obra.id,
                requested_by: "Maestro de obra".to_string(),
                required_date: None,
                notes: None,
                items: vec![CreateRequirementItem {
                    product_id: product.id,
                    quantity: 100.0,
                    notes: None,
                }],
            })
            .await
            .unwrap();
        let requirement_id = requirement.requirement.id;
        let service = PurchaseOrderService::new(db.pool.clone(), 0.18);

        let pending = service
            .create(&payload(obra.id, Some(requirement_id), vec![item(product.id, 100.0, 28.5)]))
            .await;
        let Err(PurchaseOrderError::Validation(errors)) = pending else {
            panic!("pending requirement must be rejected");
        };
        assert!(errors.fields().contains_key("requirement_id"));

        requirements.approve(requirement_id).await.unwrap();
        let order = service
            .create(&payload(obra.id, Some(requirement_id), vec![item(product.id, 100.0, 28.5)]))
            .await
            .unwrap();
        assert_eq!(order.purchase_order.number, "OC-000001");
        assert_eq!(order.purchase_order.subtotal, 2850.0);
        assert_eq!(order.purchase_order.tax, 513.0);
        assert_eq!(order.purchase_order.total, 3363.0);

        let linked = Requirement::find_by_id(&db.pool, requirement_id).await.unwrap().unwrap();
        assert_eq!(linked.status, RequirementStatus::Attended);

        // the same order may be edited while keeping its attended requirement
        service
            .update(
                order.purchase_order.id,
                &payload(obra.id, Some(requirement_id), vec![item(product.id, 90.0, 28.5)]),
            )
            .await
            .unwrap();

        service.delete(order.purchase_order.id).await.unwrap();
        let released = Requirement::find_by_id(&db.pool, requirement_id).await.unwrap().unwrap();
        assert_eq!(released.status, RequirementStatus::Approved);
    }

    #[tokio::test]
    async fn status_machine_is_enforced() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-21").await;
        let product = seed_product(&db.pool, "ARE-G", 55.0).await;
        let service = PurchaseOrderService::new(db.pool.clone(), 0.18);
        let order = service
            .create(&payload(obra.id, None, vec![item(product.id, 4.0, 55.0)]))
            .await
            .unwrap();
        let id = order.purchase_order.id;

        assert!(matches!(
            service.change_status(id, PurchaseOrderStatus::Received).await,
            Err(PurchaseOrderError::InvalidTransition { .. })
        ));
        service.change_status(id, PurchaseOrderStatus::Issued).await.unwrap();

        assert!(matches!(
            service
                .update(id, &payload(obra.id, None, vec![item(product.id, 1.0, 55.0)]))
                .await,
            Err(PurchaseOrderError::NotDraft)
        ));
        assert!(matches!(service.delete(id).await, Err(PurchaseOrderError::NotDeletable)));

        service.change_status(id, PurchaseOrderStatus::Cancelled).await.unwrap();
        service.delete(id).await.unwrap();
    }

    async fn approved_requirement(pool: &SqlitePool, obra_id: Uuid, product_id: Uuid) -> Uuid {
        let requirements = RequirementService::new(pool.clone());
        let created = requirements
            .create(&CreateRequirement {
                obra_id,
                requested_by: "Almacenero".to_string(),
                required_date: None,
                notes: None,
                items: vec![CreateRequirementItem {
                    product_id,
                    quantity: 40.0,
                    notes: None,
                }],
            })
            .await
            .unwrap();
        requirements.approve(created.requirement.id).await.unwrap();
        created.requirement.id
    }

    #[tokio::test]
    async fn concurrent_orders_link_a_requirement_once() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-22").await;
        let product = seed_product(&db.pool, "LAD-KK", 1.2).await;
        let requirement_id = approved_requirement(&db.pool, obra.id, product.id).await;
        let service = PurchaseOrderService::new(db.pool.clone(), 0.18);
        let data = payload(obra.id, Some(requirement_id), vec![item(product.id, 40.0, 1.2)]);

        let (first, second) = tokio::join!(service.create(&data), service.create(&data));
        let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1);
        let rejected = if first.is_err() { first } else { second };
        let Err(PurchaseOrderError::Validation(errors)) = rejected else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains_key("requirement_id"));

        assert_eq!(
            Requirement::purchase_order_count(&db.pool, requirement_id).await.unwrap(),
            1
        );
        assert_eq!(PurchaseOrder::count(&db.pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn attending_requires_an_approved_requirement() {
        let db = db().await;
        let obra = seed_obra(&db.pool, "OB-23").await;
        let product = seed_product(&db.pool, "YES-20", 22.0).await;
        let requirement_id = approved_requirement(&db.pool, obra.id, product.id).await;

        let mut tx = ::db::begin_write(&db.pool).await.unwrap();
        attend(&mut tx, requirement_id).await.unwrap();
        // already attended: a stale check outside the transaction must not link it twice
        assert!(matches!(
            attend(&mut tx, requirement_id).await,
            Err(PurchaseOrderError::Validation(_))
        ));
        release(&mut tx, requirement_id).await.unwrap();
        tx.commit().await.unwrap();

        let released = Requirement::find_by_id(&db.pool, requirement_id).await.unwrap().unwrap();
        assert_eq!(released.status, RequirementStatus::Approved);
    }
}
