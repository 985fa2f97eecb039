//! Client quotations. The Antamina layout prices overhead (gastos generales)
//! and utility on top of the direct cost before IGV.

use db::models::quotation::{
    CreateQuotation, CreateQuotationItem, Quotation, QuotationDetail, QuotationStatus,
    QuotationTotals, QuotationVariant, UpdateQuotation,
};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::{
    money::{round2, tax_on},
    validation::{Validate, ValidationErrors},
};
use uuid::Uuid;

use super::references;

pub const ANTAMINA_OVERHEAD_PERCENT: f64 = 10.0;
pub const ANTAMINA_UTILITY_PERCENT: f64 = 5.0;

#[derive(Debug, Error)]
pub enum QuotationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("quotation not found")]
    NotFound,
    #[error("Cannot change a quotation from {from} to {to}.")]
    InvalidTransition {
        from: QuotationStatus,
        to: QuotationStatus,
    },
    #[error("Only draft quotations can be edited.")]
    NotDraft,
}

pub fn compute_totals(data: &CreateQuotation, igv_rate: f64) -> (Vec<f64>, QuotationTotals) {
    let line_totals: Vec<f64> = data
        .items
        .iter()
        .map(|item: &CreateQuotationItem| round2(item.quantity * item.unit_price))
        .collect();
    let direct_cost = round2(line_totals.iter().sum());

    let (overhead_percent, utility_percent) = match data.variant() {
        QuotationVariant::Standard => (0.0, 0.0),
        QuotationVariant::Antamina => (
            data.overhead_percent.unwrap_or(ANTAMINA_OVERHEAD_PERCENT),
            data.utility_percent.unwrap_or(ANTAMINA_UTILITY_PERCENT),
        ),
    };
    let overhead = round2(direct_cost * overhead_percent / 100.0);
    let utility = round2(direct_cost * utility_percent / 100.0);
    let subtotal = round2(direct_cost + overhead + utility);
    let tax = tax_on(subtotal, igv_rate);

    let totals = QuotationTotals {
        overhead_percent,
        utility_percent,
        direct_cost,
        overhead,
        utility,
        subtotal,
        tax,
        total: round2(subtotal + tax),
    };
    (line_totals, totals)
}

#[derive(Clone)]
pub struct QuotationService {
    pool: SqlitePool,
    igv_rate: f64,
}

impl QuotationService {
    pub fn new(pool: SqlitePool, igv_rate: f64) -> Self {
        Self { pool, igv_rate }
    }

    async fn check(&self, data: &CreateQuotation) -> Result<(), QuotationError> {
        let mut errors = data.validate().err().unwrap_or_default();
        references::check_obra(&self.pool, "obra_id", data.obra_id, &mut errors).await?;
        Ok(errors.into_result()?)
    }

    async fn detail(&self, id: Uuid) -> Result<QuotationDetail, QuotationError> {
        Quotation::find_detail(&self.pool, id)
            .await?
            .ok_or(QuotationError::NotFound)
    }

    pub async fn create(&self, data: &CreateQuotation) -> Result<QuotationDetail, QuotationError> {
        self.check(data).await?;
        let (line_totals, totals) = compute_totals(data, self.igv_rate);

        let mut tx = db::begin_write(&self.pool).await?;
        let quotation = Quotation::insert(&mut tx, Uuid::new_v4(), data, totals).await?;
        Quotation::replace_items(&mut tx, quotation.id, &data.items, &line_totals).await?;
        tx.commit().await?;

        self.detail(quotation.id).await
    }

    pub async fn update(&self, id: Uuid, data: &UpdateQuotation) -> Result<QuotationDetail, QuotationError> {
        let current = Quotation::find_by_id(&self.pool, id)
            .await?
            .ok_or(QuotationError::NotFound)?;
        if current.status != QuotationStatus::Draft {
            return Err(QuotationError::NotDraft);
        }
        self.check(data).await?;
        let (line_totals, totals) = compute_totals(data, self.igv_rate);

        let mut tx = db::begin_write(&self.pool).await?;
        let current = Quotation::find_by_id(&mut *tx, id)
            .await?
            .ok_or(QuotationError::NotFound)?;
        if current.status != QuotationStatus::Draft {
            return Err(QuotationError::NotDraft);
        }
        Quotation::update_header(&mut tx, id, data, totals).await?;
        Quotation::replace_items(&mut tx, id, &data.items, &line_totals).await?;
        tx.commit().await?;

        self.detail(id).await
    }

    pub async fn change_status(
        &self,
        id: Uuid,
        next: QuotationStatus,
    ) -> Result<QuotationDetail, QuotationError> {
        let mut tx = db::begin_write(&self.pool).await?;
        let quotation = Quotation::find_by_id(&mut *tx, id)
            .await?
            .ok_or(QuotationError::NotFound)?;
        if !quotation.status.can_transition_to(next) {
            return Err(QuotationError::InvalidTransition {
                from: quotation.status,
                to: next,
            });
        }
        Quotation::update_status(&mut *tx, id, next).await?;
        tx.commit().await?;
        self.detail(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), QuotationError> {
        if Quotation::delete(&self.pool, id).await? == 0 {
            return Err(QuotationError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::test_support::db;

    fn payload(variant: QuotationVariant) -> CreateQuotation {
        CreateQuotation {
            client_name: "Compañía Minera Antamina S.A.".to_string(),
            obra_id: None,
            variant: Some(variant),
            contract_number: Some("CT-2025-044".to_string()),
            area: Some("Planta concentradora".to_string()),
            issue_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            valid_until: None,
            currency: None,
            overhead_percent: None,
            utility_percent: None,
            notes: None,
            items: vec![
                CreateQuotationItem {
                    description: "Encofrado de muros".to_string(),
                    unit: "m2".to_string(),
                    quantity: 40.0,
                    unit_price: 50.0,
                },
                CreateQuotationItem {
                    description: "Concreto f'c=210".to_string(),
                    unit: "m3".to_string(),
                    quantity: 5.0,
                    unit_price: 400.0,
                },
            ],
        }
    }

    #[test]
    fn antamina_adds_default_overhead_and_utility() {
        let (lines, totals) = compute_totals(&payload(QuotationVariant::Antamina), 0.18);
        assert_eq!(lines, vec![2000.0, 2000.0]);
        assert_eq!(totals.direct_cost, 4000.0);
        assert_eq!(totals.overhead, 400.0);
        assert_eq!(totals.utility, 200.0);
        assert_eq!(totals.subtotal, 4600.0);
        assert_eq!(totals.tax, 828.0);
        assert_eq!(totals.total, 5428.0);
    }

    #[test]
    fn standard_ignores_percentages() {
        let mut data = payload(QuotationVariant::Standard);
        data.overhead_percent = Some(12.0);
        let (_, totals) = compute_totals(&data, 0.18);
        assert_eq!(totals.overhead, 0.0);
        assert_eq!(totals.overhead_percent, 0.0);
        assert_eq!(totals.subtotal, 4000.0);
        assert_eq!(totals.total, 4720.0);
    }

    #[test]
    fn explicit_percentages_override_defaults() {
        let mut data = payload(QuotationVariant::Antamina);
        data.overhead_percent = Some(8.0);
        data.utility_percent = Some(0.0);
        let (_, totals) = compute_totals(&data, 0.18);
        assert_eq!(totals.overhead, 320.0);
        assert_eq!(totals.utility, 0.0);
        assert_eq!(totals.subtotal, 4320.0);
    }

    #[tokio::test]
    async fn lifecycle_locks_edits_after_sending() {
        let db = db().await;
        let service = QuotationService::new(db.pool.clone(), 0.18);
        let created = service.create(&payload(QuotationVariant::Antamina)).await.unwrap();
        let id = created.quotation.id;
        assert_eq!(created.quotation.number, "COT-000001");
        assert_eq!(created.items.len(), 2);
        assert_eq!(created.quotation.total, 5428.0);

        assert!(matches!(
            service.change_status(id, QuotationStatus::Approved).await,
            Err(QuotationError::InvalidTransition { .. })
        ));
        service.change_status(id, QuotationStatus::Sent).await.unwrap();
        assert!(matches!(
            service.update(id, &payload(QuotationVariant::Antamina)).await,
            Err(QuotationError::NotDraft)
        ));
        let approved = service.change_status(id, QuotationStatus::Approved).await.unwrap();
        assert_eq!(approved.quotation.status, QuotationStatus::Approved);

        service.delete(id).await.unwrap();
        assert!(matches!(service.delete(id).await, Err(QuotationError::NotFound)));
    }
}
