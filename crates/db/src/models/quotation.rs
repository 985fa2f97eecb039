use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

use super::purchase_order::Currency;

pub const NUMBER_PREFIX: &str = "COT";

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "quotation_variant", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuotationVariant {
    #[default]
    Standard,
    /// Mining client layout: contract and area are mandatory and the price
    /// carries overhead and utility on top of direct cost.
    Antamina,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "quotation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuotationStatus {
    pub fn can_transition_to(self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Approved) | (Sent, Rejected)
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Quotation {
    pub id: Uuid,
    pub number: String,
    pub client_name: String,
    pub obra_id: Option<Uuid>,
    pub variant: QuotationVariant,
    pub contract_number: Option<String>,
    pub area: Option<String>,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub currency: Currency,
    pub status: QuotationStatus,
    pub overhead_percent: f64,
    pub utility_percent: f64,
    pub direct_cost: f64,
    pub overhead: f64,
    pub utility: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct QuotationItem {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub position: i64,
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QuotationDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub quotation: Quotation,
    pub items: Vec<QuotationItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateQuotationItem {
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateQuotation {
    pub client_name: String,
    pub obra_id: Option<Uuid>,
    pub variant: Option<QuotationVariant>,
    pub contract_number: Option<String>,
    pub area: Option<String>,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub currency: Option<Currency>,
    pub overhead_percent: Option<f64>,
    pub utility_percent: Option<f64>,
    pub notes: Option<String>,
    pub items: Vec<CreateQuotationItem>,
}

pub type UpdateQuotation = CreateQuotation;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChangeQuotationStatus {
    pub status: QuotationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuotationTotals {
    pub overhead_percent: f64,
    pub utility_percent: f64,
    pub direct_cost: f64,
    pub overhead: f64,
    pub utility: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl CreateQuotation {
    pub fn variant(&self) -> QuotationVariant {
        self.variant.unwrap_or_default()
    }
}

impl Validate for CreateQuotationItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("description", &self.description)
            .max_len("description", &self.description, 500)
            .required("unit", &self.unit)
            .max_len("unit", &self.unit, 20)
            .positive("quantity", self.quantity)
            .non_negative("unit_price", self.unit_price)
            .finish()
    }
}

impl Validate for CreateQuotation {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("client_name", &self.client_name)
            .max_len("client_name", &self.client_name, 200)
            .max_len_opt("contract_number", self.contract_number.as_deref(), 50)
            .max_len_opt("area", self.area.as_deref(), 100)
            .max_len_opt("notes", self.notes.as_deref(), 2000)
            .date_order(Some(self.issue_date), "valid_until", self.valid_until)
            .not_empty("items", &self.items);
        if let Some(percent) = self.overhead_percent {
            v.between("overhead_percent", percent, 0.0, 100.0);
        }
        if let Some(percent) = self.utility_percent {
            v.between("utility_percent", percent, 0.0, 100.0);
        }
        if self.variant() == QuotationVariant::Antamina {
            v.required("contract_number", self.contract_number.as_deref().unwrap_or(""))
                .required("area", self.area.as_deref().unwrap_or(""));
        }
        for (index, item) in self.items.iter().enumerate() {
            v.nested("items", index, item.validate());
        }
        v.finish()
    }
}

const QUOTATION_COLUMNS: &str = "q.id, q.number, q.client_name, q.obra_id, q.variant, q.contract_number, q.area, q.issue_date, q.valid_until, q.currency, q.status, q.overhead_percent, q.utility_percent, q.direct_cost, q.overhead, q.utility, q.subtotal, q.tax, q.total, q.notes, q.created_at, q.updated_at";

const RETURNING_COLUMNS: &str = "id, number, client_name, obra_id, variant, contract_number, area, issue_date, valid_until, currency, status, overhead_percent, utility_percent, direct_cost, overhead, utility, subtotal, tax, total, notes, created_at, updated_at";

impl Quotation {
    pub async fn list(
        pool: &SqlitePool,
        page: &Page,
        variant: Option<QuotationVariant>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"SELECT {QUOTATION_COLUMNS}
               FROM quotations q
               WHERE ($4 IS NULL OR q.variant = $4)
                 AND (q.number LIKE $1 ESCAPE '\' OR q.client_name LIKE $1 ESCAPE '\'
                      OR COALESCE(q.contract_number, '') LIKE $1 ESCAPE '\')
               ORDER BY q.created_at DESC, q.rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, Quotation>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .bind(variant)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "quotations").await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!("SELECT {QUOTATION_COLUMNS} FROM quotations q WHERE q.id = $1");
        sqlx::query_as::<_, Quotation>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn items(pool: &SqlitePool, id: Uuid) -> Result<Vec<QuotationItem>, sqlx::Error> {
        sqlx::query_as::<_, QuotationItem>(
            r#"SELECT id, quotation_id, position, description, unit, quantity, unit_price, line_total
               FROM quotation_items
               WHERE quotation_id = $1
               ORDER BY position ASC"#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_detail(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<QuotationDetail>, sqlx::Error> {
        let Some(quotation) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let items = Self::items(pool, id).await?;
        Ok(Some(QuotationDetail { quotation, items }))
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &CreateQuotation,
        totals: QuotationTotals,
    ) -> Result<Self, sqlx::Error> {
        let seq = super::next_sequence(&mut *conn, "quotations").await?;
        let number = super::document_number(NUMBER_PREFIX, seq);
        let query = format!(
            r#"INSERT INTO quotations
                   (id, seq, number, client_name, obra_id, variant, contract_number, area, issue_date,
                    valid_until, currency, overhead_percent, utility_percent, direct_cost, overhead,
                    utility, subtotal, tax, total, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
               RETURNING {RETURNING_COLUMNS}"#
        );
        sqlx::query_as::<_, Quotation>(&query)
            .bind(id)
            .bind(seq)
            .bind(number)
            .bind(data.client_name.trim())
            .bind(data.obra_id)
            .bind(data.variant())
            .bind(&data.contract_number)
            .bind(&data.area)
            .bind(data.issue_date)
            .bind(data.valid_until)
            .bind(data.currency.unwrap_or_default())
            .bind(totals.overhead_percent)
            .bind(totals.utility_percent)
            .bind(totals.direct_cost)
            .bind(totals.overhead)
            .bind(totals.utility)
            .bind(totals.subtotal)
            .bind(totals.tax)
            .bind(totals.total)
            .bind(&data.notes)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn update_header(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &UpdateQuotation,
        totals: QuotationTotals,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"UPDATE quotations
               SET client_name = $2, obra_id = $3, variant = $4, contract_number = $5, area = $6,
                   issue_date = $7, valid_until = $8, currency = $9, overhead_percent = $10,
                   utility_percent = $11, direct_cost = $12, overhead = $13, utility = $14,
                   subtotal = $15, tax = $16, total = $17, notes = $18,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {RETURNING_COLUMNS}"#
        );
        sqlx::query_as::<_, Quotation>(&query)
            .bind(id)
            .bind(data.client_name.trim())
            .bind(data.obra_id)
            .bind(data.variant())
            .bind(&data.contract_number)
            .bind(&data.area)
            .bind(data.issue_date)
            .bind(data.valid_until)
            .bind(data.currency.unwrap_or_default())
            .bind(totals.overhead_percent)
            .bind(totals.utility_percent)
            .bind(totals.direct_cost)
            .bind(totals.overhead)
            .bind(totals.utility)
            .bind(totals.subtotal)
            .bind(totals.tax)
            .bind(totals.total)
            .bind(&data.notes)
            .fetch_one(&mut *conn)
            .await
    }

    /// Replace all lines, numbering them from 1. `line_totals` is parallel to `items`.
    pub async fn replace_items(
        conn: &mut SqliteConnection,
        id: Uuid,
        items: &[CreateQuotationItem],
        line_totals: &[f64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM quotation_items WHERE quotation_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for (position, (item, line_total)) in items.iter().zip(line_totals).enumerate() {
            sqlx::query(
                r#"INSERT INTO quotation_items
                       (id, quotation_id, position, description, unit, quantity, unit_price, line_total)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(position as i64 + 1)
            .bind(item.description.trim())
            .bind(item.unit.trim())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(*line_total)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: QuotationStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE quotations SET status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM quotations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
