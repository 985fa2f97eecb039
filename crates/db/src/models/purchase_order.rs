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

pub const NUMBER_PREFIX: &str = "OC";

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "currency")]
#[allow(clippy::upper_case_acronyms)]
pub enum Currency {
    #[default]
    PEN,
    USD,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "purchase_order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PurchaseOrderStatus {
    #[default]
    Draft,
    Issued,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Allowed forward moves; everything else is a conflict.
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Issued) | (Draft, Cancelled) | (Issued, Received) | (Issued, Cancelled)
        )
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft | PurchaseOrderStatus::Cancelled)
    }
}

/// Purchase order (orden de compra) issued to a supplier for an obra
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub number: String,
    pub obra_id: Uuid,
    pub requirement_id: Option<Uuid>,
    pub supplier_name: String,
    pub supplier_ruc: String,
    pub issue_date: NaiveDate,
    pub currency: Currency,
    pub status: PurchaseOrderStatus,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PurchaseOrderSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub purchase_order: PurchaseOrder,
    pub obra_code: String,
    pub obra_name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub purchase_order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePurchaseOrderItem {
    pub product_id: Uuid,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePurchaseOrder {
    pub obra_id: Uuid,
    pub requirement_id: Option<Uuid>,
    pub supplier_name: String,
    pub supplier_ruc: String,
    pub issue_date: NaiveDate,
    pub currency: Option<Currency>,
    pub notes: Option<String>,
    pub items: Vec<CreatePurchaseOrderItem>,
}

pub type UpdatePurchaseOrder = CreatePurchaseOrder;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChangePurchaseOrderStatus {
    pub status: PurchaseOrderStatus,
}

/// Money columns computed from the lines before writing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PurchaseOrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Validate for CreatePurchaseOrderItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .positive("quantity", self.quantity)
            .non_negative("unit_price", self.unit_price)
            .max_len_opt("description", self.description.as_deref(), 255)
            .finish()
    }
}

impl Validate for CreatePurchaseOrder {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("supplier_name", &self.supplier_name)
            .max_len("supplier_name", &self.supplier_name, 200)
            .digits("supplier_ruc", self.supplier_ruc.trim(), 11)
            .max_len_opt("notes", self.notes.as_deref(), 1000)
            .not_empty("items", &self.items);
        for (index, item) in self.items.iter().enumerate() {
            v.nested("items", index, item.validate());
        }
        v.finish()
    }
}

const PO_COLUMNS: &str = "po.id, po.number, po.obra_id, po.requirement_id, po.supplier_name, po.supplier_ruc, po.issue_date, po.currency, po.status, po.subtotal, po.tax, po.total, po.notes, po.created_at, po.updated_at";

impl PurchaseOrder {
    pub async fn list(
        pool: &SqlitePool,
        page: &Page,
        obra_id: Option<Uuid>,
    ) -> Result<Vec<PurchaseOrderSummary>, sqlx::Error> {
        let query = format!(
            r#"SELECT {PO_COLUMNS}, o.code AS obra_code, o.name AS obra_name
               FROM purchase_orders po
               JOIN obras o ON o.id = po.obra_id
               WHERE ($4 IS NULL OR po.obra_id = $4)
                 AND (po.number LIKE $1 ESCAPE '\' OR po.supplier_name LIKE $1 ESCAPE '\'
                      OR po.supplier_ruc LIKE $1 ESCAPE '\')
               ORDER BY po.created_at DESC, po.rowid DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, PurchaseOrderSummary>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .bind(obra_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "purchase_orders").await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!("SELECT {PO_COLUMNS} FROM purchase_orders po WHERE po.id = $1");
        sqlx::query_as::<_, PurchaseOrder>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn items(pool: &SqlitePool, id: Uuid) -> Result<Vec<PurchaseOrderItem>, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrderItem>(
            r#"SELECT i.id, i.purchase_order_id, i.product_id, p.code AS product_code,
                      p.name AS product_name, p.unit, i.description, i.quantity, i.unit_price, i.line_total
               FROM purchase_order_items i
               JOIN products p ON p.id = i.product_id
               WHERE i.purchase_order_id = $1
               ORDER BY i.rowid ASC"#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_detail(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<PurchaseOrderDetail>, sqlx::Error> {
        let Some(purchase_order) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let items = Self::items(pool, id).await?;
        Ok(Some(PurchaseOrderDetail {
            purchase_order,
            items,
        }))
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &CreatePurchaseOrder,
        totals: PurchaseOrderTotals,
    ) -> Result<Self, sqlx::Error> {
        let seq = super::next_sequence(&mut *conn, "purchase_orders").await?;
        let number = super::document_number(NUMBER_PREFIX, seq);
        sqlx::query_as::<_, PurchaseOrder>(
            r#"INSERT INTO purchase_orders
                   (id, seq, number, obra_id, requirement_id, supplier_name, supplier_ruc, issue_date,
                    currency, subtotal, tax, total, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING id, number, obra_id, requirement_id, supplier_name, supplier_ruc, issue_date,
                         currency, status, subtotal, tax, total, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(seq)
        .bind(number)
        .bind(data.obra_id)
        .bind(data.requirement_id)
        .bind(data.supplier_name.trim())
        .bind(data.supplier_ruc.trim())
        .bind(data.issue_date)
        .bind(data.currency.unwrap_or_default())
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
        data: &UpdatePurchaseOrder,
        totals: PurchaseOrderTotals,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            r#"UPDATE purchase_orders
               SET obra_id = $2, requirement_id = $3, supplier_name = $4, supplier_ruc = $5,
                   issue_date = $6, currency = $7, subtotal = $8, tax = $9, total = $10, notes = $11,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, number, obra_id, requirement_id, supplier_name, supplier_ruc, issue_date,
                         currency, status, subtotal, tax, total, notes, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.obra_id)
        .bind(data.requirement_id)
        .bind(data.supplier_name.trim())
        .bind(data.supplier_ruc.trim())
        .bind(data.issue_date)
        .bind(data.currency.unwrap_or_default())
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await
    }

    /// Replace all lines. `line_totals` is parallel to `items`.
    pub async fn replace_items(
        conn: &mut SqliteConnection,
        id: Uuid,
        items: &[CreatePurchaseOrderItem],
        line_totals: &[f64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for (item, line_total) in items.iter().zip(line_totals) {
            sqlx::query(
                r#"INSERT INTO purchase_order_items
                       (id, purchase_order_id, product_id, description, quantity, unit_price, line_total)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(item.product_id)
            .bind(&item.description)
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
        status: PurchaseOrderStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE purchase_orders SET status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
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
        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
