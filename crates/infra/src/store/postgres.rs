//! Postgres-backed procurement store.
//!
//! Prices and amounts are stored as `BIGINT` cents; statuses as their canonical
//! upper-case text. Every status-advancing write carries the expected prior status in
//! its `WHERE` clause, so a write that lost a race affects zero rows and reports `false`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | duplicate number, second PENDING RFQ for a pair, second PO for a quote |
//! | Database (foreign key violation) | `23503` | `NotFound` | row references a missing parent |
//! | Database (check constraint violation) | `23514` | `Invalid` | e.g. `required_qty <= 0` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` | connection trouble |
//! | ColumnDecode / Decode | N/A | `Corrupt` | unreadable row |
//!
//! ## Thread Safety
//!
//! `PostgresProcurementStore` is `Send + Sync`; all operations go through the SQLx pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use procura_core::{
    ApprovalId, DecisionId, IntentId, ItemId, Money, PurchaseOrderId, QuoteId, RfqId, RoundId,
    ShipmentId, StateMachine, StatusGuard, VendorId,
};
use procura_purchasing::{
    AnalystReport, Approval, ApprovalStatus, Confidence, DecisionRecord, InventoryItem,
    NewApproval, NewDecision, NewPurchaseOrder, NewQuote, NewRfq, NewShipment, OrderContext,
    PurchaseOrder, PurchaseOrderStatus, Quote, QuoteCandidate, QuoteContext, QuoteStatus, Rfq,
    RfqStatus, RoundSummary, Shipment, ShipmentStatus, SourcingVendor,
};

use super::r#trait::{ProcurementStore, StoreError, StoreResult};
use crate::saga::{IntentKind, IntentStatus, NewIntent, SagaIntent};

/// Schema bootstrap, applied in order by [`PostgresProcurementStore::run_migrations`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS inventory (
        item_id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        current_stock BIGINT NOT NULL,
        reorder_level BIGINT NOT NULL CHECK (reorder_level > 0),
        unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendors (
        vendor_id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        is_approved BOOLEAN NOT NULL DEFAULT FALSE,
        lead_time_days INTEGER NOT NULL DEFAULT 0,
        payment_terms TEXT NOT NULL DEFAULT 'Net 30'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_vendors (
        item_id BIGINT NOT NULL REFERENCES inventory(item_id),
        vendor_id BIGINT NOT NULL REFERENCES vendors(vendor_id),
        unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0),
        rating DOUBLE PRECISION NOT NULL CHECK (rating >= 0 AND rating <= 5),
        PRIMARY KEY (item_id, vendor_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analyst_reports (
        report_id BIGSERIAL PRIMARY KEY,
        trend_percent DOUBLE PRECISION NOT NULL,
        scrap_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
        summary TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rfqs (
        rfq_id BIGSERIAL PRIMARY KEY,
        round_id UUID NOT NULL,
        item_id BIGINT NOT NULL REFERENCES inventory(item_id),
        vendor_id BIGINT NOT NULL REFERENCES vendors(vendor_id),
        rfq_number TEXT NOT NULL UNIQUE,
        required_qty BIGINT NOT NULL CHECK (required_qty > 0),
        status TEXT NOT NULL DEFAULT 'PENDING',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (round_id, item_id, vendor_id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS rfqs_one_pending_per_pair
        ON rfqs (item_id, vendor_id) WHERE status = 'PENDING'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_quotes (
        quote_id BIGSERIAL PRIMARY KEY,
        rfq_id BIGINT NOT NULL REFERENCES rfqs(rfq_id),
        vendor_id BIGINT NOT NULL REFERENCES vendors(vendor_id),
        price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
        delivery_days INTEGER NOT NULL CHECK (delivery_days >= 0),
        validity_days INTEGER NOT NULL CHECK (validity_days >= 0),
        status TEXT NOT NULL DEFAULT 'RECEIVED',
        received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS purchase_approvals (
        approval_id BIGSERIAL PRIMARY KEY,
        quote_id BIGINT NOT NULL REFERENCES vendor_quotes(quote_id),
        approver TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        requested_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        decided_at TIMESTAMPTZ,
        decided_by TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS purchase_approvals_one_per_quote
        ON purchase_approvals (quote_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS purchase_orders (
        po_id BIGSERIAL PRIMARY KEY,
        quote_id BIGINT NOT NULL UNIQUE REFERENCES vendor_quotes(quote_id),
        po_number TEXT NOT NULL UNIQUE,
        amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
        expected_delivery TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'ISSUED',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shipment_schedule (
        shipment_id BIGSERIAL PRIMARY KEY,
        po_number TEXT NOT NULL UNIQUE REFERENCES purchase_orders(po_number),
        expected_arrival TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'IN_TRANSIT',
        quantity BIGINT NOT NULL,
        carrier TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_decision_log (
        decision_id BIGSERIAL PRIMARY KEY,
        agent_name TEXT NOT NULL,
        summary TEXT NOT NULL,
        confidence DOUBLE PRECISION NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
        human_approved BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS saga_intents (
        intent_id UUID PRIMARY KEY,
        kind TEXT NOT NULL,
        key TEXT NOT NULL,
        legs JSONB NOT NULL DEFAULT '[]',
        payload JSONB NOT NULL DEFAULT 'null',
        status TEXT NOT NULL,
        note TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS saga_intents_one_attempting
        ON saga_intents (kind, key) WHERE status = 'ATTEMPTING'
    "#,
];

/// Postgres-backed procurement store.
#[derive(Debug, Clone)]
pub struct PostgresProcurementStore {
    pool: Arc<PgPool>,
}

impl PostgresProcurementStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create every table and index that does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn run_migrations(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("run_migrations", e))?;
        }
        info!(statements = SCHEMA.len(), "procurement schema ready");
        Ok(())
    }

    async fn select_quote_context(&self, quote: QuoteId) -> StoreResult<Option<QuoteContext>> {
        let row = sqlx::query(
            r#"
            SELECT q.quote_id, q.rfq_id, r.round_id, q.status, r.item_id, i.name AS item_name,
                   r.required_qty, q.vendor_id, v.name AS vendor_name, v.email AS vendor_email,
                   v.payment_terms, q.price_cents, q.delivery_days
            FROM vendor_quotes q
            JOIN rfqs r ON r.rfq_id = q.rfq_id
            JOIN inventory i ON i.item_id = r.item_id
            JOIN vendors v ON v.vendor_id = q.vendor_id
            WHERE q.quote_id = $1
            "#,
        )
        .bind(quote.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("quote_context", e))?;

        row.map(|row| {
            Ok(QuoteContext {
                quote_id: QuoteId::new(col(&row, "quote_id")?),
                rfq_id: RfqId::new(col(&row, "rfq_id")?),
                round: RoundId::from_uuid(col(&row, "round_id")?),
                status: status(&row, "status")?,
                item_id: ItemId::new(col(&row, "item_id")?),
                item_name: col(&row, "item_name")?,
                required_qty: col(&row, "required_qty")?,
                vendor_id: VendorId::new(col(&row, "vendor_id")?),
                vendor_name: col(&row, "vendor_name")?,
                vendor_email: col(&row, "vendor_email")?,
                payment_terms: col(&row, "payment_terms")?,
                price: money(&row, "price_cents")?,
                delivery_days: col(&row, "delivery_days")?,
            })
        })
        .transpose()
    }
}

// --- row decoding ------------------------------------------------------------------

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn money(row: &PgRow, name: &str) -> StoreResult<Money> {
    Money::from_cents(col(row, name)?).map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn status<S: StateMachine>(row: &PgRow, name: &str) -> StoreResult<S> {
    let raw: String = col(row, name)?;
    S::parse(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn rfq_from_row(row: &PgRow) -> StoreResult<Rfq> {
    Ok(Rfq {
        id: RfqId::new(col(row, "rfq_id")?),
        round: RoundId::from_uuid(col(row, "round_id")?),
        item_id: ItemId::new(col(row, "item_id")?),
        vendor_id: VendorId::new(col(row, "vendor_id")?),
        rfq_number: col(row, "rfq_number")?,
        required_qty: col(row, "required_qty")?,
        status: status(row, "status")?,
        created_at: col(row, "created_at")?,
    })
}

fn quote_from_row(row: &PgRow) -> StoreResult<Quote> {
    Ok(Quote {
        id: QuoteId::new(col(row, "quote_id")?),
        rfq_id: RfqId::new(col(row, "rfq_id")?),
        vendor_id: VendorId::new(col(row, "vendor_id")?),
        price: money(row, "price_cents")?,
        delivery_days: col(row, "delivery_days")?,
        validity_days: col(row, "validity_days")?,
        status: status(row, "status")?,
        received_at: col(row, "received_at")?,
    })
}

fn approval_from_row(row: &PgRow) -> StoreResult<Approval> {
    Ok(Approval {
        id: ApprovalId::new(col(row, "approval_id")?),
        quote_id: QuoteId::new(col(row, "quote_id")?),
        approver: col(row, "approver")?,
        status: status(row, "status")?,
        requested_at: col(row, "requested_at")?,
        decided_at: col(row, "decided_at")?,
        decided_by: col(row, "decided_by")?,
    })
}

fn order_from_row(row: &PgRow) -> StoreResult<PurchaseOrder> {
    Ok(PurchaseOrder {
        id: PurchaseOrderId::new(col(row, "po_id")?),
        quote_id: QuoteId::new(col(row, "quote_id")?),
        po_number: col(row, "po_number")?,
        amount: money(row, "amount_cents")?,
        expected_delivery: col(row, "expected_delivery")?,
        status: status::<PurchaseOrderStatus>(row, "status")?,
        created_at: col(row, "created_at")?,
    })
}

fn shipment_from_row(row: &PgRow) -> StoreResult<Shipment> {
    Ok(Shipment {
        id: ShipmentId::new(col(row, "shipment_id")?),
        po_number: col(row, "po_number")?,
        expected_arrival: col(row, "expected_arrival")?,
        status: status::<ShipmentStatus>(row, "status")?,
        quantity: col(row, "quantity")?,
        carrier: col(row, "carrier")?,
    })
}

fn decision_from_row(row: &PgRow) -> StoreResult<DecisionRecord> {
    Ok(DecisionRecord {
        id: DecisionId::new(col(row, "decision_id")?),
        agent_name: col(row, "agent_name")?,
        summary: col(row, "summary")?,
        confidence: Confidence::new(col(row, "confidence")?),
        human_approved: col(row, "human_approved")?,
        created_at: col(row, "created_at")?,
    })
}

fn intent_from_row(row: &PgRow) -> StoreResult<SagaIntent> {
    let kind: String = col(row, "kind")?;
    let legs: JsonValue = col(row, "legs")?;
    Ok(SagaIntent {
        id: IntentId::from_uuid(col(row, "intent_id")?),
        kind: kind.parse().map_err(|e: procura_core::DomainError| StoreError::Corrupt(e.to_string()))?,
        key: col(row, "key")?,
        legs: serde_json::from_value(legs)
            .map_err(|e| StoreError::Corrupt(format!("column legs: {e}")))?,
        payload: col(row, "payload")?,
        status: status(row, "status")?,
        note: col(row, "note")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

const RFQ_COLUMNS: &str =
    "rfq_id, round_id, item_id, vendor_id, rfq_number, required_qty, status, created_at";
const QUOTE_COLUMNS: &str =
    "quote_id, rfq_id, vendor_id, price_cents, delivery_days, validity_days, status, received_at";
const APPROVAL_COLUMNS: &str =
    "approval_id, quote_id, approver, status, requested_at, decided_at, decided_by";
const ORDER_COLUMNS: &str =
    "po_id, quote_id, po_number, amount_cents, expected_delivery, status, created_at";
const SHIPMENT_COLUMNS: &str =
    "shipment_id, po_number, expected_arrival, status, quantity, carrier";
const INTENT_COLUMNS: &str =
    "intent_id, kind, key, legs, payload, status, note, created_at, updated_at";

#[async_trait]
impl ProcurementStore for PostgresProcurementStore {
    #[instrument(skip(self), err)]
    async fn inventory_count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM inventory")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory_count", e))?;
        col(&row, "n")
    }

    #[instrument(skip(self), err)]
    async fn low_stock_items(&self) -> StoreResult<Vec<InventoryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, name, current_stock, reorder_level, unit_price_cents
            FROM inventory
            WHERE current_stock < reorder_level
            ORDER BY item_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn item(&self, id: ItemId) -> StoreResult<Option<InventoryItem>> {
        let row = sqlx::query(
            "SELECT item_id, name, current_stock, reorder_level, unit_price_cents FROM inventory WHERE item_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn approved_vendors(&self, item: ItemId) -> StoreResult<Vec<SourcingVendor>> {
        let rows = sqlx::query(
            r#"
            SELECT v.vendor_id, v.name, v.email, v.lead_time_days, iv.unit_price_cents, iv.rating
            FROM inventory_vendors iv
            JOIN vendors v ON v.vendor_id = iv.vendor_id
            WHERE iv.item_id = $1 AND v.is_approved
            ORDER BY iv.rating DESC, v.vendor_id ASC
            "#,
        )
        .bind(item.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("approved_vendors", e))?;

        rows.iter()
            .map(|row| {
                Ok(SourcingVendor {
                    vendor_id: VendorId::new(col(row, "vendor_id")?),
                    name: col(row, "name")?,
                    email: col(row, "email")?,
                    lead_time_days: col(row, "lead_time_days")?,
                    unit_price: money(row, "unit_price_cents")?,
                    rating: col(row, "rating")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn latest_analyst_report(&self) -> StoreResult<Option<AnalystReport>> {
        let row = sqlx::query(
            r#"
            SELECT trend_percent, scrap_rate, summary, created_at
            FROM analyst_reports
            ORDER BY created_at DESC, report_id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_analyst_report", e))?;

        row.map(|row| {
            Ok(AnalystReport {
                trend_percent: col(&row, "trend_percent")?,
                scrap_rate: col(&row, "scrap_rate")?,
                summary: col(&row, "summary")?,
                created_at: col(&row, "created_at")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, rfq), fields(item = %rfq.item_id, vendor = %rfq.vendor_id), err)]
    async fn insert_rfq(&self, rfq: NewRfq) -> StoreResult<Rfq> {
        rfq.validate()?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO rfqs (round_id, item_id, vendor_id, rfq_number, required_qty, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RFQ_COLUMNS}
            "#
        ))
        .bind(rfq.round.as_uuid())
        .bind(rfq.item_id.get())
        .bind(rfq.vendor_id.get())
        .bind(&rfq.rfq_number)
        .bind(rfq.required_qty)
        .bind(RfqStatus::Pending.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_rfq", e))?;
        rfq_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>> {
        let row = sqlx::query(&format!("SELECT {RFQ_COLUMNS} FROM rfqs WHERE rfq_id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rfq", e))?;
        row.as_ref().map(rfq_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn pending_rfq(&self, item: ItemId, vendor: VendorId) -> StoreResult<Option<Rfq>> {
        let row = sqlx::query(&format!(
            "SELECT {RFQ_COLUMNS} FROM rfqs WHERE item_id = $1 AND vendor_id = $2 AND status = $3"
        ))
        .bind(item.get())
        .bind(vendor.get())
        .bind(RfqStatus::Pending.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_rfq", e))?;
        row.as_ref().map(rfq_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn pending_rfqs_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Rfq>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RFQ_COLUMNS} FROM rfqs
            WHERE status = $1 AND created_at <= $2
            ORDER BY created_at ASC, rfq_id ASC
            "#
        ))
        .bind(RfqStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_rfqs_created_before", e))?;
        rows.iter().map(rfq_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn transition_rfq(&self, id: RfqId, guard: StatusGuard<RfqStatus>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE rfqs SET status = $1 WHERE rfq_id = $2 AND status = $3")
            .bind(guard.to().as_str())
            .bind(id.get())
            .bind(guard.from().as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transition_rfq", e))?;
        if result.rows_affected() == 0 && self.rfq(id).await?.is_none() {
            return Err(StoreError::NotFound(format!("rfq {id}")));
        }
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn latest_round(&self, item: ItemId) -> StoreResult<Option<RoundSummary>> {
        let newest = sqlx::query("SELECT round_id FROM rfqs WHERE item_id = $1 ORDER BY rfq_id DESC LIMIT 1")
            .bind(item.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("latest_round", e))?;
        let Some(newest) = newest else {
            return Ok(None);
        };
        let round_id: Uuid = col(&newest, "round_id")?;

        let rfqs = sqlx::query(&format!(
            "SELECT {RFQ_COLUMNS} FROM rfqs WHERE round_id = $1 ORDER BY rfq_id"
        ))
        .bind(round_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_round", e))?
        .iter()
        .map(rfq_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

        let quotes = sqlx::query(
            r#"
            SELECT q.quote_id, q.rfq_id, q.vendor_id, q.price_cents, q.delivery_days,
                   q.validity_days, q.status, q.received_at
            FROM vendor_quotes q
            JOIN rfqs r ON r.rfq_id = q.rfq_id
            WHERE r.round_id = $1
            ORDER BY q.quote_id
            "#,
        )
        .bind(round_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_round", e))?
        .iter()
        .map(quote_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

        let selected = quotes
            .iter()
            .find(|q| q.status == QuoteStatus::Selected)
            .map(|q| q.id);
        let (approval, purchase_order) = match selected {
            Some(quote) => (
                self.latest_approval(quote).await?,
                self.purchase_order_for_quote(quote).await?,
            ),
            None => (None, None),
        };
        let shipment = match &purchase_order {
            Some(po) => self.shipment_for_po(&po.po_number).await?,
            None => None,
        };

        Ok(Some(RoundSummary {
            round: RoundId::from_uuid(round_id),
            item_id: item,
            rfqs,
            quotes,
            approval,
            purchase_order,
            shipment,
        }))
    }

    #[instrument(skip(self, quote), fields(rfq = %quote.rfq_id), err)]
    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        quote.validate()?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO vendor_quotes (rfq_id, vendor_id, price_cents, delivery_days, validity_days, status)
            SELECT r.rfq_id, r.vendor_id, $2, $3, $4, $5 FROM rfqs r WHERE r.rfq_id = $1
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote.rfq_id.get())
        .bind(quote.price.cents())
        .bind(quote.delivery_days)
        .bind(quote.validity_days)
        .bind(QuoteStatus::Received.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_quote", e))?;
        match row {
            Some(row) => quote_from_row(&row),
            None => Err(StoreError::NotFound(format!("rfq {}", quote.rfq_id))),
        }
    }

    #[instrument(skip(self), err)]
    async fn received_quote(&self, rfq: RfqId) -> StoreResult<Option<Quote>> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM vendor_quotes WHERE rfq_id = $1 AND status = $2 ORDER BY quote_id LIMIT 1"
        ))
        .bind(rfq.get())
        .bind(QuoteStatus::Received.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("received_quote", e))?;
        row.as_ref().map(quote_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn quote_candidates(&self, round: RoundId) -> StoreResult<Vec<QuoteCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT q.quote_id, q.rfq_id, q.vendor_id, v.name AS vendor_name, q.price_cents,
                   q.delivery_days, q.validity_days, COALESCE(iv.rating, 0) AS rating
            FROM vendor_quotes q
            JOIN rfqs r ON r.rfq_id = q.rfq_id
            JOIN vendors v ON v.vendor_id = q.vendor_id
            LEFT JOIN inventory_vendors iv ON iv.item_id = r.item_id AND iv.vendor_id = q.vendor_id
            WHERE r.round_id = $1 AND r.status = $2 AND q.status = $3
            ORDER BY q.quote_id
            "#,
        )
        .bind(round.as_uuid())
        .bind(RfqStatus::Quoted.as_str())
        .bind(QuoteStatus::Received.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("quote_candidates", e))?;

        rows.iter()
            .map(|row| {
                Ok(QuoteCandidate {
                    quote_id: QuoteId::new(col(row, "quote_id")?),
                    rfq_id: RfqId::new(col(row, "rfq_id")?),
                    vendor_id: VendorId::new(col(row, "vendor_id")?),
                    vendor_name: col(row, "vendor_name")?,
                    price: money(row, "price_cents")?,
                    delivery_days: col(row, "delivery_days")?,
                    validity_days: col(row, "validity_days")?,
                    rating: col(row, "rating")?,
                })
            })
            .collect()
    }

    /// Runs in one transaction with the round's quote rows locked, so two concurrent
    /// awards cannot both succeed.
    #[instrument(skip(self), fields(round = %round, winner = %winner), err)]
    async fn award_quote(&self, round: RoundId, winner: QuoteId) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let rows = sqlx::query(
            r#"
            SELECT q.quote_id, q.status
            FROM vendor_quotes q
            JOIN rfqs r ON r.rfq_id = q.rfq_id
            WHERE r.round_id = $1
            FOR UPDATE OF q
            "#,
        )
        .bind(round.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("award_quote", e))?;

        let mut winner_status = None;
        let mut already_awarded = false;
        for row in &rows {
            let id = QuoteId::new(col(row, "quote_id")?);
            let current: QuoteStatus = status(row, "status")?;
            already_awarded |= current == QuoteStatus::Selected;
            if id == winner {
                winner_status = Some(current);
            }
        }
        let Some(winner_status) = winner_status else {
            rollback(tx).await?;
            return Err(StoreError::NotFound(format!("quote {winner} in round {round}")));
        };
        if already_awarded || winner_status != QuoteStatus::Received {
            rollback(tx).await?;
            return Ok(false);
        }

        let select = StatusGuard::new(QuoteStatus::Received, QuoteStatus::Selected)?;
        let reject = StatusGuard::new(QuoteStatus::Received, QuoteStatus::Rejected)?;
        sqlx::query("UPDATE vendor_quotes SET status = $1 WHERE quote_id = $2 AND status = $3")
            .bind(select.to().as_str())
            .bind(winner.get())
            .bind(select.from().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("award_quote", e))?;
        sqlx::query(
            r#"
            UPDATE vendor_quotes q SET status = $1
            FROM rfqs r
            WHERE r.rfq_id = q.rfq_id AND r.round_id = $2 AND q.quote_id <> $3 AND q.status = $4
            "#,
        )
        .bind(reject.to().as_str())
        .bind(round.as_uuid())
        .bind(winner.get())
        .bind(reject.from().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("award_quote", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(true)
    }

    async fn quote_context(&self, quote: QuoteId) -> StoreResult<Option<QuoteContext>> {
        self.select_quote_context(quote).await
    }

    #[instrument(skip(self, approval), fields(quote = %approval.quote_id), err)]
    async fn insert_approval(&self, approval: NewApproval) -> StoreResult<Approval> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO purchase_approvals (quote_id, approver, status)
            SELECT q.quote_id, $2, $3 FROM vendor_quotes q WHERE q.quote_id = $1 AND q.status = $4
            RETURNING {APPROVAL_COLUMNS}
            "#
        ))
        .bind(approval.quote_id.get())
        .bind(&approval.approver)
        .bind(ApprovalStatus::Pending.as_str())
        .bind(QuoteStatus::Selected.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_approval", e))?;
        match row {
            Some(row) => approval_from_row(&row),
            None => Err(StoreError::Invalid(format!(
                "quote {} is missing or not selected",
                approval.quote_id
            ))),
        }
    }

    #[instrument(skip(self), err)]
    async fn approval(&self, id: ApprovalId) -> StoreResult<Option<Approval>> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM purchase_approvals WHERE approval_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("approval", e))?;
        row.as_ref().map(approval_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn latest_approval(&self, quote: QuoteId) -> StoreResult<Option<Approval>> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM purchase_approvals WHERE quote_id = $1 ORDER BY approval_id DESC LIMIT 1"
        ))
        .bind(quote.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_approval", e))?;
        row.as_ref().map(approval_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn decide_approval(
        &self,
        id: ApprovalId,
        guard: StatusGuard<ApprovalStatus>,
        decided_by: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_approvals
            SET status = $1, decided_at = NOW(), decided_by = $2
            WHERE approval_id = $3 AND status = $4
            "#,
        )
        .bind(guard.to().as_str())
        .bind(decided_by)
        .bind(id.get())
        .bind(guard.from().as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("decide_approval", e))?;
        if result.rows_affected() == 0 && self.approval(id).await?.is_none() {
            return Err(StoreError::NotFound(format!("approval {id}")));
        }
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn pending_approvals(&self) -> StoreResult<Vec<Approval>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM purchase_approvals WHERE status = $1 ORDER BY approval_id"
        ))
        .bind(ApprovalStatus::Pending.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_approvals", e))?;
        rows.iter().map(approval_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn purchase_order_for_quote(&self, quote: QuoteId) -> StoreResult<Option<PurchaseOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE quote_id = $1"
        ))
        .bind(quote.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("purchase_order_for_quote", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(skip(self, order), fields(quote = %order.quote_id, po = %order.po_number), err)]
    async fn insert_purchase_order(&self, order: NewPurchaseOrder) -> StoreResult<PurchaseOrder> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO purchase_orders (quote_id, po_number, amount_cents, expected_delivery, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.quote_id.get())
        .bind(&order.po_number)
        .bind(order.amount.cents())
        .bind(order.expected_delivery)
        .bind(PurchaseOrderStatus::Issued.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase_order", e))?;
        order_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn order_context(&self, po_number: &str) -> StoreResult<Option<OrderContext>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE po_number = $1"
        ))
        .bind(po_number)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_context", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let order = order_from_row(&row)?;
        let Some(quote) = self.select_quote_context(order.quote_id).await? else {
            return Err(StoreError::Corrupt(format!("po {po_number} references a missing quote")));
        };
        Ok(Some(OrderContext {
            order,
            item_id: quote.item_id,
            item_name: quote.item_name,
            required_qty: quote.required_qty,
            vendor_id: quote.vendor_id,
            vendor_name: quote.vendor_name,
            delivery_days: quote.delivery_days,
            unit_price: quote.price,
        }))
    }

    #[instrument(skip(self), err)]
    async fn shipment_for_po(&self, po_number: &str) -> StoreResult<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipment_schedule WHERE po_number = $1"
        ))
        .bind(po_number)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("shipment_for_po", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    #[instrument(skip(self, shipment), fields(po = %shipment.po_number), err)]
    async fn insert_shipment(&self, shipment: NewShipment) -> StoreResult<Shipment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO shipment_schedule (po_number, expected_arrival, status, quantity, carrier)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(&shipment.po_number)
        .bind(shipment.expected_arrival)
        .bind(ShipmentStatus::InTransit.as_str())
        .bind(shipment.quantity)
        .bind(&shipment.carrier)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment", e))?;
        shipment_from_row(&row)
    }

    async fn shipment(&self, id: ShipmentId) -> StoreResult<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipment_schedule WHERE shipment_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("shipment", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn transition_shipment(
        &self,
        id: ShipmentId,
        guard: StatusGuard<ShipmentStatus>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE shipment_schedule SET status = $1 WHERE shipment_id = $2 AND status = $3",
        )
        .bind(guard.to().as_str())
        .bind(id.get())
        .bind(guard.from().as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transition_shipment", e))?;
        if result.rows_affected() == 0 && self.shipment(id).await?.is_none() {
            return Err(StoreError::NotFound(format!("shipment {id}")));
        }
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, decision), fields(agent = %decision.agent_name), err)]
    async fn append_decision(&self, decision: NewDecision) -> StoreResult<DecisionRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO ai_decision_log (agent_name, summary, confidence, human_approved)
            VALUES ($1, $2, $3, $4)
            RETURNING decision_id, agent_name, summary, confidence, human_approved, created_at
            "#,
        )
        .bind(&decision.agent_name)
        .bind(&decision.summary)
        .bind(decision.confidence.get())
        .bind(decision.human_approved)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_decision", e))?;
        decision_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn recent_decisions(&self, limit: usize) -> StoreResult<Vec<DecisionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT decision_id, agent_name, summary, confidence, human_approved, created_at
            FROM ai_decision_log
            ORDER BY decision_id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_decisions", e))?;
        rows.iter().map(decision_from_row).collect()
    }

    #[instrument(skip(self, intent), fields(kind = %intent.kind, key = %intent.key), err)]
    async fn begin_intent(&self, intent: NewIntent) -> StoreResult<Option<SagaIntent>> {
        let legs = serde_json::to_value(&intent.legs)
            .map_err(|e| StoreError::Invalid(format!("intent legs: {e}")))?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO saga_intents (intent_id, kind, key, legs, payload, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kind, key) WHERE status = 'ATTEMPTING' DO NOTHING
            RETURNING {INTENT_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(intent.kind.as_str())
        .bind(&intent.key)
        .bind(legs)
        .bind(&intent.payload)
        .bind(IntentStatus::Attempting.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("begin_intent", e))?;
        row.as_ref().map(intent_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn latest_intent(&self, kind: IntentKind, key: &str) -> StoreResult<Option<SagaIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM saga_intents WHERE kind = $1 AND key = $2 ORDER BY created_at DESC, intent_id DESC LIMIT 1"
        ))
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_intent", e))?;
        row.as_ref().map(intent_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn record_intent_leg(&self, id: IntentId, leg: &str) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_intents
            SET legs = CASE WHEN legs ? $2 THEN legs ELSE legs || to_jsonb($2::text) END,
                updated_at = NOW()
            WHERE intent_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(leg)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_intent_leg", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("intent {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, note), err)]
    async fn close_intent(
        &self,
        id: IntentId,
        guard: StatusGuard<IntentStatus>,
        note: Option<String>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE saga_intents SET status = $1, note = $2, updated_at = NOW()
            WHERE intent_id = $3 AND status = $4
            "#,
        )
        .bind(guard.to().as_str())
        .bind(note)
        .bind(id.as_uuid())
        .bind(guard.from().as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("close_intent", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn stale_intents(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SagaIntent>> {
        let rows = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM saga_intents WHERE status = $1 AND updated_at <= $2 ORDER BY created_at"
        ))
        .bind(IntentStatus::Attempting.as_str())
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stale_intents", e))?;
        rows.iter().map(intent_from_row).collect()
    }
}

fn item_from_row(row: &PgRow) -> StoreResult<InventoryItem> {
    Ok(InventoryItem {
        id: ItemId::new(col(row, "item_id")?),
        name: col(row, "name")?,
        current_stock: col(row, "current_stock")?,
        reorder_level: col(row, "reorder_level")?,
        unit_price: money(row, "unit_price_cents")?,
    })
}

async fn rollback(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

/// Map SQLx errors onto `StoreError`; see the module docs for the table.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                Some("23514") | Some("22003") => StoreError::Invalid(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
