//! Postgres-backed store implementation.
//!
//! The ledger commit runs in a transaction that takes a `FOR UPDATE` row lock
//! on the product, making the duplicate check, the movement insert and the
//! projection update one atomic unit serialized per product. A partial unique
//! index on `(order_id, product_id, reason)` backs the duplicate check at the
//! schema level, so even a commit path bug cannot double-record an order.
//!
//! ## Error Mapping
//!
//! | PostgreSQL error code | Mapped to | Scenario |
//! |-----------------------|-----------|----------|
//! | `23505` on movement insert | `CommitOutcome::AlreadyRecorded` | duplicate order-scoped movement raced in |
//! | `23505` elsewhere | `DomainError::Conflict` | duplicate key (e.g. re-inserted product) |
//! | `23503` / `23514` | `DomainError::Validation` | referential/check constraint violation |
//! | anything else | `StoreError::Backend` | connection loss, corrupt rows, ... |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, MovementId, OrderId, ProductId};
use stockroom_ledger::{fold, MovementDraft, MovementReason, StockMovement};
use stockroom_orders::{FulfillmentType, Order, OrderItem, OrderStatus};

use super::{CatalogStore, CommitOutcome, LedgerStore, OrderStore, StockAudit, StockRebuild};
use crate::error::{StoreError, StoreResult};

const PRODUCT_COLUMNS: &str = "id, name, sku, stock, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, status, fulfillment_type, created_at, updated_at";
const MOVEMENT_COLUMNS: &str = "id, product_id, delta, reason, note, order_id, created_at";

/// Postgres-backed back office store.
///
/// Uses the SQLx connection pool, so the store is cheap to clone and safe to
/// share across handlers.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the schema if it does not exist yet.
    ///
    /// `stock_movements` gets no UPDATE/DELETE path anywhere in this crate;
    /// immutability is by construction, the indexes only serve reads and the
    /// duplicate guard.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                sku TEXT,
                stock BIGINT NOT NULL DEFAULT 0 CHECK (stock >= 0),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                status TEXT NOT NULL,
                fulfillment_type TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS order_items (
                order_id UUID NOT NULL REFERENCES orders(id),
                line_no INTEGER NOT NULL CHECK (line_no >= 0),
                product_id UUID,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                PRIMARY KEY (order_id, line_no)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS stock_movements (
                id UUID PRIMARY KEY,
                product_id UUID NOT NULL REFERENCES products(id),
                delta BIGINT NOT NULL CHECK (delta <> 0),
                reason TEXT NOT NULL,
                note TEXT,
                order_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS stock_movements_order_once
                ON stock_movements (order_id, product_id, reason)
                WHERE order_id IS NOT NULL
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS stock_movements_product_time
                ON stock_movements (product_id, created_at, id)
            "#,
        ];

        for ddl in statements {
            sqlx::query(ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Lock and load a product row inside a transaction.
    async fn product_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        operation: &str,
    ) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;

        match row {
            Some(row) => Ok(Some(product_from_row(&row, operation)?)),
            None => Ok(None),
        }
    }

    /// Re-read the settled winner after losing a duplicate-insert race.
    async fn settled_duplicate(
        &self,
        key: (OrderId, ProductId, MovementReason),
    ) -> StoreResult<CommitOutcome> {
        let (order_id, product_id, reason) = key;
        let movement = self
            .movement_by_key(order_id, product_id, reason)
            .await?
            .ok_or_else(|| {
                StoreError::backend(
                    "commit_movement",
                    "duplicate insert raced but winning row is not visible",
                )
            })?;
        let product = self
            .product(product_id)
            .await?
            .ok_or(StoreError::Domain(DomainError::ProductNotFound))?;
        Ok(CommitOutcome::AlreadyRecorded { movement, product })
    }

    async fn movement_by_key(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        reason: MovementReason,
    ) -> StoreResult<Option<StockMovement>> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE order_id = $1 AND product_id = $2 AND reason = $3"
        ))
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(reason.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_by_key", e))?;

        match row {
            Some(row) => Ok(Some(movement_from_row(&row, "movement_by_key")?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        match row {
            Some(row) => Ok(Some(product_from_row(&row, "product")?)),
            None => Ok(None),
        }
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("products", e))?;

        rows.iter()
            .map(|row| product_from_row(row, "products"))
            .collect()
    }

    async fn find_active_by_key(&self, key: &str) -> StoreResult<Vec<Product>> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active AND (LOWER(name) = LOWER($1) OR LOWER(sku) = LOWER($1)) \
             ORDER BY id"
        ))
        .bind(key)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_active_by_key", e))?;

        rows.iter()
            .map(|row| product_from_row(row, "find_active_by_key"))
            .collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET is_active = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_product_active", e))?;

        match row {
            Some(row) => product_from_row(&row, "set_product_active"),
            None => Err(StoreError::Domain(DomainError::ProductNotFound)),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self, order, items), fields(order_id = %order.id, item_count = items.len()), err)]
    async fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, status, fulfillment_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.fulfillment_type.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, name, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_id.as_uuid())
            .bind(item.line_no as i32)
            .bind(item.product_id.map(Uuid::from))
            .bind(&item.name)
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("order", e))?;

        match row {
            Some(row) => Ok(Some(order_from_row(&row, "order")?)),
            None => Ok(None),
        }
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT order_id, line_no, product_id, name, quantity \
             FROM order_items WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_items", e))?;

        rows.iter()
            .map(|row| order_item_from_row(row, "order_items"))
            .collect()
    }

    #[instrument(skip(self), fields(order_id = %id, expected = %expected, next = %next), err)]
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_order_status", e))?;

        if let Some(row) = row {
            return order_from_row(&row, "update_order_status");
        }

        // No row matched: either the order is gone or the status moved.
        match self.order(id).await? {
            Some(current) => Err(StoreError::Domain(DomainError::conflict(format!(
                "order status is {}, expected {}",
                current.status, expected
            )))),
            None => Err(StoreError::Domain(DomainError::NotFound)),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    #[instrument(
        skip(self, draft),
        fields(
            product_id = %draft.product_id,
            reason = %draft.reason,
            delta = draft.delta
        ),
        err
    )]
    async fn commit_movement(&self, draft: MovementDraft) -> StoreResult<CommitOutcome> {
        draft.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("commit_movement", e))?;

        // Row lock: serializes every commit for this product.
        let Some(product) = self
            .product_for_update(&mut tx, draft.product_id, "commit_movement")
            .await?
        else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("commit_movement", e))?;
            return Err(StoreError::Domain(DomainError::ProductNotFound));
        };

        if let Some((order_id, product_id, reason)) = draft.dedup_key() {
            let existing = sqlx::query(&format!(
                "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
                 WHERE order_id = $1 AND product_id = $2 AND reason = $3"
            ))
            .bind(order_id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(reason.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("commit_movement", e))?;

            if let Some(row) = existing {
                let movement = movement_from_row(&row, "commit_movement")?;
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("commit_movement", e))?;
                return Ok(CommitOutcome::AlreadyRecorded { movement, product });
            }
        }

        let movement = draft.clone().into_movement();
        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, delta, reason, note, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.delta)
        .bind(movement.reason.as_str())
        .bind(&movement.note)
        .bind(movement.order_id.map(Uuid::from))
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            // The partial unique index caught a duplicate the row lock did
            // not cover (e.g. a writer that bypassed this code path).
            if is_unique_violation(&e) {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("commit_movement", e))?;
                let key = draft
                    .dedup_key()
                    .ok_or_else(|| map_sqlx_error("commit_movement", e))?;
                return self.settled_duplicate(key).await;
            }
            return Err(map_sqlx_error("commit_movement", e));
        }

        // Same fold as fold::apply_delta, expressed in SQL.
        let row = sqlx::query(&format!(
            "UPDATE products SET stock = GREATEST(0, stock + $2), updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(movement.product_id.as_uuid())
        .bind(movement.delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement", e))?;
        let product = product_from_row(&row, "commit_movement")?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_movement", e))?;

        Ok(CommitOutcome::Committed { movement, product })
    }

    async fn movements_by_product(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(product_id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_by_product", e))?;

        rows.iter()
            .map(|row| movement_from_row(row, "movements_by_product"))
            .collect()
    }

    async fn movements_by_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE order_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_by_order", e))?;

        rows.iter()
            .map(|row| movement_from_row(row, "movements_by_order"))
            .collect()
    }

    async fn recent_movements(&self, limit: usize) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_movements", e))?;

        rows.iter()
            .map(|row| movement_from_row(row, "recent_movements"))
            .collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn rebuild_stock(&self, product_id: ProductId) -> StoreResult<StockRebuild> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("rebuild_stock", e))?;

        let Some(product) = self
            .product_for_update(&mut tx, product_id, "rebuild_stock")
            .await?
        else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rebuild_stock", e))?;
            return Err(StoreError::Domain(DomainError::ProductNotFound));
        };

        let rows = sqlx::query(
            "SELECT delta FROM stock_movements \
             WHERE product_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rebuild_stock", e))?;

        let mut deltas = Vec::with_capacity(rows.len());
        for row in rows {
            let delta: i64 = row
                .try_get("delta")
                .map_err(|e| StoreError::backend("rebuild_stock", e.to_string()))?;
            deltas.push(delta);
        }

        let previous = product.stock;
        let replayed = fold::replay(deltas);

        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(replayed)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rebuild_stock", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("rebuild_stock", e))?;

        Ok(StockRebuild {
            product_id,
            previous,
            replayed,
        })
    }

    async fn stock_audit(&self) -> StoreResult<Vec<StockAudit>> {
        let products = sqlx::query("SELECT id, stock FROM products ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_audit", e))?;

        let movements = sqlx::query(
            "SELECT product_id, delta FROM stock_movements \
             ORDER BY product_id, created_at, id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_audit", e))?;

        let mut deltas: std::collections::HashMap<Uuid, Vec<i64>> =
            std::collections::HashMap::new();
        for row in movements {
            let product_id: Uuid = row
                .try_get("product_id")
                .map_err(|e| StoreError::backend("stock_audit", e.to_string()))?;
            let delta: i64 = row
                .try_get("delta")
                .map_err(|e| StoreError::backend("stock_audit", e.to_string()))?;
            deltas.entry(product_id).or_default().push(delta);
        }

        let mut audits = Vec::with_capacity(products.len());
        for row in products {
            let id: Uuid = row
                .try_get("id")
                .map_err(|e| StoreError::backend("stock_audit", e.to_string()))?;
            let projected: i64 = row
                .try_get("stock")
                .map_err(|e| StoreError::backend("stock_audit", e.to_string()))?;
            let product_deltas = deltas.remove(&id).unwrap_or_default();
            let ledger_sum: i64 = product_deltas.iter().sum();
            let replayed = fold::replay(product_deltas);
            audits.push(StockAudit {
                product_id: ProductId::from_uuid(id),
                projected,
                ledger_sum,
                replayed,
                diverged: projected != ledger_sum,
            });
        }
        Ok(audits)
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    // Unique violation.
                    "23505" => StoreError::Domain(DomainError::conflict(msg)),
                    // Foreign key / check constraint violations.
                    "23503" | "23514" => StoreError::Domain(DomainError::validation(msg)),
                    _ => StoreError::backend(operation, msg),
                }
            } else {
                StoreError::backend(operation, msg)
            }
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        sqlx::Error::RowNotFound => StoreError::backend(operation, "unexpected row not found"),
        other => StoreError::backend(operation, other.to_string()),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    name: String,
    sku: Option<String>,
    stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            stock: row.try_get("stock")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            sku: row.sku,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn product_from_row(row: &sqlx::postgres::PgRow, operation: &str) -> StoreResult<Product> {
    let row = ProductRow::from_row(row)
        .map_err(|e| StoreError::backend(operation, format!("bad product row: {e}")))?;
    Ok(row.into())
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    status: String,
    fulfillment_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for OrderRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            status: row.try_get("status")?,
            fulfillment_type: row.try_get("fulfillment_type")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn order_from_row(row: &sqlx::postgres::PgRow, operation: &str) -> StoreResult<Order> {
    let row = OrderRow::from_row(row)
        .map_err(|e| StoreError::backend(operation, format!("bad order row: {e}")))?;
    let status: OrderStatus = row
        .status
        .parse()
        .map_err(|e: DomainError| StoreError::backend(operation, e.to_string()))?;
    let fulfillment_type: FulfillmentType = row
        .fulfillment_type
        .parse()
        .map_err(|e: DomainError| StoreError::backend(operation, e.to_string()))?;
    Ok(Order {
        id: OrderId::from_uuid(row.id),
        status,
        fulfillment_type,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn order_item_from_row(row: &sqlx::postgres::PgRow, operation: &str) -> StoreResult<OrderItem> {
    let order_id: Uuid = row
        .try_get("order_id")
        .map_err(|e| StoreError::backend(operation, e.to_string()))?;
    let line_no: i32 = row
        .try_get("line_no")
        .map_err(|e| StoreError::backend(operation, e.to_string()))?;
    let product_id: Option<Uuid> = row
        .try_get("product_id")
        .map_err(|e| StoreError::backend(operation, e.to_string()))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| StoreError::backend(operation, e.to_string()))?;
    let quantity: i32 = row
        .try_get("quantity")
        .map_err(|e| StoreError::backend(operation, e.to_string()))?;

    Ok(OrderItem {
        order_id: OrderId::from_uuid(order_id),
        line_no: line_no as u32,
        product_id: product_id.map(ProductId::from_uuid),
        name,
        quantity: quantity as u32,
    })
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    delta: i64,
    reason: String,
    note: Option<String>,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            delta: row.try_get("delta")?,
            reason: row.try_get("reason")?,
            note: row.try_get("note")?,
            order_id: row.try_get("order_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn movement_from_row(row: &sqlx::postgres::PgRow, operation: &str) -> StoreResult<StockMovement> {
    let row = MovementRow::from_row(row)
        .map_err(|e| StoreError::backend(operation, format!("bad movement row: {e}")))?;
    let reason: MovementReason = row
        .reason
        .parse()
        .map_err(|e: DomainError| StoreError::backend(operation, e.to_string()))?;
    Ok(StockMovement {
        id: MovementId::from_uuid(row.id),
        product_id: ProductId::from_uuid(row.product_id),
        delta: row.delta,
        reason,
        note: row.note,
        order_id: row.order_id.map(OrderId::from_uuid),
        created_at: row.created_at,
    })
}
