//! Postgres-backed order store and inventory ledger.
//!
//! Schema lives in `migrations/0001_storefront.sql` and can be applied with
//! [`migrate`].
//!
//! ## Consistency
//!
//! - Status writes are a single `UPDATE ... WHERE id = $1 AND version = $n`,
//!   so two writers holding the same version cannot both win.
//! - A stock decrement is one `UPDATE` clamping with `GREATEST(stock - n, 0)`
//!   under a row lock, recorded in `stock_movements` in the same transaction.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Validation` |
//! | Anything else | - | `Backend` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{instrument, warn};

use async_trait::async_trait;
use storefront_core::{AggregateId, AggregateRoot, ExpectedVersion};
use storefront_inventory::{Product, ProductId, StockDecrement};
use storefront_orders::{LineItem, Order, OrderId, OrderParts, OrderQuery, StatusChange};

use super::r#trait::{DecrementOutcome, InventoryLedger, OrderStore, ProductCatalog, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_storefront.sql");

const ORDER_COLUMNS: &str = "id, user_ref, items, total_amount, payment_method, shipping_address, \
     status, stock_applied_at, created_at, updated_at, version";

/// Apply the storefront schema (idempotent).
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

/// Postgres-backed order store.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&sql)
            .bind(order.id_typed().0.as_uuid())
            .bind(order.user().as_str())
            .bind(Json(order.items()))
            .bind(to_i64(order.total_amount(), "total_amount")?)
            .bind(order.payment_method().as_str())
            .bind(order.shipping_address())
            .bind(order.status().as_str())
            .bind(order.stock_applied_at())
            .bind(order.created_at())
            .bind(order.updated_at())
            .bind(to_i64(order.version(), "version")?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?
            .ok_or(StoreError::NotFound)?;
        order_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let direction = if query.newest_first { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             ORDER BY created_at {direction}, id {direction} \
             LIMIT $1"
        );
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e))?;

        rows.iter().map(order_from_row).collect()
    }

    #[instrument(skip(self), fields(order_id = %id, status = %change.status), err)]
    async fn set_status(&self, id: OrderId, change: StatusChange) -> Result<Order, StoreError> {
        let expected = match change.expected_version {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(to_i64(v, "expected_version")?),
        };

        let sql = format!(
            "UPDATE orders SET \
                status = $2, \
                stock_applied_at = CASE WHEN $3 AND stock_applied_at IS NULL THEN $4 ELSE stock_applied_at END, \
                updated_at = $4, \
                version = version + 1 \
             WHERE id = $1 AND ($5::BIGINT IS NULL OR version = $5) \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(id.0.as_uuid())
            .bind(change.status.as_str())
            .bind(change.marks_stock_applied)
            .bind(change.at)
            .bind(expected)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_order_status", e))?;

        if let Some(row) = updated {
            return order_from_row(&row);
        }

        // Nothing matched: either the order is gone or another writer won.
        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_order_status", e))?;

        match current {
            None => Err(StoreError::NotFound),
            Some(actual) => Err(StoreError::Conflict(format!(
                "optimistic concurrency check failed (expected: {:?}, actual: {actual})",
                change.expected_version
            ))),
        }
    }
}

/// Postgres-backed inventory ledger + catalog.
#[derive(Debug, Clone)]
pub struct PostgresInventoryLedger {
    pool: Arc<PgPool>,
}

impl PostgresInventoryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl InventoryLedger for PostgresInventoryLedger {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, name, stock FROM products WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn decrement(&self, id: ProductId, quantity: u64) -> Result<DecrementOutcome, StoreError> {
        let requested = to_i64(quantity, "quantity")?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        let row = sqlx::query(
            r#"
            WITH old AS (
                SELECT id, stock FROM products WHERE id = $1 FOR UPDATE
            )
            UPDATE products AS p
            SET stock = GREATEST(p.stock - $2, 0)
            FROM old
            WHERE p.id = old.id
            RETURNING old.stock AS previous, p.stock AS current
            "#,
        )
        .bind(id.0.as_uuid())
        .bind(requested)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("decrement_stock", e))?;
            return Ok(DecrementOutcome::MissingProduct(id));
        };

        let previous: i64 = row.try_get("previous").map_err(row_error)?;
        let current: i64 = row.try_get("current").map_err(row_error)?;

        sqlx::query(
            "INSERT INTO stock_movements (product_id, requested, previous, current) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.0.as_uuid())
        .bind(requested)
        .bind(previous)
        .bind(current)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        Ok(DecrementOutcome::Applied(StockDecrement {
            product_id: id,
            requested: quantity,
            previous: to_u64(previous, "previous")?,
            current: to_u64(current, "current")?,
        }))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn movements(&self, id: ProductId) -> Result<Vec<StockDecrement>, StoreError> {
        let rows = sqlx::query(
            "SELECT requested, previous, current FROM stock_movements \
             WHERE product_id = $1 ORDER BY id ASC",
        )
        .bind(id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock_movements", e))?;

        rows.iter()
            .map(|row| -> Result<StockDecrement, StoreError> {
                Ok(StockDecrement {
                    product_id: id,
                    requested: to_u64(row.try_get("requested").map_err(row_error)?, "requested")?,
                    previous: to_u64(row.try_get("previous").map_err(row_error)?, "previous")?,
                    current: to_u64(row.try_get("current").map_err(row_error)?, "current")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProductCatalog for PostgresInventoryLedger {
    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn register(&self, product: Product) -> Result<Product, StoreError> {
        sqlx::query("INSERT INTO products (id, name, stock) VALUES ($1, $2, $3)")
            .bind(product.id_typed().0.as_uuid())
            .bind(product.name())
            .bind(to_i64(product.stock(), "stock")?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("register_product", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn remove(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.0.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(row_error)?;
    let items: Json<Vec<LineItem>> = row.try_get("items").map_err(row_error)?;
    let total_amount: i64 = row.try_get("total_amount").map_err(row_error)?;
    let payment_method: String = row.try_get("payment_method").map_err(row_error)?;
    let status: String = row.try_get("status").map_err(row_error)?;
    let version: i64 = row.try_get("version").map_err(row_error)?;

    Ok(Order::rehydrate(OrderParts {
        id: OrderId::new(AggregateId::from_uuid(id)),
        user: row.try_get("user_ref").map_err(row_error)?,
        items: items.0,
        total_amount: to_u64(total_amount, "total_amount")?,
        payment_method: payment_method.parse().map_err(corrupt_row)?,
        shipping_address: row.try_get("shipping_address").map_err(row_error)?,
        status: status.parse().map_err(corrupt_row)?,
        stock_applied_at: row
            .try_get::<Option<DateTime<Utc>>, _>("stock_applied_at")
            .map_err(row_error)?,
        created_at: row.try_get("created_at").map_err(row_error)?,
        updated_at: row.try_get("updated_at").map_err(row_error)?,
        version: to_u64(version, "version")?,
    }))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(row_error)?;
    let name: String = row.try_get("name").map_err(row_error)?;
    let stock: i64 = row.try_get("stock").map_err(row_error)?;
    Product::new(
        ProductId::new(AggregateId::from_uuid(id)),
        name,
        to_u64(stock, "stock")?,
    )
    .map_err(corrupt_row)
}

fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Validation(format!("{field} is too large")))
}

fn to_u64(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Backend(format!("negative {field} in stored row")))
}

fn row_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn corrupt_row(err: storefront_core::DomainError) -> StoreError {
    warn!(error = %err, "corrupt row in storefront tables");
    StoreError::Backend(format!("corrupt row: {err}"))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}
