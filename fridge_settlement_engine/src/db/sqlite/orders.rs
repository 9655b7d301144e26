use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::sql_timestamp,
    db_types::{Brl, Order, OrderItem, OrderStatusType, PaymentMethod},
    traits::{PricedLine, SettlementError},
};

const ORDER_COLUMNS: &str = "id, user_id, location_id, fridge_id, total_amount, status, payment_method, \
                             payment_gateway_id, description, door_opened_at, created_at, updated_at";

/// The fields of an order row at the moment of insertion. New orders always start out `pending`.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub location_id: i64,
    pub fridge_id: &'a str,
    pub total_amount: Brl,
    pub payment_method: PaymentMethod,
    pub description: &'a str,
}

/// Inserts the order header and its line items. Prices and costs are copied from `lines` and never change afterwards.
pub async fn insert_order(
    order: NewOrder<'_>,
    lines: &[PricedLine],
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<OrderItem>), SettlementError> {
    let inserted: Order = sqlx::query_as(&format!(
        "INSERT INTO orders (user_id, location_id, fridge_id, total_amount, payment_method, description) VALUES ($1, \
         $2, $3, $4, $5, $6) RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order.user_id)
    .bind(order.location_id)
    .bind(order.fridge_id)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .bind(order.description)
    .fetch_one(&mut *conn)
    .await?;
    for line in lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase, cost_at_purchase) VALUES \
             ($1, $2, $3, $4, $5)",
        )
        .bind(inserted.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.unit_cost)
        .execute(&mut *conn)
        .await?;
    }
    let items = fetch_order_items(inserted.id, conn).await?;
    debug!("🗃️ Order #{} inserted with {} items for {}", inserted.id, items.len(), inserted.total_amount);
    Ok((inserted, items))
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementError> {
    let order = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Takes the write lock on the order's row, returning the order as it stands under the lock.
pub async fn lock_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let order = sqlx::query_as(&format!("UPDATE orders SET id = id WHERE id = $1 RETURNING {ORDER_COLUMNS}"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?
        .ok_or(SettlementError::OrderNotFound(order_id))?;
    trace!("🗃️ Locked order #{order_id}");
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, SettlementError> {
    let items = sqlx::query_as(
        r#"
        SELECT
            order_items.id,
            order_items.order_id,
            order_items.product_id,
            products.name AS product_name,
            order_items.quantity,
            order_items.price_at_purchase,
            order_items.cost_at_purchase
        FROM order_items JOIN products ON order_items.product_id = products.id
        WHERE order_items.order_id = $1
        ORDER BY order_items.id
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Moves an order from `from` to `to`, optionally recording the gateway payment id. Returns `None` if the order was
/// not in status `from`, in which case nothing changed.
///
/// Callers are responsible for only requesting legal transitions; see [`OrderStatusType::can_transition_to`].
pub async fn transition_status(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    gateway_ref: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementError> {
    let order: Option<Order> = sqlx::query_as(&format!(
        "UPDATE orders SET status = $1, payment_gateway_id = COALESCE($2, payment_gateway_id), updated_at = \
         CURRENT_TIMESTAMP WHERE id = $3 AND status = $4 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(to)
    .bind(gateway_ref)
    .bind(order_id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    if order.is_some() {
        debug!("🗃️ Order #{order_id} moved from {from} to {to}");
    }
    Ok(order)
}

/// Records the gateway payment id of a pending order without changing its status.
pub async fn set_gateway_ref(
    order_id: i64,
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let order = sqlx::query_as(&format!(
        "UPDATE orders SET payment_gateway_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING \
         {ORDER_COLUMNS}"
    ))
    .bind(gateway_ref)
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or(SettlementError::OrderNotFound(order_id))?;
    Ok(order)
}

/// Removes a pending order that was never paid, together with its items. Used when the gateway refuses or fails to
/// create the payment, so that nothing of the attempt remains.
pub async fn delete_unpaid_order(order_id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let deleted = sqlx::query(
        "DELETE FROM order_items WHERE order_id = (SELECT id FROM orders WHERE id = $1 AND status = 'pending')",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    let orders = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'pending'")
        .bind(order_id)
        .execute(conn)
        .await?
        .rows_affected();
    if orders == 0 {
        return Err(SettlementError::InvalidState(format!("Order #{order_id} is no longer pending")));
    }
    trace!("🗃️ Deleted unpaid order #{order_id} and {deleted} items");
    Ok(())
}

/// Sets `door_opened_at` if it has not been set yet. Returns `None` for unknown orders and for repeated reports.
pub async fn mark_door_opened(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementError> {
    let order = sqlx::query_as(&format!(
        "UPDATE orders SET door_opened_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND \
         door_opened_at IS NULL RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves every order that has been `pending` since before `cutoff` to `abandoned`, returning the affected orders.
pub async fn abandon_pending_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementError> {
    let orders = sqlx::query_as(&format!(
        "UPDATE orders SET status = 'abandoned', updated_at = CURRENT_TIMESTAMP WHERE status = 'pending' AND \
         created_at < $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(sql_timestamp(cutoff))
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
