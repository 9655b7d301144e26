use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::InventoryEntry,
    traits::{InventoryUpdate, SettlementError},
};

const INVENTORY_COLUMNS: &str = "location_id, product_id, quantity, expiration_date, last_updated";

pub async fn fetch_inventory(
    location_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryEntry>, SettlementError> {
    let entries = sqlx::query_as(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE location_id = $1 ORDER BY product_id"
    ))
    .bind(location_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// The quantity on hand. A missing entry counts as zero.
pub async fn available_quantity(
    location_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SettlementError> {
    let quantity: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM inventory WHERE location_id = $1 AND product_id = $2")
            .bind(location_id)
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(quantity.unwrap_or(0))
}

/// Fails with [`SettlementError::InsufficientStock`] if fewer than `quantity` units are on hand.
pub async fn ensure_available(
    location_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let available = available_quantity(location_id, product_id, conn).await?;
    if available < quantity {
        debug!("🗃️ Location #{location_id} has {available} of product #{product_id}, {quantity} requested");
        return Err(SettlementError::InsufficientStock { product_id, requested: quantity, available });
    }
    Ok(())
}

/// Conditionally decrements the stock. Stock never goes negative through this function: if fewer than `quantity`
/// units are on hand, nothing changes and [`SettlementError::InsufficientStock`] is returned.
pub async fn decrement(
    location_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SettlementError> {
    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE inventory SET quantity = quantity - $3, last_updated = CURRENT_TIMESTAMP WHERE location_id = $1 AND \
         product_id = $2 AND quantity >= $3 RETURNING quantity",
    )
    .bind(location_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;
    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let available = available_quantity(location_id, product_id, conn).await?;
            Err(SettlementError::InsufficientStock { product_id, requested: quantity, available })
        },
    }
}

/// Decrements the stock unconditionally. Only used when the money has already been captured, so the sale cannot be
/// refused any more. A negative result is logged as a consistency violation for an operator to investigate.
pub async fn force_decrement(
    location_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SettlementError> {
    let remaining: i64 = sqlx::query_scalar(
        "INSERT INTO inventory (location_id, product_id, quantity) VALUES ($1, $2, -$3) ON CONFLICT (location_id, \
         product_id) DO UPDATE SET quantity = inventory.quantity - $3, last_updated = CURRENT_TIMESTAMP RETURNING \
         quantity",
    )
    .bind(location_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    if remaining < 0 {
        let violation = SettlementError::ConsistencyViolation(format!(
            "Stock of product #{product_id} at location #{location_id} is now {remaining}"
        ));
        warn!("🗃️ {violation}");
    }
    Ok(remaining)
}

/// Returns stock to the shelf, creating the entry if necessary.
pub async fn increment(
    location_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SettlementError> {
    let quantity: i64 = sqlx::query_scalar(
        "INSERT INTO inventory (location_id, product_id, quantity) VALUES ($1, $2, $3) ON CONFLICT (location_id, \
         product_id) DO UPDATE SET quantity = inventory.quantity + $3, last_updated = CURRENT_TIMESTAMP RETURNING \
         quantity",
    )
    .bind(location_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    Ok(quantity)
}

/// Replaces the quantity and expiration date of one entry.
pub async fn upsert(
    location_id: i64,
    update: &InventoryUpdate,
    conn: &mut SqliteConnection,
) -> Result<InventoryEntry, SettlementError> {
    let entry = sqlx::query_as(&format!(
        "INSERT INTO inventory (location_id, product_id, quantity, expiration_date) VALUES ($1, $2, $3, $4) ON \
         CONFLICT (location_id, product_id) DO UPDATE SET quantity = excluded.quantity, expiration_date = \
         excluded.expiration_date, last_updated = CURRENT_TIMESTAMP RETURNING {INVENTORY_COLUMNS}"
    ))
    .bind(location_id)
    .bind(update.product_id)
    .bind(update.quantity)
    .bind(update.expiration_date)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}
