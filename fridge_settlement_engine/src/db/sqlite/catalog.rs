use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Brl, Location, Product},
    traits::{PromotionUpdate, SettlementError},
};

const PRODUCT_COLUMNS: &str = "id, name, purchase_price, sale_price, promotional_price, promotion_start_date, \
                               promotion_end_date, critical_stock_level, archived";
const LOCATION_COLUMNS: &str =
    "id, name, fridge_id, syndic_commission_percentage, initial_investment, monthly_fixed_cost";

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SettlementError> {
    let product = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Fetches every product in `ids`. Unknown ids are silently absent from the result; the pricing step reports them.
pub async fn fetch_products(ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, SettlementError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn fetch_location(
    location_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Location>, SettlementError> {
    let location = sqlx::query_as(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"))
        .bind(location_id)
        .fetch_optional(conn)
        .await?;
    Ok(location)
}

/// Takes the write lock on the location's row and returns it. Returns `None` for unknown locations.
pub async fn lock_location(
    location_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Location>, SettlementError> {
    let location =
        sqlx::query_as(&format!("UPDATE locations SET id = id WHERE id = $1 RETURNING {LOCATION_COLUMNS}"))
            .bind(location_id)
            .fetch_optional(conn)
            .await?;
    Ok(location)
}

pub async fn fetch_location_by_fridge(
    fridge_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Location>, SettlementError> {
    let location = sqlx::query_as(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE fridge_id = $1"))
        .bind(fridge_id)
        .fetch_optional(conn)
        .await?;
    Ok(location)
}

/// Sets (or clears, when every field is `None`) the promotion window of a product.
pub async fn set_promotion(
    product_id: i64,
    promotion: &PromotionUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SettlementError> {
    let product = sqlx::query_as(&format!(
        "UPDATE products SET promotional_price = $1, promotion_start_date = $2, promotion_end_date = $3, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $4 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(promotion.promotional_price)
    .bind(promotion.promotion_start_date)
    .bind(promotion.promotion_end_date)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    debug!("🗃️ Promotion for product #{product_id} set to {promotion:?}");
    Ok(product)
}

pub async fn set_purchase_price(
    product_id: i64,
    purchase_price: Brl,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SettlementError> {
    let product = sqlx::query_as(&format!(
        "UPDATE products SET purchase_price = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING \
         {PRODUCT_COLUMNS}"
    ))
    .bind(purchase_price)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}
