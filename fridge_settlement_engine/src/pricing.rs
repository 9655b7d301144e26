//! Server-side cart pricing.
//!
//! Prices are always derived from the catalog rows at the moment of checkout. Nothing the client sends, other than
//! product ids and quantities, is used.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::trace;

use crate::{
    db_types::{Brl, Product},
    traits::{CartItem, PricedCart, PricedLine, SettlementError},
};

/// No fridge holds anywhere near this many units of one product.
pub const MAX_LINE_QUANTITY: i64 = 1_000;

/// Merges duplicate product ids (keeping the position of the first occurrence) and rejects empty carts and
/// quantities outside `1..=MAX_LINE_QUANTITY`, before or after merging.
pub fn normalize_cart(items: &[CartItem]) -> Result<Vec<CartItem>, SettlementError> {
    if items.is_empty() {
        return Err(SettlementError::ValidationError("The cart is empty".into()));
    }
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if !(1..=MAX_LINE_QUANTITY).contains(&item.quantity) {
            return Err(invalid_quantity(item.product_id, item.quantity));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or_else(|| invalid_quantity(item.product_id, existing.quantity.saturating_add(item.quantity)))?;
            },
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

fn invalid_quantity(product_id: i64, quantity: i64) -> SettlementError {
    SettlementError::ValidationError(format!(
        "Product {product_id} has an invalid quantity of {quantity}. At most {MAX_LINE_QUANTITY} units can be bought"
    ))
}

/// Prices `items` against `products` as of `now`.
///
/// Every product id in the cart must be present in `products`, otherwise [`SettlementError::ProductNotFound`] is
/// returned.
pub fn price_cart(products: &[Product], items: &[CartItem], now: DateTime<Utc>) -> Result<PricedCart, SettlementError> {
    let catalog = products.iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
    let lines = normalize_cart(items)?
        .into_iter()
        .map(|item| -> Result<PricedLine, SettlementError> {
            let product = catalog.get(&item.product_id).ok_or(SettlementError::ProductNotFound(item.product_id))?;
            Ok(PricedLine {
                product_id: product.id,
                name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.effective_price(now),
                unit_cost: product.purchase_price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total = lines.iter().try_fold(Brl::default(), |total, line| -> Result<Brl, SettlementError> {
        total
            .checked_add(line.line_total()?)
            .ok_or_else(|| SettlementError::ValidationError("The cart total is too large to charge".into()))
    })?;
    trace!("🏷️ Priced cart of {} lines at {total}", lines.len());
    Ok(PricedCart { lines, total })
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn product(id: i64, name: &str, sale: i64, cost: i64) -> Product {
        Product {
            id,
            name: name.into(),
            purchase_price: Brl::from(cost),
            sale_price: Brl::from(sale),
            promotional_price: None,
            promotion_start_date: None,
            promotion_end_date: None,
            critical_stock_level: 0,
            archived: false,
        }
    }

    fn item(product_id: i64, quantity: i64) -> CartItem {
        CartItem { product_id, quantity }
    }

    #[test]
    fn totals_come_from_the_catalog() {
        let products = vec![product(1, "Water", 350, 120), product(2, "Soda", 600, 250)];
        let cart = price_cart(&products, &[item(1, 2), item(2, 1)], Utc::now()).unwrap();
        assert_eq!(cart.total, Brl::from(1300));
        assert_eq!(cart.lines[0].unit_cost, Brl::from(120));
        assert_eq!(cart.summary(), "2x Water, 1x Soda");
    }

    #[test]
    fn active_promotion_wins() {
        let now = Utc::now();
        let mut p = product(1, "Juice", 800, 300);
        p.promotional_price = Some(Brl::from(500));
        p.promotion_start_date = Some(now - Duration::hours(1));
        p.promotion_end_date = Some(now + Duration::hours(1));
        let cart = price_cart(&[p.clone()], &[item(1, 1)], now).unwrap();
        assert_eq!(cart.total, Brl::from(500));
        let later = price_cart(&[p], &[item(1, 1)], now + Duration::hours(3)).unwrap();
        assert_eq!(later.total, Brl::from(800));
    }

    #[test]
    fn unknown_products_are_rejected() {
        let products = vec![product(1, "Water", 350, 120)];
        let err = price_cart(&products, &[item(1, 1), item(9, 1)], Utc::now()).unwrap_err();
        assert!(matches!(err, SettlementError::ProductNotFound(9)));
    }

    #[test]
    fn duplicates_are_merged() {
        let products = vec![product(1, "Water", 350, 120), product(2, "Soda", 600, 250)];
        let cart = price_cart(&products, &[item(2, 1), item(1, 1), item(2, 2)], Utc::now()).unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].product_id, 2);
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.total, Brl::from(2150));
    }

    #[test]
    fn invalid_carts() {
        let products = vec![product(1, "Water", 350, 120)];
        assert!(matches!(price_cart(&products, &[], Utc::now()), Err(SettlementError::ValidationError(_))));
        assert!(matches!(price_cart(&products, &[item(1, 0)], Utc::now()), Err(SettlementError::ValidationError(_))));
        assert!(matches!(price_cart(&products, &[item(1, -2)], Utc::now()), Err(SettlementError::ValidationError(_))));
    }

    #[test]
    fn huge_quantities_are_rejected() {
        let products = vec![product(1, "Water", 350, 120)];
        let now = Utc::now();
        let err = price_cart(&products, &[item(1, i64::MAX / 2)], now).unwrap_err();
        assert!(matches!(err, SettlementError::ValidationError(_)));
        let err = price_cart(&products, &[item(1, i64::MAX), item(1, i64::MAX)], now).unwrap_err();
        assert!(matches!(err, SettlementError::ValidationError(_)));
        // Each line is within bounds, the merged line is not
        let err = price_cart(&products, &[item(1, 600), item(1, 600)], now).unwrap_err();
        assert!(matches!(err, SettlementError::ValidationError(_)));
        let cart = price_cart(&products, &[item(1, MAX_LINE_QUANTITY)], now).unwrap();
        assert_eq!(cart.total, Brl::from(350 * MAX_LINE_QUANTITY));
    }

    #[test]
    fn line_totals_do_not_overflow() {
        let line = PricedLine {
            product_id: 1,
            name: "Gold bar".into(),
            quantity: 3,
            unit_price: Brl::from(i64::MAX / 2),
            unit_cost: Brl::from(0),
        };
        assert!(matches!(line.line_total(), Err(SettlementError::ValidationError(_))));
        let err = price_cart(&[product(1, "Gold bar", i64::MAX / 2, 0)], &[item(1, 3)], Utc::now()).unwrap_err();
        assert!(matches!(err, SettlementError::ValidationError(_)));
    }
}
