use chrono::{NaiveDate, Utc};
use fridge_settlement_engine::{
    db_types::Brl,
    traits::{InventoryManagement, InventoryUpdate, PromotionUpdate},
    SettlementError,
};

mod support;
use support::TestContext;

fn update(product_id: i64, quantity: i64) -> InventoryUpdate {
    InventoryUpdate { product_id, quantity, expiration_date: None }
}

#[tokio::test]
async fn stocktake_replaces_quantities() {
    let ctx = TestContext::new().await;
    let (water, soda) = (ctx.fixture.water.id, ctx.fixture.soda.id);
    let location = ctx.fixture.location.id;
    let expiry = NaiveDate::from_ymd_opt(2031, 3, 1);
    let items = vec![InventoryUpdate { product_id: water, quantity: 24, expiration_date: expiry }, update(soda, 0)];
    let entries = ctx.inventory().bulk_upsert(location, &items).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(ctx.stock(water).await, 24);
    assert_eq!(ctx.stock(soda).await, 0);
    let stored = ctx.inventory().inventory(location).await.unwrap();
    assert_eq!(stored.iter().find(|e| e.product_id == water).unwrap().expiration_date, expiry);
    ctx.tear_down().await;
}

#[tokio::test]
async fn one_bad_item_fails_the_whole_stocktake() {
    let ctx = TestContext::new().await;
    let (water, soda) = (ctx.fixture.water.id, ctx.fixture.soda.id);
    let location = ctx.fixture.location.id;
    let api = ctx.inventory();

    let err = api.bulk_upsert(location, &[update(water, 30), update(777, 5)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::ProductNotFound(777)));
    assert_eq!(ctx.stock(water).await, 10);

    let err = api.bulk_upsert(location, &[update(water, 30), update(soda, -1)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationError(_)));
    assert_eq!(ctx.stock(water).await, 10);

    assert!(matches!(api.bulk_upsert(location, &[]).await, Err(SettlementError::ValidationError(_))));
    assert!(matches!(api.bulk_upsert(555, &[update(water, 1)]).await, Err(SettlementError::LocationNotFound(555))));
    assert!(matches!(api.inventory(555).await, Err(SettlementError::LocationNotFound(555))));
    ctx.tear_down().await;
}

#[tokio::test]
async fn remote_unlocks() {
    let ctx = TestContext::new().await;
    let api = ctx.inventory();
    let command = api.remote_unlock("FRIDGE-001").await.unwrap();
    assert_eq!(command.fridge_id, "FRIDGE-001");
    assert_eq!(api.unlock_commands("FRIDGE-001").await.unwrap().len(), 1);
    let err = api.remote_unlock("FRIDGE-999").await.unwrap_err();
    assert!(matches!(err, SettlementError::FridgeNotFound(ref id) if id == "FRIDGE-999"));
    ctx.tear_down().await;
}

#[tokio::test]
async fn restock_cost_applies_to_future_sales_only() {
    let ctx = TestContext::new().await;
    let water = ctx.fixture.water.id;
    let before = ctx.orders().settle_wallet(ctx.alice_buys(&[(water, 1)])).await.unwrap();
    let product = ctx.inventory().register_restock(water, Brl::from(140)).await.unwrap();
    assert_eq!(product.purchase_price, Brl::from(140));
    let after = ctx.orders().settle_wallet(ctx.alice_buys(&[(water, 1)])).await.unwrap();

    assert_eq!(after.items[0].cost_at_purchase, Brl::from(140));
    let old_items = ctx.orders().order_items(before.order.id, ctx.fixture.alice.id).await.unwrap();
    assert_eq!(old_items[0].cost_at_purchase, Brl::from(120));

    assert!(matches!(
        ctx.inventory().register_restock(water, Brl::from(-1)).await,
        Err(SettlementError::ValidationError(_))
    ));
    assert!(matches!(
        ctx.inventory().register_restock(31337, Brl::from(100)).await,
        Err(SettlementError::ProductNotFound(31337))
    ));
    ctx.tear_down().await;
}

#[tokio::test]
async fn promotions_are_all_or_nothing() {
    let ctx = TestContext::new().await;
    let soda = ctx.fixture.soda.id;
    let partial = PromotionUpdate { promotional_price: Some(Brl::from(450)), ..Default::default() };
    let err = ctx.inventory().set_promotion(soda, &partial).await.unwrap_err();
    assert!(matches!(err, SettlementError::ValidationError(_)));

    let now = Utc::now();
    let promotion = PromotionUpdate {
        promotional_price: Some(Brl::from(450)),
        promotion_start_date: Some(now),
        promotion_end_date: Some(now + chrono::Duration::days(7)),
    };
    let product = ctx.inventory().set_promotion(soda, &promotion).await.unwrap();
    assert_eq!(product.promotional_price, Some(Brl::from(450)));

    let cleared = ctx.inventory().set_promotion(soda, &PromotionUpdate::clear()).await.unwrap();
    assert_eq!(cleared.promotional_price, None);
    assert_eq!(ctx.db.fetch_product(soda).await.unwrap().unwrap().promotion_end_date, None);
    ctx.tear_down().await;
}
