#![allow(dead_code)]
use fridge_settlement_engine::{
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, FakeGateway, Fixture},
    traits::{CartItem, NewOrderRequest, SettlementDatabase},
    InventoryApi,
    OrderFlowApi,
    RefundApi,
    SqliteDatabase,
    WalletApi,
    WebhookApi,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub struct TestContext {
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub fixture: Fixture,
}

impl TestContext {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let fixture = Fixture::new(&db).await;
        Self { db, gateway: FakeGateway::new(), fixture }
    }

    pub fn orders(&self) -> OrderFlowApi<SqliteDatabase, FakeGateway> {
        OrderFlowApi::new(self.db.clone(), self.gateway.clone(), EventProducers::default())
    }

    pub fn wallet(&self) -> WalletApi<SqliteDatabase, FakeGateway> {
        WalletApi::new(self.db.clone(), self.gateway.clone(), EventProducers::default())
    }

    pub fn webhooks(&self) -> WebhookApi<SqliteDatabase, FakeGateway> {
        WebhookApi::new(self.db.clone(), self.gateway.clone(), EventProducers::default())
    }

    pub fn refunds(&self) -> RefundApi<SqliteDatabase> {
        RefundApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn inventory(&self) -> InventoryApi<SqliteDatabase> {
        InventoryApi::new(self.db.clone())
    }

    /// A cart for Alice at the fixture's location.
    pub fn alice_buys(&self, items: &[(i64, i64)]) -> NewOrderRequest {
        self.cart_for(self.fixture.alice.id, items)
    }

    pub fn cart_for(&self, user_id: i64, items: &[(i64, i64)]) -> NewOrderRequest {
        let items = items.iter().map(|&(product_id, quantity)| CartItem { product_id, quantity }).collect();
        NewOrderRequest::new(user_id, self.fixture.location.id, items)
    }

    pub async fn stock(&self, product_id: i64) -> i64 {
        self.fixture.stock_of(&self.db, product_id).await
    }

    pub async fn tear_down(mut self) {
        let url = self.db.url().to_string();
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Failed to drop {url}: {e}");
        }
    }
}
