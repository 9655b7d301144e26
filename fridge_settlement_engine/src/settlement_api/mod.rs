//! # Settlement engine public API
//!
//! The API is split by concern, so that clients can pick the parts they need. Every API is created by supplying a
//! backend that implements the traits it requires, plus the [`EventProducers`](crate::events::EventProducers) it
//! publishes to once a change has been committed.
//!
//! * [`OrderFlowApi`] settles orders with the wallet, the credit line, a card or PIX, and answers order and door
//!   status queries.
//! * [`WalletApi`] handles deposits, transfers, administrative adjustments, history and credit invoice charges.
//! * [`WebhookApi`] reconciles asynchronous gateway notifications.
//! * [`RefundApi`] reverses orders and deposits.
//! * [`InventoryApi`] covers stocktakes, remote unlocks, promotions and restock costs.
//!
//! ```rust,ignore
//! use fridge_settlement_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/fridge_store.db", 5).await?;
//! let api = OrderFlowApi::new(db, gateway, EventProducers::default());
//! let settled = api.settle_wallet(NewOrderRequest::new(user_id, location_id, items)).await?;
//! ```
mod funding;
mod inventory_api;
mod order_flow_api;
mod refund_api;
mod wallet_api;
mod webhook_api;

pub use funding::{CreditFunding, GatewayFunding, WalletFunding};
pub use inventory_api::InventoryApi;
pub use order_flow_api::OrderFlowApi;
pub use refund_api::RefundApi;
pub use wallet_api::{
    deposit_description,
    CardDeposit,
    DepositStatus,
    WalletApi,
    CARD_DEPOSIT_DESCRIPTION,
    MIN_PIX_DEPOSIT,
    PIX_DEPOSIT_DESCRIPTION,
};
pub use webhook_api::{PaymentNotification, ReconcileOutcome, WebhookApi};
