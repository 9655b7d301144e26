//! Fridge Settlement Engine
//!
//! The settlement engine is the transactional core of a network of unattended smart fridges. It turns an untrusted
//! cart into a paid order, a ledger entry, an inventory decrement and a door-unlock command, atomically, and keeps
//! those four things consistent through refunds, deposit reversals and asynchronous gateway confirmations.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend that implements them. Callers should not need to
//!    touch the database directly; the data types in [`db_types`] are public.
//! 2. The public API (`settlement_api`), re-exported at the crate root: [`OrderFlowApi`], [`WalletApi`],
//!    [`WebhookApi`], [`RefundApi`] and [`InventoryApi`].
//! 3. [`pricing`], the pure server-side cart pricing step.
//! 4. [`events`], post-commit hooks that subscribers (e.g. a ticket notifier) can attach to.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pricing;
mod settlement_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use settlement_api::{
    CardDeposit,
    CreditFunding,
    DepositStatus,
    GatewayFunding,
    InventoryApi,
    OrderFlowApi,
    PaymentNotification,
    ReconcileOutcome,
    RefundApi,
    WalletApi,
    WalletFunding,
    WebhookApi,
    CARD_DEPOSIT_DESCRIPTION,
    MIN_PIX_DEPOSIT,
    PIX_DEPOSIT_DESCRIPTION,
};
pub use traits::SettlementError;
