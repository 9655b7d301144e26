//! # Backend contracts
//!
//! These traits define what a storage backend must provide for the settlement engine to work on top of it.
//!
//! * [`SettlementDatabase`] is the highest level of behaviour: settling orders atomically, finalizing gateway orders,
//!   refunds and reversals.
//! * [`WalletManagement`] covers wallet balances, deposits, transfers, administrative adjustments and credit invoices.
//! * [`InventoryManagement`] covers stocktakes, remote unlocks and the catalog fields that pricing depends on.
//! * [`TicketManagement`] stores system messages for users.
//! * [`AccountLedger`] is the row-locked view of user balances that a [`FundingSource`] debits. It is implemented by
//!   a backend *connection*, so that funding always happens inside the enclosing transaction.
//! * [`PaymentGateway`] abstracts the external card/PIX processor.
mod account_ledger;
mod data_objects;
mod funding_source;
mod inventory_management;
mod payment_gateway;
mod settlement_database;
mod ticket_management;
mod wallet_management;

pub use account_ledger::AccountLedger;
pub use data_objects::{
    ApplyResult,
    CartItem,
    DepositReversal,
    InventoryUpdate,
    InvoicePayment,
    NewOrderRequest,
    Pagination,
    PendingCharge,
    PricedCart,
    PricedLine,
    PromotionUpdate,
    RefundedOrder,
    SettledOrder,
    SettlementOutcome,
    TransactionDetails,
    TransactionPage,
    TransferResult,
};
pub use funding_source::{FundingOutcome, FundingRequest, FundingSource};
pub use inventory_management::InventoryManagement;
pub use payment_gateway::{
    CardDetails,
    GatewayError,
    GatewayPayment,
    GatewayPaymentRequest,
    GatewayPaymentStatus,
    PayerInfo,
    PaymentGateway,
    PaymentInstrument,
};
pub use settlement_database::{SettlementDatabase, SettlementError};
pub use ticket_management::TicketManagement;
pub use wallet_management::WalletManagement;
