use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Brl, Order, OrderItem, OrderStatusType},
    traits::{
        data_objects::{ApplyResult, DepositReversal, NewOrderRequest, RefundedOrder, SettlementOutcome},
        FundingSource,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the settlement engine.
///
/// Every method that mutates state does so inside a single database transaction. If any step fails, the transaction
/// is rolled back before the error is returned, so no partial financial or inventory state is ever observable.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Settles a new order in one atomic unit:
    /// * locks the buyer's account row,
    /// * checks that the location has a fridge and re-prices the cart from the catalog,
    /// * checks that the location holds enough stock,
    /// * asks `funding` to authorize and debit the total,
    /// * on approval: marks the order paid, appends the ledger row, decrements inventory and enqueues the unlock
    ///   command.
    ///
    /// A declined payment rolls everything back and returns [`SettlementError::GatewayDeclined`]. A pending payment
    /// (PIX, or a card under review) commits the order as `pending` with no stock or unlock effects; the webhook
    /// reconciler finishes it later.
    async fn settle_order<F: FundingSource>(
        &self,
        request: &NewOrderRequest,
        funding: &F,
    ) -> Result<SettlementOutcome, SettlementError>;

    /// Marks a pending gateway order as paid after the gateway confirmed `payment_id`. The stock is decremented, the
    /// `gateway_purchase` ledger row is appended and the unlock command is queued. Repeated calls for the same
    /// payment are no-ops returning [`ApplyResult::Duplicate`].
    async fn finalize_gateway_order(&self, order_id: i64, payment_id: &str)
        -> Result<ApplyResult<Order>, SettlementError>;

    /// Moves every `pending` order created before `cutoff` to `abandoned`, and returns them.
    async fn abandon_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, SettlementError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SettlementError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, SettlementError>;

    /// Records the moment the fridge reported its door open. Only the first report for an order is recorded; later
    /// ones, or reports for unknown orders, return [`SettlementError::OrderNotFound`].
    async fn confirm_door_opened(&self, order_id: i64) -> Result<Order, SettlementError>;

    /// Reverses a paid order: restores stock, marks the order refunded, credits the wallet with the order total and
    /// appends a deposit row referencing the order.
    async fn refund_order(&self, order_id: i64) -> Result<RefundedOrder, SettlementError>;

    /// Reverses a wallet deposit. The wallet is debited by `min(balance, deposit)` so the reversal never drives the
    /// balance negative by itself.
    async fn refund_deposit(&self, transaction_id: i64) -> Result<DepositReversal, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Location {0} does not exist")]
    LocationNotFound(i64),
    #[error("Fridge {0} does not exist")]
    FridgeNotFound(String),
    #[error("User {0} does not exist")]
    UserNotFound(i64),
    #[error("There is no user with the email address {0}")]
    RecipientNotFound(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Wallet transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("Insufficient funds. {available} is available but {required} is required")]
    InsufficientFunds { available: Brl, required: Brl },
    #[error("Only {available} units of product {product_id} are in stock, but {requested} were requested")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Order {order_id} is {status}. {message}")]
    IllegalOrderTransition { order_id: i64, status: OrderStatusType, message: String },
    #[error("Invalid state. {0}")]
    InvalidState(String),
    #[error("The payment was declined. {0}")]
    GatewayDeclined(String),
    #[error("Could not reach the payment gateway. {0}")]
    GatewayError(String),
    #[error("Internal consistency violation. {0}")]
    ConsistencyViolation(String),
    #[error("Internal database error. {0}")]
    DatabaseError(String),
}

impl SettlementError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_) |
                Self::LocationNotFound(_) |
                Self::FridgeNotFound(_) |
                Self::UserNotFound(_) |
                Self::RecipientNotFound(_) |
                Self::OrderNotFound(_) |
                Self::TransactionNotFound(_)
        )
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::IllegalOrderTransition { .. })
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
