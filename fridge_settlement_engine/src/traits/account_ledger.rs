use crate::{
    db_types::{Brl, UserAccount},
    traits::SettlementError,
};

/// Balance and credit mutations on a user account, as seen from inside an open transaction.
///
/// [`AccountLedger::lock_user`] must be called before any read-then-write on the same user, and holds the lock until
/// the enclosing transaction ends. This is what prevents lost updates between concurrent purchases, transfers and
/// administrative adjustments.
#[allow(async_fn_in_trait)]
pub trait AccountLedger {
    /// Locks the user's row and returns its current state. Fails with [`SettlementError::UserNotFound`] for unknown
    /// users.
    async fn lock_user(&mut self, user_id: i64) -> Result<UserAccount, SettlementError>;

    /// Adds `delta` (which may be negative) to the wallet balance and returns the new balance.
    async fn adjust_wallet_balance(&mut self, user_id: i64, delta: Brl) -> Result<Brl, SettlementError>;

    /// Adds `delta` to the credit used and returns the new value.
    async fn adjust_credit_used(&mut self, user_id: i64, delta: Brl) -> Result<Brl, SettlementError>;

    /// The sum of the user's open and late credit invoices.
    async fn outstanding_invoice_total(&mut self, user_id: i64) -> Result<Brl, SettlementError>;
}
