use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Brl, PaymentMethod, UserAccount},
    traits::{AccountLedger, SettlementError},
};

/// What a funding source needs to know about the order it is paying for.
#[derive(Debug, Clone)]
pub struct FundingRequest<'a> {
    /// The buyer, as locked at the start of the settlement transaction
    pub user: &'a UserAccount,
    pub order_id: i64,
    pub amount: Brl,
    /// Sent to the gateway, e.g. `[Residencial Aurora] 2x Water`
    pub description: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingOutcome {
    /// The amount has been debited (wallet, credit) or captured (gateway).
    Approved { gateway_ref: Option<String> },
    /// The gateway refused the payment. Nothing was debited.
    Declined { detail: String },
    /// The gateway accepted the request but the money has not moved yet.
    Pending { gateway_ref: String, qr_code: Option<String>, qr_code_base64: Option<String> },
}

/// A way of paying for an order.
///
/// Local implementations run inside the settlement transaction: whatever they write through `ledger` is rolled back if
/// any later settlement step fails. Insufficient balance or credit is reported as
/// [`SettlementError::InsufficientFunds`], never as a `Declined` outcome.
///
/// Remote implementations (see [`FundingSource::is_remote`]) get a plain connection and must not write through it.
#[allow(async_fn_in_trait)]
pub trait FundingSource {
    fn payment_method(&self) -> PaymentMethod;

    /// True for sources that wait on another service. The settlement is then split into short transactions around
    /// the call, so the database write lock is never held while the network is slow.
    fn is_remote(&self) -> bool {
        false
    }

    async fn authorize_and_debit<L: AccountLedger>(
        &self,
        ledger: &mut L,
        request: &FundingRequest<'_>,
    ) -> Result<FundingOutcome, SettlementError>;
}
