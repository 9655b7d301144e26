use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Brl, Counterparty, CreditInvoice, Order, OrderItem, UnlockCommand, WalletTransaction},
    helpers::item_summary,
    traits::SettlementError,
};

/// One line of an untrusted client cart. Any price the client may have shown the user is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub user_id: i64,
    pub location_id: i64,
    pub items: Vec<CartItem>,
}

impl NewOrderRequest {
    pub fn new(user_id: i64, location_id: i64, items: Vec<CartItem>) -> Self {
        Self { user_id, location_id, items }
    }

    pub fn product_ids(&self) -> Vec<i64> {
        let mut ids = self.items.iter().map(|i| i.product_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// A cart line after server-side pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Brl,
    pub unit_cost: Brl,
}

impl PricedLine {
    pub fn line_total(&self) -> Result<Brl, SettlementError> {
        self.unit_price.checked_mul(self.quantity).ok_or_else(|| {
            SettlementError::ValidationError(format!("{} x {} is too large to charge", self.quantity, self.name))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Brl,
}

impl PricedCart {
    /// `1x Water, 2x Soda`
    pub fn summary(&self) -> String {
        item_summary(self.lines.iter().map(|l| (l.quantity, l.name.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub ledger_entry: WalletTransaction,
    pub unlock: UnlockCommand,
}

/// A gateway charge the user still has to complete, typically by scanning a PIX QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCharge {
    pub payment_id: String,
    pub amount: Brl,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Paid(SettledOrder),
    Pending { order: Order, charge: PendingCharge },
}

impl SettlementOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Paid(settled) => &settled.order,
            Self::Pending { order, .. } => order,
        }
    }
}

/// The result of applying an effect that may already have been applied, e.g. a webhook notification delivered twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult<T> {
    Applied(T),
    Duplicate,
}

impl<T> ApplyResult<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(t) => Some(t),
            Self::Duplicate => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub refund_entry: WalletTransaction,
    pub new_balance: Brl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReversal {
    pub transaction: WalletTransaction,
    pub original_amount: Brl,
    /// May be less than `original_amount` when the user already spent part of the deposit.
    pub debited: Brl,
    pub new_balance: Brl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub user_id: i64,
    pub payment_id: String,
    pub invoices: Vec<CreditInvoice>,
    pub amount: Brl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub outgoing: WalletTransaction,
    pub incoming: WalletTransaction,
    pub sender_balance: Brl,
}

/// One item of an administrative stocktake. Quantities replace the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub product_id: i64,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionUpdate {
    pub promotional_price: Option<Brl>,
    pub promotion_start_date: Option<DateTime<Utc>>,
    pub promotion_end_date: Option<DateTime<Utc>>,
}

impl PromotionUpdate {
    pub fn clear() -> Self {
        Self::default()
    }

    /// A promotion is either fully specified (price and a well-ordered window) or fully cleared.
    pub fn validate(&self) -> Result<(), SettlementError> {
        match (self.promotional_price, self.promotion_start_date, self.promotion_end_date) {
            (None, None, None) => Ok(()),
            (Some(price), Some(start), Some(end)) => {
                if !price.is_positive() {
                    Err(SettlementError::ValidationError("The promotional price must be positive".into()))
                } else if start > end {
                    Err(SettlementError::ValidationError("The promotion ends before it starts".into()))
                } else {
                    Ok(())
                }
            },
            _ => Err(SettlementError::ValidationError(
                "A promotion needs a price, a start date and an end date".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(page: i64, limit: i64) -> Result<Self, SettlementError> {
        if page < 1 {
            return Err(SettlementError::ValidationError("Pages are numbered from 1".into()));
        }
        if !(1..=Self::MAX_LIMIT).contains(&limit) {
            return Err(SettlementError::ValidationError(format!(
                "The page size must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<WalletTransaction>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// A ledger row as a receipt: purchases list what was bought, transfers name the other party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    #[serde(flatten)]
    pub transaction: WalletTransaction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
}
