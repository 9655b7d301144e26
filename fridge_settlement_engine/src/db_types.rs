use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
pub use fridge_common::Brl;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

/// Implements `Display` and `FromStr` for enums that are stored as lowercase text in the database.
macro_rules! text_enum {
    ($type:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)+
                }
            }
        }

        impl FromStr for $type {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
/// `pending → paid`, `pending → abandoned` and `paid → refunded` are the only legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    Pending,
    Paid,
    Refunded,
    Abandoned,
}

text_enum!(OrderStatusType, "order status", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
    Abandoned => "abandoned",
});

impl OrderStatusType {
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (Pending, Paid) | (Pending, Abandoned) | (Paid, Refunded))
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Credit,
    Card,
    Pix,
}

text_enum!(PaymentMethod, "payment method", {
    Wallet => "wallet",
    Credit => "credit",
    Card => "card",
    Pix => "pix",
});

impl PaymentMethod {
    /// The ledger row type that accompanies a paid order settled with this method.
    pub fn ledger_type(&self) -> WalletTransactionType {
        match self {
            Self::Wallet => WalletTransactionType::Purchase,
            Self::Credit => WalletTransactionType::CreditPurchase,
            Self::Card | Self::Pix => WalletTransactionType::GatewayPurchase,
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Card | Self::Pix)
    }
}

//-------------------------------------- WalletTransactionType ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    Deposit,
    Purchase,
    CreditPurchase,
    /// A card or PIX purchase. Recorded for the audit trail, never moves the wallet balance.
    GatewayPurchase,
    TransferIn,
    TransferOut,
}

text_enum!(WalletTransactionType, "wallet transaction type", {
    Deposit => "deposit",
    Purchase => "purchase",
    CreditPurchase => "credit_purchase",
    GatewayPurchase => "gateway_purchase",
    TransferIn => "transfer_in",
    TransferOut => "transfer_out",
});

impl WalletTransactionType {
    pub fn is_purchase(&self) -> bool {
        matches!(self, Self::Purchase | Self::CreditPurchase | Self::GatewayPurchase)
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::TransferIn | Self::TransferOut)
    }

    /// Amounts are stored as magnitudes. This gives the effect of `amount` on the wallet balance.
    pub fn signed_amount(&self, amount: Brl) -> Brl {
        match self {
            Self::Deposit | Self::TransferIn => amount,
            Self::Purchase | Self::TransferOut => -amount,
            Self::CreditPurchase | Self::GatewayPurchase => Brl::default(),
        }
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Active,
    Reversed,
}

text_enum!(TransactionStatus, "transaction status", {
    Active => "active",
    Reversed => "reversed",
});

//--------------------------------------    InvoiceStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Open,
    Late,
    Paid,
}

text_enum!(InvoiceStatus, "invoice status", {
    Open => "open",
    Late => "late",
    Paid => "paid",
});

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Unit cost, updated on restock
    pub purchase_price: Brl,
    pub sale_price: Brl,
    pub promotional_price: Option<Brl>,
    pub promotion_start_date: Option<DateTime<Utc>>,
    pub promotion_end_date: Option<DateTime<Utc>>,
    pub critical_stock_level: i64,
    pub archived: bool,
}

impl Product {
    /// The promotional price applies when `now` lies inside the (inclusive) promotion window. A partially configured
    /// promotion never applies.
    pub fn effective_price(&self, now: DateTime<Utc>) -> Brl {
        match (self.promotional_price, self.promotion_start_date, self.promotion_end_date) {
            (Some(price), Some(start), Some(end)) if start <= now && now <= end => price,
            _ => self.sale_price,
        }
    }
}

//--------------------------------------       Location      ---------------------------------------------------------
/// A condominium. Only locations with a fridge can take orders.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub fridge_id: Option<String>,
    pub syndic_commission_percentage: f64,
    pub initial_investment: Brl,
    pub monthly_fixed_cost: Brl,
}

//--------------------------------------    InventoryEntry   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub location_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
    pub last_updated: DateTime<Utc>,
}

//--------------------------------------     UserAccount     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub location_id: Option<i64>,
    pub wallet_balance: Brl,
    pub credit_limit: Brl,
    pub credit_used: Brl,
}

impl UserAccount {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(self.name.as_str())
    }

    pub fn last_name(&self) -> Option<String> {
        let rest = self.name.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
        (!rest.is_empty()).then_some(rest)
    }

    /// The CPF with punctuation removed, the way the payment gateway expects it.
    pub fn cpf_digits(&self) -> String {
        self.cpf.chars().filter(char::is_ascii_digit).collect()
    }
}

/// The public face of another user, shown when sending them money or on a transfer receipt.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Counterparty {
    pub name: String,
    pub email: String,
    pub location_name: Option<String>,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub location_id: i64,
    pub fridge_id: String,
    pub total_amount: Brl,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_gateway_id: Option<String>,
    pub description: String,
    pub door_opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item. Price and cost are frozen at the moment of sale.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Brl,
    pub cost_at_purchase: Brl,
}

//--------------------------------------  WalletTransaction  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub tx_type: WalletTransactionType,
    pub amount: Brl,
    pub description: String,
    pub related_order_id: Option<i64>,
    pub payment_gateway_id: Option<String>,
    pub counterparty_id: Option<i64>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWalletTransaction {
    pub user_id: i64,
    pub tx_type: WalletTransactionType,
    pub amount: Brl,
    pub description: String,
    pub related_order_id: Option<i64>,
    pub payment_gateway_id: Option<String>,
    pub counterparty_id: Option<i64>,
}

impl NewWalletTransaction {
    pub fn new<S: Into<String>>(user_id: i64, tx_type: WalletTransactionType, amount: Brl, description: S) -> Self {
        Self {
            user_id,
            tx_type,
            amount,
            description: description.into(),
            related_order_id: None,
            payment_gateway_id: None,
            counterparty_id: None,
        }
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.related_order_id = Some(order_id);
        self
    }

    pub fn with_gateway_id<S: Into<String>>(mut self, payment_id: S) -> Self {
        self.payment_gateway_id = Some(payment_id.into());
        self
    }

    pub fn with_counterparty(mut self, user_id: i64) -> Self {
        self.counterparty_id = Some(user_id);
        self
    }
}

//--------------------------------------    CreditInvoice    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CreditInvoice {
    pub id: i64,
    pub user_id: i64,
    pub amount: Brl,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub related_payment_ref: Option<String>,
}

//--------------------------------------    UnlockCommand    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UnlockCommand {
    pub id: i64,
    pub fridge_id: String,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Ticket       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
