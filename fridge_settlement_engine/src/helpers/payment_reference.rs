//! # Gateway external references
//!
//! Every payment created with the gateway carries an external reference, which comes back to us on webhook
//! notifications. The prefix tells the reconciler which flow the payment belongs to:
//!
//! ```text
//!    wallet_deposit_{user_id}_{unix_millis}   PIX top-up of a wallet
//!    credit_invoice_{user_id}_{unix_millis}   payment of all outstanding credit invoices
//!    order_{order_id}                         card or PIX purchase awaiting confirmation
//! ```
//!
//! Anything else is a legacy reference and is ignored.
use std::{fmt::Display, str::FromStr};

use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReference {
    WalletDeposit { user_id: i64, timestamp: i64 },
    CreditInvoice { user_id: i64, timestamp: i64 },
    Order { order_id: i64 },
    Legacy(String),
}

const WALLET_DEPOSIT_PREFIX: &str = "wallet_deposit_";
const CREDIT_INVOICE_PREFIX: &str = "credit_invoice_";
const ORDER_PREFIX: &str = "order_";

impl PaymentReference {
    pub fn wallet_deposit(user_id: i64) -> Self {
        Self::WalletDeposit { user_id, timestamp: Utc::now().timestamp_millis() }
    }

    pub fn credit_invoice(user_id: i64) -> Self {
        Self::CreditInvoice { user_id, timestamp: Utc::now().timestamp_millis() }
    }

    pub fn order(order_id: i64) -> Self {
        Self::Order { order_id }
    }
}

fn parse_user_and_timestamp(rest: &str) -> Option<(i64, i64)> {
    let (user, ts) = rest.split_once('_')?;
    Some((user.parse().ok()?, ts.parse().ok()?))
}

/// Parsing never fails: anything unrecognised becomes [`PaymentReference::Legacy`].
impl FromStr for PaymentReference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if let Some(rest) = s.strip_prefix(WALLET_DEPOSIT_PREFIX) {
            parse_user_and_timestamp(rest).map(|(user_id, timestamp)| Self::WalletDeposit { user_id, timestamp })
        } else if let Some(rest) = s.strip_prefix(CREDIT_INVOICE_PREFIX) {
            parse_user_and_timestamp(rest).map(|(user_id, timestamp)| Self::CreditInvoice { user_id, timestamp })
        } else if let Some(rest) = s.strip_prefix(ORDER_PREFIX) {
            rest.parse().ok().map(|order_id| Self::Order { order_id })
        } else {
            None
        };
        Ok(parsed.unwrap_or_else(|| Self::Legacy(s.to_string())))
    }
}

impl Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WalletDeposit { user_id, timestamp } => write!(f, "{WALLET_DEPOSIT_PREFIX}{user_id}_{timestamp}"),
            Self::CreditInvoice { user_id, timestamp } => write!(f, "{CREDIT_INVOICE_PREFIX}{user_id}_{timestamp}"),
            Self::Order { order_id } => write!(f, "{ORDER_PREFIX}{order_id}"),
            Self::Legacy(s) => f.write_str(s),
        }
    }
}
