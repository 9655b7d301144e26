use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Brl, Order, OrderItem, WalletTransaction},
    helpers::{item_summary, REVERSED_MARKER},
    traits::{DepositReversal, InvoicePayment, RefundedOrder},
};

/// A message destined for one user, e.g. to be stored as a system ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub user_id: i64,
    pub message: String,
}

/// An order was paid, either synchronously or when the gateway confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefundedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub new_balance: Brl,
}

impl OrderRefundedEvent {
    pub fn notice(&self) -> UserNotice {
        let summary = item_summary(self.items.iter().map(|i| (i.quantity, i.product_name.as_str())));
        UserNotice {
            user_id: self.order.user_id,
            message: format!(
                "O seu pedido ({summary}) foi reembolsado. O valor de {} foi devolvido à sua carteira.",
                self.order.total_amount
            ),
        }
    }
}

impl From<&RefundedOrder> for OrderRefundedEvent {
    fn from(refund: &RefundedOrder) -> Self {
        Self { order: refund.order.clone(), items: refund.items.clone(), new_balance: refund.new_balance }
    }
}

/// A pending gateway order timed out without a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAbandonedEvent {
    pub order: Order,
}

impl OrderAbandonedEvent {
    pub fn notice(&self) -> UserNotice {
        UserNotice {
            user_id: self.order.user_id,
            message: format!(
                "O pedido #{} de {} foi cancelado porque o pagamento não foi confirmado a tempo.",
                self.order.id, self.order.total_amount
            ),
        }
    }
}

/// Changes to a wallet that the owner should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
    DepositCredited(WalletTransaction),
    DepositReversed(DepositReversal),
    BalanceAdjusted(WalletTransaction),
    InvoicesPaid(InvoicePayment),
}

impl WalletEvent {
    pub fn user_id(&self) -> i64 {
        match self {
            Self::DepositCredited(tx) | Self::BalanceAdjusted(tx) => tx.user_id,
            Self::DepositReversed(reversal) => reversal.transaction.user_id,
            Self::InvoicesPaid(payment) => payment.user_id,
        }
    }

    pub fn notice(&self) -> UserNotice {
        let message = match self {
            Self::DepositCredited(tx) => format!("O seu depósito de {} foi confirmado.", tx.amount),
            Self::DepositReversed(reversal) => {
                let reference = reversal.transaction.description.trim_start_matches(REVERSED_MARKER);
                if reversal.debited.is_positive() {
                    format!(
                        "Um depósito de {} (Ref: {reference}) foi estornado pelo administrador. O valor de {} foi \
                         debitado do seu saldo.",
                        reversal.original_amount, reversal.debited
                    )
                } else {
                    format!(
                        "Um depósito de {} (Ref: {reference}) foi estornado pelo administrador. Nenhum valor foi \
                         debitado pois seu saldo era {}.",
                        reversal.original_amount,
                        Brl::default()
                    )
                }
            },
            Self::BalanceAdjusted(tx) => {
                let reason = tx.description.split_once(": ").map(|(_, r)| r).unwrap_or(tx.description.as_str());
                if tx.tx_type.signed_amount(tx.amount).is_negative() {
                    format!("Um débito de {} foi realizado pelo administrador. Motivo: {reason}", tx.amount)
                } else {
                    format!("Você recebeu um crédito de {} do administrador. Motivo: {reason}", tx.amount)
                }
            },
            Self::InvoicesPaid(payment) => {
                format!("O pagamento de {} das suas faturas foi confirmado.", payment.amount)
            },
        };
        UserNotice { user_id: self.user_id(), message }
    }
}
