use std::fmt::Debug;

use log::*;

use crate::{
    events::{EventProducers, OrderRefundedEvent, WalletEvent},
    traits::{DepositReversal, RefundedOrder, SettlementDatabase, SettlementError},
};

/// Administrative reversals of paid orders and wallet deposits.
pub struct RefundApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for RefundApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B> RefundApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> RefundApi<B>
where B: SettlementDatabase
{
    /// Restores the stock of a paid order and credits its total to the buyer's wallet.
    pub async fn refund_order(&self, order_id: i64) -> Result<RefundedOrder, SettlementError> {
        let refund = self.db.refund_order(order_id).await?;
        info!("🧾️ Order #{order_id} refunded. User #{} balance is now {}", refund.order.user_id, refund.new_balance);
        self.producers.publish_order_refunded(OrderRefundedEvent::from(&refund)).await;
        Ok(refund)
    }

    /// Reverses a deposit, debiting no more than the user still holds.
    pub async fn refund_deposit(&self, transaction_id: i64) -> Result<DepositReversal, SettlementError> {
        let reversal = self.db.refund_deposit(transaction_id).await?;
        if reversal.debited < reversal.original_amount {
            warn!(
                "🧾️ Deposit #{transaction_id} of {} was only partially recovered. {} was debited",
                reversal.original_amount, reversal.debited
            );
        }
        self.producers.publish_wallet_event(WalletEvent::DepositReversed(reversal.clone())).await;
        Ok(reversal)
    }
}
