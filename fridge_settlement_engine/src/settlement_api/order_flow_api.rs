use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderItem},
    events::{EventProducers, OrderAbandonedEvent, OrderPaidEvent},
    settlement_api::funding::{CreditFunding, GatewayFunding, WalletFunding},
    traits::{
        CardDetails,
        FundingSource,
        NewOrderRequest,
        PaymentGateway,
        PaymentInstrument,
        SettledOrder,
        SettlementDatabase,
        SettlementError,
        SettlementOutcome,
    },
};

/// `OrderFlowApi` is the primary API for turning a cart into a paid order and an open fridge door.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    /// Pays for the order from the wallet balance. The order is either paid or nothing happened.
    pub async fn settle_wallet(&self, request: NewOrderRequest) -> Result<SettledOrder, SettlementError> {
        self.settle_synchronously(&request, &WalletFunding).await
    }

    /// Charges the order to the user's credit line.
    pub async fn settle_credit(&self, request: NewOrderRequest) -> Result<SettledOrder, SettlementError> {
        self.settle_synchronously(&request, &CreditFunding).await
    }

    /// Charges a tokenised card. The result is usually `Paid`, but a card held for review by the gateway leaves the
    /// order `Pending` until the webhook confirms it.
    pub async fn settle_card(
        &self,
        request: NewOrderRequest,
        card: CardDetails,
    ) -> Result<SettlementOutcome, SettlementError> {
        let funding = GatewayFunding::new(&self.gateway, PaymentInstrument::Card(card));
        let outcome = self.db.settle_order(&request, &funding).await?;
        self.report(&outcome).await;
        Ok(outcome)
    }

    /// Creates a PIX charge for the order. The order stays `Pending` until the webhook confirms the payment.
    pub async fn settle_pix(&self, request: NewOrderRequest) -> Result<SettlementOutcome, SettlementError> {
        let funding = GatewayFunding::new(&self.gateway, PaymentInstrument::Pix);
        let outcome = self.db.settle_order(&request, &funding).await?;
        self.report(&outcome).await;
        Ok(outcome)
    }

    async fn settle_synchronously<F: FundingSource>(
        &self,
        request: &NewOrderRequest,
        funding: &F,
    ) -> Result<SettledOrder, SettlementError> {
        match self.db.settle_order(request, funding).await? {
            SettlementOutcome::Paid(settled) => {
                self.producers.publish_order_paid(OrderPaidEvent::new(settled.order.clone())).await;
                Ok(settled)
            },
            SettlementOutcome::Pending { order, .. } => Err(SettlementError::ConsistencyViolation(format!(
                "{} funding left order #{} pending",
                funding.payment_method(),
                order.id
            ))),
        }
    }

    async fn report(&self, outcome: &SettlementOutcome) {
        match outcome {
            SettlementOutcome::Paid(settled) => {
                debug!("🔄️ Order #{} paid synchronously", settled.order.id);
                self.producers.publish_order_paid(OrderPaidEvent::new(settled.order.clone())).await;
            },
            SettlementOutcome::Pending { order, charge } => {
                debug!("🔄️ Order #{} is waiting for payment {}", order.id, charge.payment_id);
            },
        }
    }

    /// Returns the order if it belongs to `user_id`. Orders of other users are reported as not found.
    pub async fn order_status(&self, order_id: i64, user_id: i64) -> Result<Order, SettlementError> {
        self.db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(SettlementError::OrderNotFound(order_id))
    }

    pub async fn order_items(&self, order_id: i64, user_id: i64) -> Result<Vec<OrderItem>, SettlementError> {
        let order = self.order_status(order_id, user_id).await?;
        self.db.fetch_order_items(order.id).await
    }

    /// True once the fridge has reported the door open for this order.
    pub async fn unlock_status(&self, order_id: i64, user_id: i64) -> Result<bool, SettlementError> {
        let order = self.order_status(order_id, user_id).await?;
        Ok(order.door_opened_at.is_some())
    }

    pub async fn confirm_door_opened(&self, order_id: i64) -> Result<Order, SettlementError> {
        let order = self.db.confirm_door_opened(order_id).await?;
        info!("🔄️ Fridge {} reported its door open for order #{order_id}", order.fridge_id);
        Ok(order)
    }

    /// Abandons gateway orders that have been pending for longer than `timeout`. Nothing was reserved for them, so no
    /// stock is restored.
    pub async fn expire_stale_orders(&self, timeout: Duration) -> Result<Vec<Order>, SettlementError> {
        let cutoff = Utc::now() - timeout;
        let abandoned = self.db.abandon_stale_orders(cutoff).await?;
        for order in &abandoned {
            self.producers.publish_order_abandoned(OrderAbandonedEvent { order: order.clone() }).await;
        }
        Ok(abandoned)
    }
}
