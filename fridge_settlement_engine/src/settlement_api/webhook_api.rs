//! Reconciles asynchronous payment notifications from the gateway.
//!
//! A notification only says "something happened to payment X". The payment itself is always fetched from the gateway
//! and only `approved` payments have any effect. The external reference on the payment decides what the effect is
//! (see [`PaymentReference`]). Every effect is idempotent per payment id, so duplicate or concurrent deliveries of
//! the same notification are harmless.
use std::{collections::HashMap, fmt::Debug, str::FromStr};

use log::*;
use serde_json::Value;

use crate::{
    db_types::{Brl, Order, OrderStatusType, WalletTransaction},
    events::{EventProducers, OrderPaidEvent, WalletEvent},
    helpers::{late_payment_description, PaymentReference},
    settlement_api::wallet_api::deposit_description,
    traits::{
        ApplyResult,
        GatewayPayment,
        InvoicePayment,
        PaymentGateway,
        SettlementDatabase,
        SettlementError,
        WalletManagement,
    },
};

/// The parts of a webhook call that matter: what kind of resource changed, and its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentNotification {
    pub topic: Option<String>,
    pub payment_id: Option<String>,
}

impl PaymentNotification {
    pub fn new<S: Into<String>>(topic: S, payment_id: S) -> Self {
        Self { topic: Some(topic.into()), payment_id: Some(payment_id.into()) }
    }

    /// Reads `type` (or `topic`) and `data.id` from the JSON body, falling back to the query string parameters `type`,
    /// `topic`, `data.id` and `id`. The gateway uses both conventions depending on the notification version.
    pub fn from_parts(body: Option<&Value>, query: &HashMap<String, String>) -> Self {
        let topic = body
            .and_then(|b| b.get("type").or_else(|| b.get("topic")))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| query.get("type").or_else(|| query.get("topic")).cloned());
        let payment_id = body
            .and_then(|b| b.get("data"))
            .and_then(|d| d.get("id"))
            .and_then(json_id)
            .or_else(|| query.get("data.id").or_else(|| query.get("id")).cloned());
        Self { topic, payment_id }
    }

    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some("payment")
    }
}

fn json_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do. The reason is for the logs.
    Ignored(String),
    /// The payment had already been applied.
    Duplicate,
    DepositCredited(WalletTransaction),
    InvoicesPaid(InvoicePayment),
    OrderFinalized(Order),
}

pub struct WebhookApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for WebhookApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B, G> WebhookApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> WebhookApi<B, G>
where
    B: SettlementDatabase + WalletManagement,
    G: PaymentGateway,
{
    pub async fn reconcile(&self, notification: &PaymentNotification) -> Result<ReconcileOutcome, SettlementError> {
        if !notification.is_payment() {
            return Ok(ReconcileOutcome::Ignored(format!("{:?} notifications are not handled", notification.topic)));
        }
        let Some(payment_id) = notification.payment_id.as_deref() else {
            return Ok(ReconcileOutcome::Ignored("The notification carries no payment id".into()));
        };
        let payment = self.gateway.fetch_payment(payment_id).await?;
        if !payment.is_approved() {
            return Ok(ReconcileOutcome::Ignored(format!("Payment {payment_id} is {:?}", payment.status)));
        }
        let reference = payment.external_reference.as_deref().unwrap_or_default();
        let reference = PaymentReference::from_str(reference).unwrap_or_else(|never| match never {});
        trace!("📬️ Payment {payment_id} refers to {reference:?}");
        let outcome = match reference {
            PaymentReference::WalletDeposit { user_id, .. } => {
                self.credit_deposit(user_id, payment.amount, &payment.id, deposit_description(&payment)).await?
            },
            PaymentReference::CreditInvoice { user_id, .. } => {
                match self.db.apply_invoice_payment(user_id, &payment.id).await? {
                    ApplyResult::Applied(paid) => {
                        self.producers.publish_wallet_event(WalletEvent::InvoicesPaid(paid.clone())).await;
                        ReconcileOutcome::InvoicesPaid(paid)
                    },
                    ApplyResult::Duplicate => ReconcileOutcome::Duplicate,
                }
            },
            PaymentReference::Order { order_id } => self.finalize_order(order_id, &payment).await?,
            PaymentReference::Legacy(reference) => {
                ReconcileOutcome::Ignored(format!("Payment {payment_id} has an unrecognised reference '{reference}'"))
            },
        };
        match &outcome {
            ReconcileOutcome::Ignored(reason) => info!("📬️ {reason}"),
            ReconcileOutcome::Duplicate => info!("📬️ Payment {payment_id} had already been applied"),
            _ => info!("📬️ Payment {payment_id} applied"),
        }
        Ok(outcome)
    }

    async fn credit_deposit(
        &self,
        user_id: i64,
        amount: Brl,
        payment_id: &str,
        description: &str,
    ) -> Result<ReconcileOutcome, SettlementError> {
        match self.db.credit_gateway_deposit(user_id, amount, payment_id, description).await? {
            ApplyResult::Applied(deposit) => {
                self.producers.publish_wallet_event(WalletEvent::DepositCredited(deposit.clone())).await;
                Ok(ReconcileOutcome::DepositCredited(deposit))
            },
            ApplyResult::Duplicate => Ok(ReconcileOutcome::Duplicate),
        }
    }

    /// Marks the order paid. A payment that arrives after the order was abandoned cannot buy the goods any more, so
    /// the money goes to the buyer's wallet instead, keyed by the payment id like any other deposit.
    async fn finalize_order(&self, order_id: i64, payment: &GatewayPayment) -> Result<ReconcileOutcome, SettlementError> {
        match self.db.finalize_gateway_order(order_id, &payment.id).await {
            Ok(ApplyResult::Applied(order)) => {
                if order.total_amount != payment.amount {
                    warn!(
                        "📬️ Payment {} of {} finalized order #{order_id}, which totals {}",
                        payment.id, payment.amount, order.total_amount
                    );
                }
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                Ok(ReconcileOutcome::OrderFinalized(order))
            },
            Ok(ApplyResult::Duplicate) => Ok(ReconcileOutcome::Duplicate),
            Err(SettlementError::IllegalOrderTransition { status: OrderStatusType::Abandoned, .. }) => {
                let order = self.db.fetch_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
                warn!(
                    "📬️ Payment {} of {} arrived after order #{order_id} was abandoned. Crediting user #{}'s wallet",
                    payment.id, payment.amount, order.user_id
                );
                let description = late_payment_description(order_id);
                self.credit_deposit(order.user_id, payment.amount, &payment.id, &description).await
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn notification_from_body() {
        let body = json!({"type": "payment", "data": {"id": 1234567}});
        let n = PaymentNotification::from_parts(Some(&body), &HashMap::new());
        assert!(n.is_payment());
        assert_eq!(n.payment_id.as_deref(), Some("1234567"));
    }

    #[test]
    fn notification_from_query_string() {
        let query = HashMap::from([("topic".to_string(), "payment".to_string()), ("id".to_string(), "99".to_string())]);
        let n = PaymentNotification::from_parts(None, &query);
        assert_eq!(n, PaymentNotification::new("payment", "99"));
        let body = json!({"action": "payment.updated"});
        let n = PaymentNotification::from_parts(Some(&body), &query);
        assert_eq!(n.payment_id.as_deref(), Some("99"));
    }

    #[test]
    fn other_topics_are_not_payments() {
        let body = json!({"type": "merchant_order", "data": {"id": "5"}});
        assert!(!PaymentNotification::from_parts(Some(&body), &HashMap::new()).is_payment());
    }
}
