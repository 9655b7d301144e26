use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderAbandonedEvent,
    OrderPaidEvent,
    OrderRefundedEvent,
    WalletEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The sending halves of every subscribed event channel. Cloned into each API that publishes events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_refunded_producer: Vec<EventProducer<OrderRefundedEvent>>,
    pub order_abandoned_producer: Vec<EventProducer<OrderAbandonedEvent>>,
    pub wallet_event_producer: Vec<EventProducer<WalletEvent>>,
}

impl EventProducers {
    pub async fn publish_order_paid(&self, event: OrderPaidEvent) {
        for producer in &self.order_paid_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_refunded(&self, event: OrderRefundedEvent) {
        for producer in &self.order_refunded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_abandoned(&self, event: OrderAbandonedEvent) {
        for producer in &self.order_abandoned_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_wallet_event(&self, event: WalletEvent) {
        for producer in &self.wallet_event_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_refunded: Option<EventHandler<OrderRefundedEvent>>,
    pub on_order_abandoned: Option<EventHandler<OrderAbandonedEvent>>,
    pub on_wallet_event: Option<EventHandler<WalletEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_order_refunded: hooks.on_order_refunded.map(|f| EventHandler::new(buffer_size, f)),
            on_order_abandoned: hooks.on_order_abandoned.map(|f| EventHandler::new(buffer_size, f)),
            on_wallet_event: hooks.on_wallet_event.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_refunded {
            result.order_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_abandoned {
            result.order_abandoned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_wallet_event {
            result.wallet_event_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per subscribed handler. Each runs until its producers are dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_abandoned {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_wallet_event {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_refunded: Option<Handler<OrderRefundedEvent>>,
    pub on_order_abandoned: Option<Handler<OrderAbandonedEvent>>,
    pub on_wallet_event: Option<Handler<WalletEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderPaidEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_refunded<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderRefundedEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_order_refunded = Some(Arc::new(f));
        self
    }

    pub fn on_order_abandoned<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderAbandonedEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_order_abandoned = Some(Arc::new(f));
        self
    }

    pub fn on_wallet_event<F>(&mut self, f: F) -> &mut Self
    where F: Fn(WalletEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_wallet_event = Some(Arc::new(f));
        self
    }
}
