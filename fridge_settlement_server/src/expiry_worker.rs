use chrono::Duration;
use fridge_settlement_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::mercado_pago::MercadoPagoGateway;

/// Starts the expiry worker, which abandons card and PIX orders that are still pending after `timeout`.
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    gateway: MercadoPagoGateway,
    producers: EventProducers,
    timeout: Duration,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = OrderFlowApi::new(db, gateway, producers);
        info!("🕰️ Pending order expiry worker started. Orders expire after {} minutes", timeout.num_minutes());
        loop {
            timer.tick().await;
            debug!("🕰️ Running pending order expiry job");
            match api.expire_stale_orders(timeout).await {
                Ok(orders) if orders.is_empty() => trace!("🕰️ No stale orders"),
                Ok(orders) => info!("🕰️ {} orders abandoned: {}", orders.len(), order_list(&orders)),
                Err(e) => error!("🕰️ Error running pending order expiry job: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] user: {} total: {}", o.id, o.user_id, o.total_amount))
        .collect::<Vec<String>>()
        .join(", ")
}
