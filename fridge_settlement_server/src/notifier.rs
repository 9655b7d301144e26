//! Turns settlement events into system tickets, which the customer app shows in the user's inbox.
//!
//! Ticket writes are best effort. A failure is logged and otherwise ignored, since the change that triggered the event
//! has already been committed.
use fridge_settlement_engine::{
    events::{EventHooks, UserNotice},
    traits::TicketManagement,
    SqliteDatabase,
};
use log::*;

pub fn ticket_hooks(db: SqliteDatabase) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_db = db.clone();
    let refunded_db = db.clone();
    let abandoned_db = db.clone();
    hooks
        .on_order_paid(move |ev| {
            let db = paid_db.clone();
            Box::pin(async move {
                let notice = UserNotice {
                    user_id: ev.order.user_id,
                    message: format!(
                        "Pagamento do pedido #{} confirmado ({}). Pode abrir a porta do {}.",
                        ev.order.id, ev.order.total_amount, ev.order.fridge_id
                    ),
                };
                write_ticket(&db, notice).await
            })
        })
        .on_order_refunded(move |ev| {
            let db = refunded_db.clone();
            Box::pin(async move { write_ticket(&db, ev.notice()).await })
        })
        .on_order_abandoned(move |ev| {
            let db = abandoned_db.clone();
            Box::pin(async move { write_ticket(&db, ev.notice()).await })
        })
        .on_wallet_event(move |ev| {
            let db = db.clone();
            Box::pin(async move { write_ticket(&db, ev.notice()).await })
        });
    hooks
}

async fn write_ticket(db: &SqliteDatabase, notice: UserNotice) {
    match db.create_system_ticket(notice.user_id, &notice.message).await {
        Ok(ticket) => debug!("📬️ Ticket #{} created for user #{}", ticket.id, notice.user_id),
        Err(e) => {
            warn!("📬️ Could not create a ticket for user #{}. {e}. The message was: {}", notice.user_id, notice.message)
        },
    }
}
