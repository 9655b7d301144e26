use crate::{db_types::Ticket, traits::SettlementError};

/// System messages for users. Writes are best effort and never part of a financial transaction.
#[allow(async_fn_in_trait)]
pub trait TicketManagement {
    async fn create_system_ticket(&self, user_id: i64, message: &str) -> Result<Ticket, SettlementError>;

    async fn fetch_tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, SettlementError>;
}
