use sqlx::SqliteConnection;

use crate::{db_types::Ticket, traits::SettlementError};

pub async fn insert_ticket(user_id: i64, message: &str, conn: &mut SqliteConnection) -> Result<Ticket, SettlementError> {
    let ticket = sqlx::query_as(
        "INSERT INTO tickets (user_id, message) VALUES ($1, $2) RETURNING id, user_id, message, created_at",
    )
    .bind(user_id)
    .bind(message)
    .fetch_one(conn)
    .await?;
    Ok(ticket)
}

pub async fn tickets_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Ticket>, SettlementError> {
    let tickets =
        sqlx::query_as("SELECT id, user_id, message, created_at FROM tickets WHERE user_id = $1 ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(tickets)
}
