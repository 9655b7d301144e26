use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::UnlockCommand, traits::SettlementError};

const UNLOCK_COLUMNS: &str = "id, fridge_id, order_id, created_at";

/// Appends an unlock command to the fridge's queue. The fridge polls the queue; delivery is not tracked here.
pub async fn enqueue_unlock(
    fridge_id: &str,
    order_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<UnlockCommand, SettlementError> {
    let command: UnlockCommand = sqlx::query_as(&format!(
        "INSERT INTO unlock_commands (fridge_id, order_id) VALUES ($1, $2) RETURNING {UNLOCK_COLUMNS}"
    ))
    .bind(fridge_id)
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Unlock command #{} queued for fridge {fridge_id}", command.id);
    Ok(command)
}

pub async fn unlock_commands_for_fridge(
    fridge_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<UnlockCommand>, SettlementError> {
    let commands =
        sqlx::query_as(&format!("SELECT {UNLOCK_COLUMNS} FROM unlock_commands WHERE fridge_id = $1 ORDER BY id"))
            .bind(fridge_id)
            .fetch_all(conn)
            .await?;
    Ok(commands)
}

pub async fn unlock_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UnlockCommand>, SettlementError> {
    let command = sqlx::query_as(&format!("SELECT {UNLOCK_COLUMNS} FROM unlock_commands WHERE order_id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(command)
}
