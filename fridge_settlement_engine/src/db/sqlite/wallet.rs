use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWalletTransaction, WalletTransaction, WalletTransactionType},
    helpers::{cap_description, REVERSED_MARKER},
    traits::{ApplyResult, Pagination, SettlementError},
};

const TX_COLUMNS: &str =
    "id, user_id, type, amount, description, related_order_id, payment_gateway_id, counterparty_id, status, created_at";

/// Appends a ledger row. The description is capped to the storable length.
pub async fn insert_transaction(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, SettlementError> {
    let row = insert(&tx, conn).await?;
    Ok(row)
}

/// Appends a ledger row carrying a gateway payment id. If a row of the same type already carries that payment id, the
/// unique index rejects the insert and [`ApplyResult::Duplicate`] is returned.
///
/// On SQLite a constraint violation only aborts the statement, so the enclosing transaction stays usable.
pub async fn idempotent_insert(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<ApplyResult<WalletTransaction>, SettlementError> {
    match insert(&tx, conn).await {
        Ok(row) => Ok(ApplyResult::Applied(row)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ A {} row for payment {:?} already exists", tx.tx_type, tx.payment_gateway_id);
            Ok(ApplyResult::Duplicate)
        },
        Err(e) => Err(e.into()),
    }
}

async fn insert(tx: &NewWalletTransaction, conn: &mut SqliteConnection) -> Result<WalletTransaction, sqlx::Error> {
    let row: WalletTransaction = sqlx::query_as(&format!(
        "INSERT INTO wallet_transactions (user_id, type, amount, description, related_order_id, payment_gateway_id, \
         counterparty_id) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TX_COLUMNS}"
    ))
    .bind(tx.user_id)
    .bind(tx.tx_type)
    .bind(tx.amount)
    .bind(cap_description(&tx.description))
    .bind(tx.related_order_id)
    .bind(tx.payment_gateway_id.as_deref())
    .bind(tx.counterparty_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Ledger row #{} ({}) of {} appended for user #{}", row.id, row.tx_type, row.amount, row.user_id);
    Ok(row)
}

pub async fn fetch_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, SettlementError> {
    let row = sqlx::query_as(&format!("SELECT {TX_COLUMNS} FROM wallet_transactions WHERE id = $1"))
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Takes the write lock on a ledger row and returns it as it stands under the lock.
pub async fn lock_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, SettlementError> {
    let row = sqlx::query_as(&format!(
        "UPDATE wallet_transactions SET status = status WHERE id = $1 RETURNING {TX_COLUMNS}"
    ))
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?
    .ok_or(SettlementError::TransactionNotFound(transaction_id))?;
    Ok(row)
}

/// The ledger row of the given type carrying `payment_id`, if there is one.
pub async fn fetch_by_gateway_id(
    payment_id: &str,
    tx_type: WalletTransactionType,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, SettlementError> {
    let row = sqlx::query_as(&format!(
        "SELECT {TX_COLUMNS} FROM wallet_transactions WHERE payment_gateway_id = $1 AND type = $2"
    ))
    .bind(payment_id)
    .bind(tx_type)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// One page of a user's history, newest first, together with the total number of rows.
pub async fn transactions_for_user(
    user_id: i64,
    page: Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<WalletTransaction>, i64), SettlementError> {
    let rows = sqlx::query_as(&format!(
        "SELECT {TX_COLUMNS} FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 \
         OFFSET $3"
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallet_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok((rows, total))
}

/// Zeroes an active deposit, marks it reversed and prefixes its description. Returns `None` if the row is not an
/// active deposit.
pub async fn mark_reversed(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, SettlementError> {
    let row = sqlx::query_as(&format!(
        "UPDATE wallet_transactions SET amount = 0, status = 'reversed', description = $1 || description WHERE id = \
         $2 AND type = 'deposit' AND status = 'active' RETURNING {TX_COLUMNS}"
    ))
    .bind(REVERSED_MARKER)
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
