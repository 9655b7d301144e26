use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::invoices,
    db_types::{Brl, Counterparty, UserAccount},
    traits::{AccountLedger, SettlementError},
};

const USER_COLUMNS: &str = "id, name, email, cpf, location_id, wallet_balance, credit_limit, credit_used";

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, SettlementError> {
    let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

/// Takes the write lock on the user's row by touching it, and returns the row as it stands under the lock.
pub async fn lock_user(user_id: i64, conn: &mut SqliteConnection) -> Result<UserAccount, SettlementError> {
    let user = sqlx::query_as(&format!(
        "UPDATE users SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(SettlementError::UserNotFound(user_id))?;
    trace!("🗃️ Locked account of user #{user_id}");
    Ok(user)
}

/// As [`lock_user`], but looks the user up by email address. Returns `None` if there is no such user.
pub async fn lock_user_by_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SettlementError> {
    let user = sqlx::query_as(&format!(
        "UPDATE users SET updated_at = CURRENT_TIMESTAMP WHERE lower(email) = lower($1) RETURNING {USER_COLUMNS}"
    ))
    .bind(email.trim())
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

const COUNTERPARTY_QUERY: &str =
    "SELECT users.name, users.email, locations.name AS location_name FROM users LEFT JOIN locations ON locations.id = \
     users.location_id";

pub async fn fetch_counterparty(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Counterparty>, SettlementError> {
    let party = sqlx::query_as(&format!("{COUNTERPARTY_QUERY} WHERE users.id = $1"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(party)
}

/// Email matching ignores case and surrounding whitespace, as transfers do.
pub async fn fetch_counterparty_by_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<(i64, Counterparty)>, SettlementError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE lower(email) = lower($1)")
        .bind(email.trim())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some((id,)) => Ok(fetch_counterparty(id, conn).await?.map(|party| (id, party))),
        None => Ok(None),
    }
}

pub async fn adjust_wallet_balance(
    user_id: i64,
    delta: Brl,
    conn: &mut SqliteConnection,
) -> Result<Brl, SettlementError> {
    let balance: Option<Brl> = sqlx::query_scalar(
        "UPDATE users SET wallet_balance = wallet_balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING wallet_balance",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    let balance = balance.ok_or(SettlementError::UserNotFound(user_id))?;
    debug!("🗃️ Wallet of user #{user_id} adjusted by {delta}. Balance is now {balance}");
    Ok(balance)
}

pub async fn adjust_credit_used(user_id: i64, delta: Brl, conn: &mut SqliteConnection) -> Result<Brl, SettlementError> {
    let used: Option<Brl> = sqlx::query_scalar(
        "UPDATE users SET credit_used = credit_used + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING \
         credit_used",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    let used = used.ok_or(SettlementError::UserNotFound(user_id))?;
    debug!("🗃️ Credit used by user #{user_id} adjusted by {delta}. Now {used}");
    Ok(used)
}

pub async fn reset_credit_used(user_id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let result = sqlx::query("UPDATE users SET credit_used = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SettlementError::UserNotFound(user_id));
    }
    Ok(())
}

/// A connection (usually a transaction) is the ledger that funding sources debit.
impl AccountLedger for SqliteConnection {
    async fn lock_user(&mut self, user_id: i64) -> Result<UserAccount, SettlementError> {
        lock_user(user_id, self).await
    }

    async fn adjust_wallet_balance(&mut self, user_id: i64, delta: Brl) -> Result<Brl, SettlementError> {
        adjust_wallet_balance(user_id, delta, self).await
    }

    async fn adjust_credit_used(&mut self, user_id: i64, delta: Brl) -> Result<Brl, SettlementError> {
        adjust_credit_used(user_id, delta, self).await
    }

    async fn outstanding_invoice_total(&mut self, user_id: i64) -> Result<Brl, SettlementError> {
        invoices::outstanding_total(user_id, self).await
    }
}
