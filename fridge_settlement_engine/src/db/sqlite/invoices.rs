use sqlx::SqliteConnection;

use crate::{
    db_types::{Brl, CreditInvoice},
    traits::SettlementError,
};

const INVOICE_COLUMNS: &str = "id, user_id, amount, status, due_date, paid_at, related_payment_ref";

/// The sum of the user's `open` and `late` invoices.
pub async fn outstanding_total(user_id: i64, conn: &mut SqliteConnection) -> Result<Brl, SettlementError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM credit_invoices WHERE user_id = $1 AND status IN ('open', 'late')",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(Brl::from(total))
}

pub async fn outstanding_invoices(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CreditInvoice>, SettlementError> {
    let invoices = sqlx::query_as(&format!(
        "SELECT {INVOICE_COLUMNS} FROM credit_invoices WHERE user_id = $1 AND status IN ('open', 'late') ORDER BY \
         due_date, id"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(invoices)
}

/// True if some invoice has already been settled with `payment_ref`.
pub async fn is_payment_applied(payment_ref: &str, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credit_invoices WHERE related_payment_ref = $1")
        .bind(payment_ref)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Marks every outstanding invoice of the user as paid with `payment_ref` and returns them.
pub async fn mark_outstanding_paid(
    user_id: i64,
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<CreditInvoice>, SettlementError> {
    let invoices = sqlx::query_as(&format!(
        "UPDATE credit_invoices SET status = 'paid', paid_at = CURRENT_TIMESTAMP, related_payment_ref = $1 WHERE \
         user_id = $2 AND status IN ('open', 'late') RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(payment_ref)
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(invoices)
}

/// Issues a new open invoice. Billing cycles are managed elsewhere; this is used by administrative tooling and tests.
pub async fn insert_invoice(
    user_id: i64,
    amount: Brl,
    due_date: Option<chrono::NaiveDate>,
    conn: &mut SqliteConnection,
) -> Result<CreditInvoice, SettlementError> {
    let invoice = sqlx::query_as(&format!(
        "INSERT INTO credit_invoices (user_id, amount, due_date) VALUES ($1, $2, $3) RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(amount)
    .bind(due_date)
    .fetch_one(conn)
    .await?;
    Ok(invoice)
}
