//! # SQLite backend
//!
//! The low-level functions in the submodules are plain `async fn`s that accept a `&mut SqliteConnection`. Callers
//! obtain a connection from the pool, or open a transaction and pass `&mut *tx`, without any other changes.
//!
//! SQLite has no `SELECT ... FOR UPDATE`. Every mutating transaction therefore *starts* with a write to the row it is
//! about to read-then-modify (see [`user_accounts::lock_user`]). That takes the database write lock up front, so two
//! transactions can never both read a stale balance and then race to write it.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

pub mod catalog;
pub mod inventory;
pub mod invoices;
pub mod orders;
pub mod tickets;
pub mod unlock;
pub mod user_accounts;
pub mod wallet;

mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

use crate::traits::SettlementError;

const SQLITE_DB_URL: &str = "sqlite://data/fridge_store.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("FSS_DATABASE_URL").unwrap_or_else(|_| {
        info!("FSS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SettlementError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// SQLite's `CURRENT_TIMESTAMP` format. Used when binding timestamps that are compared against stored ones.
pub(crate) fn sql_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
