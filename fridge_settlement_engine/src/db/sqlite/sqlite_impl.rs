//! `SqliteDatabase` is the SQLite implementation of the settlement engine backend.
//!
//! It implements every trait in [`crate::traits`]. Each mutating method runs in one transaction whose first statement
//! is a write (see the module docs of [`super`]), and dropping the transaction on an early `?` return rolls it back.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::{catalog, db_url, inventory, invoices, new_pool, orders, tickets, unlock, user_accounts, wallet};
use crate::{
    db::sqlite::orders::NewOrder,
    db_types::{
        Brl,
        Counterparty,
        CreditInvoice,
        InventoryEntry,
        Location,
        NewWalletTransaction,
        Order,
        OrderItem,
        OrderStatusType,
        PaymentMethod,
        Product,
        Ticket,
        TransactionStatus,
        UnlockCommand,
        UserAccount,
        WalletTransaction,
        WalletTransactionType,
    },
    helpers::{gateway_order_description, item_summary},
    pricing::price_cart,
    traits::{
        ApplyResult,
        DepositReversal,
        FundingOutcome,
        FundingRequest,
        FundingSource,
        InventoryManagement,
        InventoryUpdate,
        InvoicePayment,
        NewOrderRequest,
        Pagination,
        PendingCharge,
        PromotionUpdate,
        RefundedOrder,
        SettledOrder,
        SettlementDatabase,
        SettlementError,
        SettlementOutcome,
        TicketManagement,
        TransactionDetails,
        TransactionPage,
        TransferResult,
        WalletManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `FSS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SettlementError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded migrations. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SettlementError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SettlementError::DatabaseError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Issues an open credit invoice for the user.
    pub async fn create_invoice(&self, user_id: i64, amount: Brl) -> Result<CreditInvoice, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        invoices::insert_invoice(user_id, amount, None, &mut conn).await
    }

    /// Marks a pending order paid and applies its effects: the matching ledger row, the stock decrement and the unlock
    /// command. When `captured` is true the money has already moved, so the stock is decremented unconditionally.
    ///
    /// Returns [`ApplyResult::Duplicate`] if a ledger row of the same type already carries `gateway_ref`.
    async fn complete_paid_order(
        order: &Order,
        items: Vec<OrderItem>,
        gateway_ref: Option<&str>,
        captured: bool,
        conn: &mut SqliteConnection,
    ) -> Result<ApplyResult<SettledOrder>, SettlementError> {
        let paid = orders::transition_status(order.id, OrderStatusType::Pending, OrderStatusType::Paid, gateway_ref, conn)
            .await?
            .ok_or_else(|| SettlementError::IllegalOrderTransition {
                order_id: order.id,
                status: order.status,
                message: "Only pending orders can be paid".into(),
            })?;
        let ledger_type = paid.payment_method.ledger_type();
        let description = if paid.payment_method.is_gateway() {
            paid.description.clone()
        } else {
            format!("Compra {}", item_summary(items.iter().map(|i| (i.quantity, i.product_name.as_str()))))
        };
        let mut entry =
            NewWalletTransaction::new(paid.user_id, ledger_type, paid.total_amount, description).with_order(paid.id);
        if let Some(gateway_ref) = gateway_ref {
            entry = entry.with_gateway_id(gateway_ref);
        }
        let ledger_entry = match wallet::idempotent_insert(entry, conn).await? {
            ApplyResult::Applied(row) => row,
            ApplyResult::Duplicate => return Ok(ApplyResult::Duplicate),
        };
        for item in &items {
            if captured {
                inventory::force_decrement(paid.location_id, item.product_id, item.quantity, conn).await?;
            } else {
                inventory::decrement(paid.location_id, item.product_id, item.quantity, conn).await?;
            }
        }
        let unlock = unlock::enqueue_unlock(&paid.fridge_id, Some(paid.id), conn).await?;
        Ok(ApplyResult::Applied(SettledOrder { order: paid, items, ledger_entry, unlock }))
    }

    /// Locks the buyer, prices the cart against the catalog and inserts the order as `pending`. Fails without writing
    /// anything if the location cannot take orders or any line is out of stock.
    async fn open_order(
        request: &NewOrderRequest,
        method: PaymentMethod,
        conn: &mut SqliteConnection,
    ) -> Result<OpenedOrder, SettlementError> {
        let user = user_accounts::lock_user(request.user_id, conn).await?;
        let location = catalog::fetch_location(request.location_id, conn)
            .await?
            .ok_or(SettlementError::LocationNotFound(request.location_id))?;
        let fridge_id = location.fridge_id.as_deref().ok_or_else(|| {
            SettlementError::ValidationError(format!("{} has no fridge and cannot take orders", location.name))
        })?;
        let products = catalog::fetch_products(&request.product_ids(), conn).await?;
        let cart = price_cart(&products, &request.items, Utc::now())?;
        for line in &cart.lines {
            inventory::ensure_available(location.id, line.product_id, line.quantity, conn).await?;
        }
        let description = gateway_order_description(&location.name, &cart.summary());
        let new_order = NewOrder {
            user_id: user.id,
            location_id: location.id,
            fridge_id,
            total_amount: cart.total,
            payment_method: method,
            description: &description,
        };
        let (order, items) = orders::insert_order(new_order, &cart.lines, conn).await?;
        Ok(OpenedOrder { user, order, items })
    }

    /// [`Self::complete_paid_order`] for an order created in the same settlement, where a duplicate can only mean the
    /// gateway reused a payment id.
    async fn complete_new_order(
        order: &Order,
        items: Vec<OrderItem>,
        gateway_ref: Option<&str>,
        captured: bool,
        conn: &mut SqliteConnection,
    ) -> Result<SettledOrder, SettlementError> {
        match Self::complete_paid_order(order, items, gateway_ref, captured, conn).await? {
            ApplyResult::Applied(settled) => Ok(settled),
            ApplyResult::Duplicate => Err(SettlementError::ConsistencyViolation(format!(
                "Gateway payment {gateway_ref:?} is already attached to another order"
            ))),
        }
    }

    /// Settles through a remote funding source in three steps, none of which holds the write lock during the call:
    ///
    /// 1. a short transaction checks the cart and inserts the order as `pending`;
    /// 2. the funding source is called with no transaction open;
    /// 3. a second short transaction records the outcome. An approved payment completes the order. A declined or
    ///    failed one deletes it again, so the attempt leaves nothing behind.
    async fn settle_remotely<F: FundingSource>(
        &self,
        request: &NewOrderRequest,
        funding: &F,
    ) -> Result<SettlementOutcome, SettlementError> {
        let method = funding.payment_method();
        let mut tx = self.pool.begin().await?;
        let OpenedOrder { user, order, items } = Self::open_order(request, method, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Order #{} opened. Waiting for the {method} payment", order.id);
        let funding_request = FundingRequest {
            user: &user,
            order_id: order.id,
            amount: order.total_amount,
            description: &order.description,
        };
        let outcome = {
            let mut conn = self.pool.acquire().await?;
            funding.authorize_and_debit(&mut *conn, &funding_request).await
        };
        let mut tx = self.pool.begin().await?;
        match outcome {
            Err(e) => {
                orders::delete_unpaid_order(order.id, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order #{} discarded. The {method} payment could not be created: {e}", order.id);
                Err(e)
            },
            Ok(FundingOutcome::Declined { detail }) => {
                orders::delete_unpaid_order(order.id, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order #{} discarded. The {method} payment was declined: {detail}", order.id);
                Err(SettlementError::GatewayDeclined(detail))
            },
            Ok(FundingOutcome::Pending { gateway_ref, qr_code, qr_code_base64 }) => {
                let order = orders::set_gateway_ref(order.id, &gateway_ref, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order #{} is awaiting confirmation of {method} payment {gateway_ref}", order.id);
                let charge = PendingCharge { payment_id: gateway_ref, amount: order.total_amount, qr_code, qr_code_base64 };
                Ok(SettlementOutcome::Pending { order, charge })
            },
            Ok(FundingOutcome::Approved { gateway_ref }) => {
                let payment_id = gateway_ref.ok_or_else(|| {
                    SettlementError::ConsistencyViolation(format!("The {method} payment was approved without an id"))
                })?;
                let current = orders::lock_order(order.id, &mut tx).await?;
                let settled = match current.status {
                    // The payment is captured, so stock that ran out during the call cannot refuse the sale any more.
                    OrderStatusType::Pending => {
                        Self::complete_new_order(&current, items, Some(&payment_id), true, &mut tx).await?
                    },
                    OrderStatusType::Paid if current.payment_gateway_id.as_deref() == Some(payment_id.as_str()) => {
                        debug!("🗃️ Order #{} was finalized by a notification for {payment_id} first", order.id);
                        Self::fetch_settled_order(current, &payment_id, &mut tx).await?
                    },
                    status => {
                        return Err(SettlementError::IllegalOrderTransition {
                            order_id: order.id,
                            status,
                            message: format!("Approved payment {payment_id} arrived after the order changed"),
                        })
                    },
                };
                tx.commit().await?;
                info!("🗃️ Order #{} paid by {method} for {}", settled.order.id, settled.order.total_amount);
                Ok(SettlementOutcome::Paid(settled))
            },
        }
    }

    /// Rebuilds the settlement record of an order that has already been paid by `payment_id`.
    async fn fetch_settled_order(
        order: Order,
        payment_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<SettledOrder, SettlementError> {
        let items = orders::fetch_order_items(order.id, conn).await?;
        let ledger_entry = wallet::fetch_by_gateway_id(payment_id, order.payment_method.ledger_type(), conn)
            .await?
            .ok_or_else(|| SettlementError::ConsistencyViolation(format!("Paid order #{} has no ledger row", order.id)))?;
        let unlock = unlock::unlock_for_order(order.id, conn).await?.ok_or_else(|| {
            SettlementError::ConsistencyViolation(format!("Paid order #{} has no unlock command", order.id))
        })?;
        Ok(SettledOrder { order, items, ledger_entry, unlock })
    }
}

struct OpenedOrder {
    user: UserAccount,
    order: Order,
    items: Vec<OrderItem>,
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn settle_order<F: FundingSource>(
        &self,
        request: &NewOrderRequest,
        funding: &F,
    ) -> Result<SettlementOutcome, SettlementError> {
        if funding.is_remote() {
            return self.settle_remotely(request, funding).await;
        }
        let method = funding.payment_method();
        let mut tx = self.pool.begin().await?;
        let OpenedOrder { user, order, items } = Self::open_order(request, method, &mut tx).await?;
        let funding_request = FundingRequest {
            user: &user,
            order_id: order.id,
            amount: order.total_amount,
            description: &order.description,
        };
        match funding.authorize_and_debit(&mut *tx, &funding_request).await? {
            FundingOutcome::Approved { gateway_ref } => {
                let settled = Self::complete_new_order(&order, items, gateway_ref.as_deref(), false, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order #{} paid by {method} for {}", settled.order.id, settled.order.total_amount);
                Ok(SettlementOutcome::Paid(settled))
            },
            FundingOutcome::Declined { detail } => {
                tx.rollback().await?;
                info!("🗃️ Order for user #{} rolled back. The {method} payment was declined: {detail}", user.id);
                Err(SettlementError::GatewayDeclined(detail))
            },
            FundingOutcome::Pending { gateway_ref, .. } => Err(SettlementError::ConsistencyViolation(format!(
                "{method} funding cannot leave payment {gateway_ref} pending"
            ))),
        }
    }

    async fn finalize_gateway_order(
        &self,
        order_id: i64,
        payment_id: &str,
    ) -> Result<ApplyResult<Order>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?;
        match order.status {
            OrderStatusType::Pending => {},
            OrderStatusType::Paid if order.payment_gateway_id.as_deref() == Some(payment_id) => {
                debug!("🗃️ Order #{order_id} was already finalized with payment {payment_id}");
                return Ok(ApplyResult::Duplicate);
            },
            status => {
                return Err(SettlementError::IllegalOrderTransition {
                    order_id,
                    status,
                    message: format!("Payment {payment_id} cannot be applied to it"),
                })
            },
        }
        if !order.payment_method.is_gateway() {
            return Err(SettlementError::InvalidState(format!(
                "Order #{order_id} was paid by {} and cannot be finalized by the gateway",
                order.payment_method
            )));
        }
        if let Some(expected) = order.payment_gateway_id.as_deref().filter(|p| *p != payment_id) {
            warn!("🗃️ Order #{order_id} was created with payment {expected} but is being finalized with {payment_id}");
        }
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        match Self::complete_paid_order(&order, items, Some(payment_id), true, &mut tx).await? {
            ApplyResult::Applied(settled) => {
                tx.commit().await?;
                info!("🗃️ Order #{order_id} finalized with payment {payment_id}");
                Ok(ApplyResult::Applied(settled.order))
            },
            ApplyResult::Duplicate => Ok(ApplyResult::Duplicate),
        }
    }

    async fn abandon_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let abandoned = orders::abandon_pending_before(cutoff, &mut tx).await?;
        tx.commit().await?;
        if !abandoned.is_empty() {
            info!("🗃️ {} stale pending orders were abandoned", abandoned.len());
        }
        Ok(abandoned)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn confirm_door_opened(&self, order_id: i64) -> Result<Order, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::mark_door_opened(order_id, &mut conn).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        debug!("🗃️ Door opened for order #{order_id}");
        Ok(order)
    }

    async fn refund_order(&self, order_id: i64) -> Result<RefundedOrder, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?;
        if order.status != OrderStatusType::Paid {
            return Err(SettlementError::IllegalOrderTransition {
                order_id,
                status: order.status,
                message: "Only paid orders can be refunded".into(),
            });
        }
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in &items {
            inventory::increment(order.location_id, item.product_id, item.quantity, &mut tx).await?;
        }
        let order =
            orders::transition_status(order_id, OrderStatusType::Paid, OrderStatusType::Refunded, None, &mut tx)
                .await?
                .ok_or_else(|| SettlementError::InvalidState(format!("Order #{order_id} changed during the refund")))?;
        user_accounts::lock_user(order.user_id, &mut tx).await?;
        let new_balance = user_accounts::adjust_wallet_balance(order.user_id, order.total_amount, &mut tx).await?;
        let summary = item_summary(items.iter().map(|i| (i.quantity, i.product_name.as_str())));
        let entry = NewWalletTransaction::new(
            order.user_id,
            WalletTransactionType::Deposit,
            order.total_amount,
            format!("Reembolso ({summary})"),
        )
        .with_order(order_id);
        let refund_entry = wallet::insert_transaction(entry, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order #{order_id} refunded. {} credited to user #{}", order.total_amount, order.user_id);
        Ok(RefundedOrder { order, items, refund_entry, new_balance })
    }

    async fn refund_deposit(&self, transaction_id: i64) -> Result<DepositReversal, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let original = wallet::lock_transaction(transaction_id, &mut tx).await?;
        if original.tx_type != WalletTransactionType::Deposit {
            return Err(SettlementError::InvalidState(format!(
                "Transaction #{transaction_id} is a {} and only deposits can be reversed",
                original.tx_type
            )));
        }
        if original.status == TransactionStatus::Reversed || !original.amount.is_positive() {
            return Err(SettlementError::InvalidState(format!("Deposit #{transaction_id} has already been reversed")));
        }
        let user = user_accounts::lock_user(original.user_id, &mut tx).await?;
        let debited = user.wallet_balance.max(Brl::default()).min(original.amount);
        let transaction = wallet::mark_reversed(transaction_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::InvalidState(format!("Deposit #{transaction_id} changed during reversal")))?;
        let new_balance = if debited.is_positive() {
            user_accounts::adjust_wallet_balance(user.id, -debited, &mut tx).await?
        } else {
            user.wallet_balance
        };
        tx.commit().await?;
        info!(
            "🗃️ Deposit #{transaction_id} of {} reversed. {debited} debited from user #{}",
            original.amount, user.id
        );
        Ok(DepositReversal { transaction, original_amount: original.amount, debited, new_balance })
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_user(user_id, &mut conn).await
    }

    async fn fetch_transactions(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_user(user_id, &mut conn).await?.ok_or(SettlementError::UserNotFound(user_id))?;
        let (transactions, total) = wallet::transactions_for_user(user_id, page, &mut conn).await?;
        Ok(TransactionPage { transactions, page: page.page, limit: page.limit, total })
    }

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<WalletTransaction>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        wallet::fetch_transaction(transaction_id, &mut conn).await
    }

    async fn fetch_transaction_details(
        &self,
        transaction_id: i64,
    ) -> Result<Option<TransactionDetails>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let Some(transaction) = wallet::fetch_transaction(transaction_id, &mut conn).await? else {
            return Ok(None);
        };
        let items = match transaction.related_order_id {
            Some(order_id) if transaction.tx_type.is_purchase() => orders::fetch_order_items(order_id, &mut conn).await?,
            _ => Vec::new(),
        };
        let counterparty = match transaction.counterparty_id {
            Some(user_id) if transaction.tx_type.is_transfer() => {
                user_accounts::fetch_counterparty(user_id, &mut conn).await?
            },
            _ => None,
        };
        Ok(Some(TransactionDetails { transaction, items, counterparty }))
    }

    async fn fetch_deposit_by_payment(&self, payment_id: &str) -> Result<Option<WalletTransaction>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        wallet::fetch_by_gateway_id(payment_id, WalletTransactionType::Deposit, &mut conn).await
    }

    async fn find_recipient(&self, email: &str) -> Result<Option<(i64, Counterparty)>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_counterparty_by_email(email, &mut conn).await
    }

    async fn credit_gateway_deposit(
        &self,
        user_id: i64,
        amount: Brl,
        payment_id: &str,
        description: &str,
    ) -> Result<ApplyResult<WalletTransaction>, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::ValidationError(format!("Cannot deposit {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        user_accounts::lock_user(user_id, &mut tx).await?;
        if wallet::fetch_by_gateway_id(payment_id, WalletTransactionType::Deposit, &mut tx).await?.is_some() {
            debug!("🗃️ Deposit for payment {payment_id} has already been credited");
            return Ok(ApplyResult::Duplicate);
        }
        let entry = NewWalletTransaction::new(user_id, WalletTransactionType::Deposit, amount, description)
            .with_gateway_id(payment_id);
        let row = match wallet::idempotent_insert(entry, &mut tx).await? {
            ApplyResult::Applied(row) => row,
            ApplyResult::Duplicate => return Ok(ApplyResult::Duplicate),
        };
        let balance = user_accounts::adjust_wallet_balance(user_id, amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Deposit of {amount} (payment {payment_id}) credited to user #{user_id}. Balance: {balance}");
        Ok(ApplyResult::Applied(row))
    }

    async fn transfer(
        &self,
        sender_id: i64,
        recipient_email: &str,
        amount: Brl,
    ) -> Result<TransferResult, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::ValidationError("The transfer amount must be positive".into()));
        }
        let mut tx = self.pool.begin().await?;
        // The first lock takes SQLite's database-wide write lock, so the order of the two row locks cannot deadlock.
        let sender = user_accounts::lock_user(sender_id, &mut tx).await?;
        let recipient = user_accounts::lock_user_by_email(recipient_email, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::RecipientNotFound(recipient_email.to_string()))?;
        if recipient.id == sender.id {
            return Err(SettlementError::ValidationError("You cannot transfer money to yourself".into()));
        }
        if sender.wallet_balance < amount {
            return Err(SettlementError::InsufficientFunds { available: sender.wallet_balance, required: amount });
        }
        let sender_balance = user_accounts::adjust_wallet_balance(sender.id, -amount, &mut tx).await?;
        user_accounts::adjust_wallet_balance(recipient.id, amount, &mut tx).await?;
        let outgoing = NewWalletTransaction::new(
            sender.id,
            WalletTransactionType::TransferOut,
            amount,
            format!("Transferência enviada para {}", recipient.name),
        )
        .with_counterparty(recipient.id);
        let outgoing = wallet::insert_transaction(outgoing, &mut tx).await?;
        let incoming = NewWalletTransaction::new(
            recipient.id,
            WalletTransactionType::TransferIn,
            amount,
            format!("Transferência recebida de {}", sender.name),
        )
        .with_counterparty(sender.id);
        let incoming = wallet::insert_transaction(incoming, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ {amount} transferred from user #{} to user #{}", sender.id, recipient.id);
        Ok(TransferResult { outgoing, incoming, sender_balance })
    }

    async fn adjust_balance(
        &self,
        user_id: i64,
        amount: Brl,
        reason: &str,
    ) -> Result<WalletTransaction, SettlementError> {
        if amount.is_zero() {
            return Err(SettlementError::ValidationError("The adjustment amount cannot be zero".into()));
        }
        let reason = match reason.trim() {
            "" if amount.is_positive() => "Adicionado pelo administrador",
            "" => "Removido pelo administrador",
            r => r,
        };
        let mut tx = self.pool.begin().await?;
        user_accounts::lock_user(user_id, &mut tx).await?;
        let balance = user_accounts::adjust_wallet_balance(user_id, amount, &mut tx).await?;
        let entry = if amount.is_positive() {
            NewWalletTransaction::new(
                user_id,
                WalletTransactionType::Deposit,
                amount,
                format!("Crédito administrativo: {reason}"),
            )
        } else {
            NewWalletTransaction::new(
                user_id,
                WalletTransactionType::TransferOut,
                amount.abs(),
                format!("Débito administrativo: {reason}"),
            )
        };
        let row = wallet::insert_transaction(entry, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Balance of user #{user_id} adjusted by {amount}. New balance: {balance}");
        Ok(row)
    }

    async fn fetch_outstanding_invoices(&self, user_id: i64) -> Result<Vec<CreditInvoice>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        invoices::outstanding_invoices(user_id, &mut conn).await
    }

    async fn apply_invoice_payment(
        &self,
        user_id: i64,
        payment_id: &str,
    ) -> Result<ApplyResult<InvoicePayment>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        user_accounts::lock_user(user_id, &mut tx).await?;
        if invoices::is_payment_applied(payment_id, &mut tx).await? {
            debug!("🗃️ Invoice payment {payment_id} has already been applied");
            return Ok(ApplyResult::Duplicate);
        }
        let paid = invoices::mark_outstanding_paid(user_id, payment_id, &mut tx).await?;
        if paid.is_empty() {
            // Without a paid invoice there is no durable record of this payment, so leave the credit line alone.
            warn!("🗃️ Invoice payment {payment_id} arrived for user #{user_id}, who has no outstanding invoices");
        } else {
            user_accounts::reset_credit_used(user_id, &mut tx).await?;
        }
        tx.commit().await?;
        let amount = paid.iter().map(|i| i.amount).sum();
        info!("🗃️ {} invoices of user #{user_id} settled by payment {payment_id}", paid.len());
        Ok(ApplyResult::Applied(InvoicePayment { user_id, payment_id: payment_id.to_string(), invoices: paid, amount }))
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_location(&self, location_id: i64) -> Result<Option<Location>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_location(location_id, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_product(product_id, &mut conn).await
    }

    async fn fetch_inventory(&self, location_id: i64) -> Result<Vec<InventoryEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_inventory(location_id, &mut conn).await
    }

    async fn bulk_upsert_inventory(
        &self,
        location_id: i64,
        items: &[InventoryUpdate],
    ) -> Result<Vec<InventoryEntry>, SettlementError> {
        if let Some(bad) = items.iter().find(|i| i.quantity < 0) {
            return Err(SettlementError::ValidationError(format!(
                "Product {} has a negative quantity of {}",
                bad.product_id, bad.quantity
            )));
        }
        let mut tx = self.pool.begin().await?;
        catalog::lock_location(location_id, &mut tx).await?.ok_or(SettlementError::LocationNotFound(location_id))?;
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            catalog::fetch_product(item.product_id, &mut tx)
                .await?
                .ok_or(SettlementError::ProductNotFound(item.product_id))?;
            entries.push(inventory::upsert(location_id, item, &mut tx).await?);
        }
        tx.commit().await?;
        info!("🗃️ Stocktake of {} items recorded for location #{location_id}", entries.len());
        Ok(entries)
    }

    async fn enqueue_remote_unlock(&self, fridge_id: &str) -> Result<UnlockCommand, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_location_by_fridge(fridge_id, &mut conn)
            .await?
            .ok_or_else(|| SettlementError::FridgeNotFound(fridge_id.to_string()))?;
        unlock::enqueue_unlock(fridge_id, None, &mut conn).await
    }

    async fn fetch_unlock_commands(&self, fridge_id: &str) -> Result<Vec<UnlockCommand>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        unlock::unlock_commands_for_fridge(fridge_id, &mut conn).await
    }

    async fn set_promotion(&self, product_id: i64, promotion: &PromotionUpdate) -> Result<Product, SettlementError> {
        promotion.validate()?;
        let mut conn = self.pool.acquire().await?;
        catalog::set_promotion(product_id, promotion, &mut conn).await?.ok_or(SettlementError::ProductNotFound(product_id))
    }

    async fn register_restock(&self, product_id: i64, purchase_price: Brl) -> Result<Product, SettlementError> {
        if purchase_price.is_negative() {
            return Err(SettlementError::ValidationError(format!("{purchase_price} is not a valid purchase price")));
        }
        let mut conn = self.pool.acquire().await?;
        let product = catalog::set_purchase_price(product_id, purchase_price, &mut conn)
            .await?
            .ok_or(SettlementError::ProductNotFound(product_id))?;
        info!("🗃️ Purchase price of {} set to {purchase_price}", product.name);
        Ok(product)
    }
}

impl TicketManagement for SqliteDatabase {
    async fn create_system_ticket(&self, user_id: i64, message: &str) -> Result<Ticket, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        tickets::insert_ticket(user_id, message, &mut conn).await
    }

    async fn fetch_tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        tickets::tickets_for_user(user_id, &mut conn).await
    }
}
