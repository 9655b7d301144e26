use crate::{
    db_types::{Brl, Counterparty, CreditInvoice, UserAccount, WalletTransaction},
    traits::{
        ApplyResult,
        InvoicePayment,
        Pagination,
        SettlementError,
        TransactionDetails,
        TransactionPage,
        TransferResult,
    },
};

#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, SettlementError>;

    async fn fetch_transactions(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, SettlementError>;

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<WalletTransaction>, SettlementError>;

    /// The ledger row with the order lines of a purchase, or the other party of a transfer.
    async fn fetch_transaction_details(
        &self,
        transaction_id: i64,
    ) -> Result<Option<TransactionDetails>, SettlementError>;

    /// The deposit row created for gateway payment `payment_id`, if it has been credited.
    async fn fetch_deposit_by_payment(&self, payment_id: &str) -> Result<Option<WalletTransaction>, SettlementError>;

    /// Credits a gateway-confirmed deposit to the wallet and appends the deposit row carrying `payment_id`. A second
    /// call with the same payment id changes nothing and returns [`ApplyResult::Duplicate`].
    async fn credit_gateway_deposit(
        &self,
        user_id: i64,
        amount: Brl,
        payment_id: &str,
        description: &str,
    ) -> Result<ApplyResult<WalletTransaction>, SettlementError>;

    /// The id and public details of the user with this email, if there is one.
    async fn find_recipient(&self, email: &str) -> Result<Option<(i64, Counterparty)>, SettlementError>;

    /// Moves `amount` from `sender_id` to the user with the given email.
    async fn transfer(
        &self,
        sender_id: i64,
        recipient_email: &str,
        amount: Brl,
    ) -> Result<TransferResult, SettlementError>;

    /// Administrative credit (positive amount) or debit (negative amount). Debits may drive the balance negative. An
    /// empty `reason` is replaced by a generic one.
    async fn adjust_balance(
        &self,
        user_id: i64,
        amount: Brl,
        reason: &str,
    ) -> Result<WalletTransaction, SettlementError>;

    async fn fetch_outstanding_invoices(&self, user_id: i64) -> Result<Vec<CreditInvoice>, SettlementError>;

    /// Settles every open or late invoice of the user with the confirmed `payment_id`, and resets the credit used.
    /// Idempotent per payment id.
    async fn apply_invoice_payment(
        &self,
        user_id: i64,
        payment_id: &str,
    ) -> Result<ApplyResult<InvoicePayment>, SettlementError>;
}
