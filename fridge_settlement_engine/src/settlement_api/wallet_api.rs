use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Brl, Counterparty, CreditInvoice, WalletTransaction},
    events::{EventProducers, WalletEvent},
    helpers::PaymentReference,
    traits::{
        ApplyResult,
        CardDetails,
        GatewayPayment,
        GatewayPaymentRequest,
        GatewayPaymentStatus,
        Pagination,
        PayerInfo,
        PaymentGateway,
        PaymentInstrument,
        PendingCharge,
        SettlementError,
        TransactionDetails,
        TransactionPage,
        TransferResult,
        WalletManagement,
    },
};

pub const CARD_DEPOSIT_DESCRIPTION: &str = "Depósito via Cartão de Crédito";
pub const PIX_DEPOSIT_DESCRIPTION: &str = "Depósito via PIX";
const INVOICE_PAYMENT_DESCRIPTION: &str = "Pagamento de faturas";

/// PIX deposits below R$ 1,00 are refused.
pub const MIN_PIX_DEPOSIT: Brl = Brl::from_centavos(100);

/// The ledger description for a deposit made with `payment`.
pub fn deposit_description(payment: &GatewayPayment) -> &'static str {
    if payment.is_card() {
        CARD_DEPOSIT_DESCRIPTION
    } else {
        PIX_DEPOSIT_DESCRIPTION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CardDeposit {
    Credited(WalletTransaction),
    /// The gateway is reviewing the charge. The webhook credits the wallet if it is approved.
    Pending { payment_id: String, amount: Brl, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Paid,
    Pending,
}

/// Wallet balances, deposits, transfers and the credit line.
pub struct WalletApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for WalletApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B, G> WalletApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> WalletApi<B, G>
where
    B: WalletManagement,
    G: PaymentGateway,
{
    pub async fn balance(&self, user_id: i64) -> Result<Brl, SettlementError> {
        let user = self.db.fetch_user(user_id).await?.ok_or(SettlementError::UserNotFound(user_id))?;
        Ok(user.wallet_balance)
    }

    /// The user's ledger, newest first.
    pub async fn transactions(&self, user_id: i64, page: Pagination) -> Result<TransactionPage, SettlementError> {
        self.db.fetch_transactions(user_id, page).await
    }

    /// A receipt for one of the user's own ledger rows. Rows of other users are reported as not found.
    pub async fn transaction_details(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<TransactionDetails, SettlementError> {
        self.db
            .fetch_transaction_details(transaction_id)
            .await?
            .filter(|d| d.transaction.user_id == user_id)
            .ok_or(SettlementError::TransactionNotFound(transaction_id))
    }

    /// Confirms who a transfer would go to before any money moves.
    pub async fn verify_recipient(&self, sender_id: i64, email: &str) -> Result<Counterparty, SettlementError> {
        if email.trim().is_empty() {
            return Err(SettlementError::ValidationError("The recipient's email is required".into()));
        }
        let (recipient_id, recipient) =
            self.db.find_recipient(email).await?.ok_or_else(|| SettlementError::RecipientNotFound(email.to_string()))?;
        if recipient_id == sender_id {
            return Err(SettlementError::ValidationError("You cannot transfer money to yourself".into()));
        }
        Ok(recipient)
    }

    /// Charges a card and credits the wallet once the gateway approves. A charge held for review is reported as
    /// pending rather than declined, since it may still be approved later.
    pub async fn deposit_with_card(
        &self,
        user_id: i64,
        amount: Brl,
        card: CardDetails,
    ) -> Result<CardDeposit, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::ValidationError("The deposit amount must be positive".into()));
        }
        let reference = PaymentReference::wallet_deposit(user_id);
        let payment =
            self.charge(user_id, amount, CARD_DEPOSIT_DESCRIPTION, PaymentInstrument::Card(card), reference).await?;
        match payment.status {
            GatewayPaymentStatus::Approved => {},
            GatewayPaymentStatus::Pending => {
                info!("💸️ Card deposit of {amount} for user #{user_id} is under review: {}", payment.detail());
                let detail = payment.detail();
                return Ok(CardDeposit::Pending { payment_id: payment.id, amount, detail });
            },
            GatewayPaymentStatus::Declined => {
                info!("💸️ Card deposit of {amount} for user #{user_id} was declined: {}", payment.detail());
                return Err(SettlementError::GatewayDeclined(payment.detail()));
            },
        }
        let deposit =
            match self.db.credit_gateway_deposit(user_id, amount, &payment.id, CARD_DEPOSIT_DESCRIPTION).await? {
                ApplyResult::Applied(deposit) => {
                    self.producers.publish_wallet_event(WalletEvent::DepositCredited(deposit.clone())).await;
                    deposit
                },
                // The webhook got there first
                ApplyResult::Duplicate => self.db.fetch_deposit_by_payment(&payment.id).await?.ok_or_else(|| {
                    SettlementError::ConsistencyViolation(format!("Deposit for payment {} has vanished", payment.id))
                })?,
            };
        Ok(CardDeposit::Credited(deposit))
    }

    /// Creates a PIX charge to top up the wallet. The wallet is only credited when the webhook confirms payment.
    pub async fn create_pix_deposit(&self, user_id: i64, amount: Brl) -> Result<PendingCharge, SettlementError> {
        if amount < MIN_PIX_DEPOSIT {
            return Err(SettlementError::ValidationError(format!("The minimum PIX deposit is {MIN_PIX_DEPOSIT}")));
        }
        let reference = PaymentReference::wallet_deposit(user_id);
        let payment =
            self.charge(user_id, amount, PIX_DEPOSIT_DESCRIPTION, PaymentInstrument::Pix, reference).await?;
        pending_charge(payment)
    }

    /// Looks the payment up with the gateway. Only the user's own deposits are visible.
    pub async fn deposit_status(&self, user_id: i64, payment_id: &str) -> Result<DepositStatus, SettlementError> {
        let payment = self.gateway.fetch_payment(payment_id).await?;
        let reference = payment.external_reference.as_deref().map(|r| r.parse::<PaymentReference>());
        match reference {
            Some(Ok(PaymentReference::WalletDeposit { user_id: owner, .. })) if owner == user_id => {},
            _ => {
                debug!("💸️ User #{user_id} asked for the status of payment {payment_id}, which is not their deposit");
                return Err(SettlementError::ValidationError(format!("{payment_id} is not one of your deposits")));
            },
        }
        Ok(if payment.is_approved() { DepositStatus::Paid } else { DepositStatus::Pending })
    }

    pub async fn transfer(
        &self,
        sender_id: i64,
        recipient_email: &str,
        amount: Brl,
    ) -> Result<TransferResult, SettlementError> {
        let result = self.db.transfer(sender_id, recipient_email, amount).await?;
        debug!("💸️ Transfer #{} of {amount} completed", result.outgoing.id);
        Ok(result)
    }

    /// Administrative credit (positive) or debit (negative). A debit may leave the balance negative.
    pub async fn adjust_balance(
        &self,
        user_id: i64,
        amount: Brl,
        reason: &str,
    ) -> Result<WalletTransaction, SettlementError> {
        let row = self.db.adjust_balance(user_id, amount, reason).await?;
        self.producers.publish_wallet_event(WalletEvent::BalanceAdjusted(row.clone())).await;
        Ok(row)
    }

    pub async fn outstanding_invoices(&self, user_id: i64) -> Result<Vec<CreditInvoice>, SettlementError> {
        self.db.fetch_outstanding_invoices(user_id).await
    }

    /// Creates one PIX charge covering every open and late invoice of the user.
    pub async fn create_invoice_payment(&self, user_id: i64) -> Result<PendingCharge, SettlementError> {
        let outstanding: Brl = self.db.fetch_outstanding_invoices(user_id).await?.iter().map(|i| i.amount).sum();
        if !outstanding.is_positive() {
            return Err(SettlementError::ValidationError("There are no outstanding invoices to pay".into()));
        }
        let reference = PaymentReference::credit_invoice(user_id);
        let payment =
            self.charge(user_id, outstanding, INVOICE_PAYMENT_DESCRIPTION, PaymentInstrument::Pix, reference).await?;
        pending_charge(payment)
    }

    async fn charge(
        &self,
        user_id: i64,
        amount: Brl,
        description: &str,
        instrument: PaymentInstrument,
        reference: PaymentReference,
    ) -> Result<GatewayPayment, SettlementError> {
        let user = self.db.fetch_user(user_id).await?.ok_or(SettlementError::UserNotFound(user_id))?;
        let request = GatewayPaymentRequest {
            amount,
            description: description.to_string(),
            payer: PayerInfo::from(&user),
            instrument,
            external_reference: reference.to_string(),
        };
        let payment = self.gateway.create_payment(request).await.map_err(|e| {
            warn!("💸️ Could not create a gateway payment for user #{user_id}. {e}");
            SettlementError::from(e)
        })?;
        debug!("💸️ Gateway payment {} ({:?}) created for {reference}", payment.id, payment.status);
        Ok(payment)
    }
}

fn pending_charge(payment: GatewayPayment) -> Result<PendingCharge, SettlementError> {
    if payment.status == GatewayPaymentStatus::Declined {
        return Err(SettlementError::GatewayDeclined(payment.detail()));
    }
    Ok(PendingCharge {
        payment_id: payment.id,
        amount: payment.amount,
        qr_code: payment.qr_code,
        qr_code_base64: payment.qr_code_base64,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn payment(method: Option<&str>) -> GatewayPayment {
        GatewayPayment {
            id: "mp-1".into(),
            status: GatewayPaymentStatus::Approved,
            status_detail: None,
            amount: Brl::from(1000),
            payment_method_id: method.map(String::from),
            external_reference: Some("wallet_deposit_7_1718000000000".into()),
            qr_code: None,
            qr_code_base64: None,
        }
    }

    #[test]
    fn deposit_descriptions_follow_the_instrument() {
        assert_eq!(deposit_description(&payment(Some("pix"))), PIX_DEPOSIT_DESCRIPTION);
        assert_eq!(deposit_description(&payment(Some("PIX"))), PIX_DEPOSIT_DESCRIPTION);
        assert_eq!(deposit_description(&payment(None)), PIX_DEPOSIT_DESCRIPTION);
        assert_eq!(deposit_description(&payment(Some("master"))), CARD_DEPOSIT_DESCRIPTION);
    }

    #[test]
    fn card_deposit_results_are_tagged() {
        let pending = CardDeposit::Pending { payment_id: "mp-1".into(), amount: Brl::from(500), detail: "review".into() };
        let v = serde_json::to_value(&pending).unwrap();
        assert_eq!(v["result"], "pending");
        assert_eq!(v["payment_id"], "mp-1");
        assert_eq!(v["amount"], 500);
    }
}
