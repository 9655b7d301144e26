//! The three ways of paying for an order.
//!
//! * [`WalletFunding`] debits the stored wallet balance.
//! * [`CreditFunding`] charges the user's revolving credit line.
//! * [`GatewayFunding`] charges a tokenised card, or creates a PIX charge, with the external payment gateway.
//!
//! The local sources run inside the settlement transaction, with the buyer's row already locked. The gateway is called
//! between transactions.
use log::*;

use crate::{
    db_types::PaymentMethod,
    helpers::PaymentReference,
    traits::{
        AccountLedger,
        FundingOutcome,
        FundingRequest,
        FundingSource,
        GatewayPaymentRequest,
        GatewayPaymentStatus,
        PayerInfo,
        PaymentGateway,
        PaymentInstrument,
        SettlementError,
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct WalletFunding;

impl FundingSource for WalletFunding {
    fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::Wallet
    }

    async fn authorize_and_debit<L: AccountLedger>(
        &self,
        ledger: &mut L,
        request: &FundingRequest<'_>,
    ) -> Result<FundingOutcome, SettlementError> {
        let user = ledger.lock_user(request.user.id).await?;
        if user.wallet_balance < request.amount {
            debug!(
                "💸️ User #{} has {} in their wallet and cannot pay {} for order #{}",
                user.id, user.wallet_balance, request.amount, request.order_id
            );
            return Err(SettlementError::InsufficientFunds { available: user.wallet_balance, required: request.amount });
        }
        let balance = ledger.adjust_wallet_balance(user.id, -request.amount).await?;
        debug!("💸️ Debited {} from wallet of user #{}. New balance: {balance}", request.amount, user.id);
        Ok(FundingOutcome::Approved { gateway_ref: None })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreditFunding;

impl FundingSource for CreditFunding {
    fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::Credit
    }

    async fn authorize_and_debit<L: AccountLedger>(
        &self,
        ledger: &mut L,
        request: &FundingRequest<'_>,
    ) -> Result<FundingOutcome, SettlementError> {
        let user = ledger.lock_user(request.user.id).await?;
        let outstanding = ledger.outstanding_invoice_total(user.id).await?;
        let available = user.credit_limit - (user.credit_used + outstanding);
        if available < request.amount {
            debug!(
                "💸️ User #{} has {available} of credit available (limit {}, used {}, invoiced {outstanding}) and cannot \
                 pay {} for order #{}",
                user.id, user.credit_limit, user.credit_used, request.amount, request.order_id
            );
            return Err(SettlementError::InsufficientFunds { available, required: request.amount });
        }
        let used = ledger.adjust_credit_used(user.id, request.amount).await?;
        debug!("💸️ Charged {} to the credit line of user #{}. Credit used: {used}", request.amount, user.id);
        Ok(FundingOutcome::Approved { gateway_ref: None })
    }
}

/// Pays through the external gateway. The ledger is not touched: the money never passes through the wallet.
pub struct GatewayFunding<'g, G> {
    gateway: &'g G,
    instrument: PaymentInstrument,
}

impl<'g, G> GatewayFunding<'g, G> {
    pub fn new(gateway: &'g G, instrument: PaymentInstrument) -> Self {
        Self { gateway, instrument }
    }
}

impl<G: PaymentGateway> FundingSource for GatewayFunding<'_, G> {
    fn payment_method(&self) -> PaymentMethod {
        match self.instrument {
            PaymentInstrument::Card(_) => PaymentMethod::Card,
            PaymentInstrument::Pix => PaymentMethod::Pix,
        }
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn authorize_and_debit<L: AccountLedger>(
        &self,
        _ledger: &mut L,
        request: &FundingRequest<'_>,
    ) -> Result<FundingOutcome, SettlementError> {
        let payment_request = GatewayPaymentRequest {
            amount: request.amount,
            description: request.description.to_string(),
            payer: PayerInfo::from(request.user),
            instrument: self.instrument.clone(),
            external_reference: PaymentReference::order(request.order_id).to_string(),
        };
        let payment = self.gateway.create_payment(payment_request).await.map_err(|e| {
            warn!("💸️ Gateway payment for order #{} failed. {e}", request.order_id);
            SettlementError::from(e)
        })?;
        let outcome = match payment.status {
            GatewayPaymentStatus::Approved => FundingOutcome::Approved { gateway_ref: Some(payment.id) },
            GatewayPaymentStatus::Declined => {
                info!("💸️ Payment {} for order #{} was declined. {}", payment.id, request.order_id, payment.detail());
                FundingOutcome::Declined { detail: payment.detail() }
            },
            GatewayPaymentStatus::Pending => FundingOutcome::Pending {
                gateway_ref: payment.id,
                qr_code: payment.qr_code,
                qr_code_base64: payment.qr_code_base64,
            },
        };
        Ok(outcome)
    }
}
