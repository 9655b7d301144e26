//! Adapts the Mercado Pago REST client to the settlement engine's [`PaymentGateway`] contract.
use fridge_settlement_engine::{
    db_types::Brl,
    traits::{
        GatewayError,
        GatewayPayment,
        GatewayPaymentRequest,
        GatewayPaymentStatus,
        PaymentGateway,
        PaymentInstrument,
    },
};
use log::*;
use mercadopago_tools::{
    Identification,
    MercadoPagoApi,
    MercadoPagoApiError,
    MercadoPagoConfig,
    NewPayment,
    Payer,
    Payment,
    PaymentStatus,
};

use crate::errors::ServerError;

const PIX_PAYMENT_METHOD: &str = "pix";

#[derive(Clone)]
pub struct MercadoPagoGateway {
    api: MercadoPagoApi,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, ServerError> {
        let api = MercadoPagoApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentGateway for MercadoPagoGateway {
    async fn create_payment(&self, request: GatewayPaymentRequest) -> Result<GatewayPayment, GatewayError> {
        let payment = self.api.create_payment(&new_payment(&request)).await.map_err(|e| {
            warn!("💸️ Payment creation for {} failed. {e}", request.external_reference);
            gateway_error(e)
        })?;
        Ok(gateway_payment(payment))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let payment = self.api.get_payment(payment_id).await.map_err(gateway_error)?;
        Ok(gateway_payment(payment))
    }
}

pub fn new_payment(request: &GatewayPaymentRequest) -> NewPayment {
    let payer = Payer {
        email: request.payer.email.clone(),
        first_name: Some(request.payer.first_name.clone()),
        last_name: request.payer.last_name.clone(),
        identification: (!request.payer.cpf.is_empty())
            .then(|| Identification { id_type: "CPF".into(), number: request.payer.cpf.clone() }),
    };
    let mut payment = NewPayment {
        transaction_amount: request.amount.to_decimal(),
        description: request.description.clone(),
        payer,
        external_reference: Some(request.external_reference.clone()),
        ..Default::default()
    };
    match &request.instrument {
        PaymentInstrument::Card(card) => {
            payment.payment_method_id = card.payment_method_id.clone();
            payment.token = Some(card.token.clone());
            payment.installments = Some(card.installments.max(1));
            payment.issuer_id = card.issuer_id.clone();
        },
        PaymentInstrument::Pix => {
            payment.payment_method_id = PIX_PAYMENT_METHOD.into();
        },
    }
    payment
}

pub fn gateway_payment(payment: Payment) -> GatewayPayment {
    let status = match &payment.status {
        PaymentStatus::Approved => GatewayPaymentStatus::Approved,
        PaymentStatus::Pending | PaymentStatus::InProcess | PaymentStatus::Authorized | PaymentStatus::InMediation => {
            GatewayPaymentStatus::Pending
        },
        PaymentStatus::Rejected | PaymentStatus::Cancelled | PaymentStatus::Refunded | PaymentStatus::ChargedBack => {
            GatewayPaymentStatus::Declined
        },
        PaymentStatus::Other(s) => {
            warn!("💸️ Payment {} has an unknown status, {s}. Treating it as declined.", payment.id);
            GatewayPaymentStatus::Declined
        },
    };
    let (qr_code, qr_code_base64) = payment
        .qr_codes()
        .map(|data| (data.qr_code.clone(), data.qr_code_base64.clone()))
        .unwrap_or_default();
    GatewayPayment {
        id: payment.id.to_string(),
        status,
        status_detail: payment.status_detail,
        amount: Brl::from_decimal(payment.transaction_amount),
        payment_method_id: payment.payment_method_id,
        external_reference: payment.external_reference,
        qr_code,
        qr_code_base64,
    }
}

fn gateway_error(e: MercadoPagoApiError) -> GatewayError {
    match e {
        MercadoPagoApiError::Timeout => GatewayError::Timeout,
        MercadoPagoApiError::Initialization(s) | MercadoPagoApiError::RestResponseError(s) => {
            GatewayError::Transport(s)
        },
        MercadoPagoApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        MercadoPagoApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
    }
}
