use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{Brl, UserAccount},
    traits::SettlementError,
};

/// Card data as tokenised by the gateway's browser SDK. Raw card numbers never reach this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub token: String,
    pub payment_method_id: String,
    pub issuer_id: Option<String>,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentInstrument {
    Card(CardDetails),
    Pix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerInfo {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Digits only
    pub cpf: String,
}

impl From<&UserAccount> for PayerInfo {
    fn from(user: &UserAccount) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name(),
            cpf: user.cpf_digits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaymentRequest {
    pub amount: Brl,
    pub description: String,
    pub payer: PayerInfo,
    pub instrument: PaymentInstrument,
    pub external_reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Approved,
    Pending,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: GatewayPaymentStatus,
    pub status_detail: Option<String>,
    pub amount: Brl,
    /// `pix` or a card brand. Not every gateway response carries it.
    #[serde(default)]
    pub payment_method_id: Option<String>,
    pub external_reference: Option<String>,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
}

impl GatewayPayment {
    pub fn is_approved(&self) -> bool {
        self.status == GatewayPaymentStatus::Approved
    }

    /// True for card payments. A payment of unknown method is assumed to be PIX, the only other instrument.
    pub fn is_card(&self) -> bool {
        self.payment_method_id.as_deref().is_some_and(|m| !m.eq_ignore_ascii_case("pix"))
    }

    pub fn detail(&self) -> String {
        self.status_detail.clone().unwrap_or_else(|| "no details were given".to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway did not answer in time")]
    Timeout,
    #[error("Could not communicate with the payment gateway. {0}")]
    Transport(String),
    #[error("The payment gateway rejected the request ({status}). {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway returned an unexpected response. {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for SettlementError {
    fn from(e: GatewayError) -> Self {
        SettlementError::GatewayError(e.to_string())
    }
}

/// The external card/PIX processor.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn create_payment(&self, request: GatewayPaymentRequest) -> Result<GatewayPayment, GatewayError>;

    /// Fetches the authoritative state of a payment. Webhook payloads are never trusted; this is.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
