use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
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

#[derive(Default)]
struct GatewayState {
    next_id: u64,
    card_status: Option<GatewayPaymentStatus>,
    fail_next: Option<GatewayError>,
    create_delay: Option<Duration>,
    payments: HashMap<String, GatewayPayment>,
    requests: Vec<GatewayPaymentRequest>,
}

/// An in-memory payment gateway.
///
/// Card payments are approved and PIX payments are left pending unless told otherwise. Clones share state, so a test
/// can keep a handle to inspect what the APIs sent and to approve PIX payments as if the payer had scanned the QR code.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status every subsequent card payment gets.
    pub fn set_card_status(&self, status: GatewayPaymentStatus) {
        self.state.lock().unwrap().card_status = Some(status);
    }

    /// The next call to the gateway fails with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.state.lock().unwrap().fail_next = Some(error);
    }

    /// Every subsequent payment creation takes `delay` to answer, like a gateway under load.
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    /// Marks a payment approved, and returns it.
    pub fn approve(&self, payment_id: &str) -> GatewayPayment {
        let mut state = self.state.lock().unwrap();
        let payment = state.payments.get_mut(payment_id).expect("Unknown payment");
        payment.status = GatewayPaymentStatus::Approved;
        payment.status_detail = Some("accredited".into());
        payment.clone()
    }

    /// Registers a payment that was not created through this gateway, e.g. one made on another device.
    pub fn insert_payment(&self, id: &str, status: GatewayPaymentStatus, amount: Brl, external_reference: &str) {
        let payment = GatewayPayment {
            id: id.to_string(),
            status,
            status_detail: None,
            amount,
            payment_method_id: None,
            external_reference: Some(external_reference.to_string()),
            qr_code: None,
            qr_code_base64: None,
        };
        self.state.lock().unwrap().payments.insert(id.to_string(), payment);
    }

    pub fn requests(&self) -> Vec<GatewayPaymentRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn payment(&self, payment_id: &str) -> Option<GatewayPayment> {
        self.state.lock().unwrap().payments.get(payment_id).cloned()
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_payment(&self, request: GatewayPaymentRequest) -> Result<GatewayPayment, GatewayError> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.fail_next.take() {
            return Err(e);
        }
        state.next_id += 1;
        let id = format!("mp-{}", 1000 + state.next_id);
        let method = match &request.instrument {
            PaymentInstrument::Card(card) => card.payment_method_id.clone(),
            PaymentInstrument::Pix => "pix".to_string(),
        };
        let (status, detail, qr_code) = match &request.instrument {
            PaymentInstrument::Card(_) => {
                let status = state.card_status.unwrap_or(GatewayPaymentStatus::Approved);
                let detail = match status {
                    GatewayPaymentStatus::Approved => "accredited",
                    GatewayPaymentStatus::Pending => "pending_review_manual",
                    GatewayPaymentStatus::Declined => "cc_rejected_insufficient_amount",
                };
                (status, detail, None)
            },
            PaymentInstrument::Pix => {
                (GatewayPaymentStatus::Pending, "pending_waiting_transfer", Some(format!("00020126{id}")))
            },
        };
        let payment = GatewayPayment {
            id: id.clone(),
            status,
            status_detail: Some(detail.to_string()),
            amount: request.amount,
            payment_method_id: Some(method),
            external_reference: Some(request.external_reference.clone()),
            qr_code_base64: qr_code.as_ref().map(|_| "iVBORw0KGgo=".to_string()),
            qr_code,
        };
        state.requests.push(request);
        state.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.fail_next.take() {
            return Err(e);
        }
        state
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected { status: 404, message: format!("Payment {payment_id} not found") })
    }
}
