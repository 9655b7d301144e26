use fridge_settlement_engine::traits::{GatewayError, GatewayPayment, GatewayPaymentRequest, PaymentGateway};
use mockall::mock;

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_payment(&self, request: GatewayPaymentRequest) -> Result<GatewayPayment, GatewayError>;
        async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
    }
}
