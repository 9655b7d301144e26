//! A minimal REST client for the Mercado Pago payments API.
//!
//! Only the two calls the settlement engine needs are covered: creating a payment (card token or PIX) and fetching a
//! payment by id, which is how webhook notifications are verified.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::MercadoPagoApi;
pub use config::MercadoPagoConfig;
pub use data_objects::{
    Identification,
    NewPayment,
    Payer,
    Payment,
    PaymentStatus,
    PointOfInteraction,
    TransactionData,
};
pub use error::MercadoPagoApiError;
