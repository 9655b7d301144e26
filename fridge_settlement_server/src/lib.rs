//! # Fridge settlement server
//!
//! The HTTP front end of the settlement engine. It is responsible for:
//! * Settling smart-fridge orders paid from a wallet, a credit line, a card or PIX, and queueing the door unlock.
//! * Wallet deposits, transfers and the payment of credit invoices.
//! * Receiving payment notifications from Mercado Pago and reconciling them against orders, deposits and invoices.
//! * Administrative refunds, balance adjustments, stocktakes, promotions and remote unlocks.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payments`: Payment notifications from the gateway. Optionally HMAC-signed.
//! * `/api/...`: Everything else. Requires a bearer token, and each route checks the caller's roles.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
