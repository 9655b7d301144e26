//! Helpers for tests in this crate and in crates that depend on it (enable the `test_utils` feature).
mod fake_gateway;
mod prepare_env;
mod seed;

pub use fake_gateway::FakeGateway;
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
pub use seed::{seed_invoice, seed_location, seed_product, seed_stock, seed_user, Fixture};
