use std::time::Duration;

use fridge_common::Secret;
use log::*;

const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub base_url: String,
    pub access_token: Secret<String>,
    /// Applies to the whole request. A timed out payment creation is reported as a failure.
    pub timeout: Duration,
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), access_token: Secret::default(), timeout: DEFAULT_TIMEOUT }
    }
}

impl MercadoPagoConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("FSS_MP_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ FSS_MP_BASE_URL not set, using {DEFAULT_BASE_URL}");
            DEFAULT_BASE_URL.to_string()
        });
        let access_token = Secret::new(std::env::var("FSS_MP_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ FSS_MP_ACCESS_TOKEN not set, using (probably useless) default");
            "TEST-00000000000000".to_string()
        }));
        let timeout = std::env::var("FSS_MP_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ {s} is not a valid value for FSS_MP_TIMEOUT. {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { base_url, access_token, timeout }
    }
}
