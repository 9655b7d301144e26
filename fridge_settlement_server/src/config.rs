use std::{env, fmt::Display, io::Write, str::FromStr};

use chrono::Duration;
use fridge_common::{parse_boolean_flag, Secret};
use log::*;
use mercadopago_tools::MercadoPagoConfig;
use rand::{distributions::Alphanumeric, Rng};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_FSS_HOST: &str = "127.0.0.1";
const DEFAULT_FSS_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fridge_store.db";
const DEFAULT_PENDING_ORDER_TIMEOUT_HRS: i64 = 2;
const DEFAULT_EXPIRY_CHECK_INTERVAL_SECS: u64 = 300;
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
    /// Card and PIX orders that are still pending after this long are abandoned by the expiry worker.
    pub pending_order_timeout: Duration,
    /// How often the expiry worker runs.
    pub expiry_check_interval: std::time::Duration,
    pub gateway: MercadoPagoConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FSS_HOST.to_string(),
            port: DEFAULT_FSS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            webhook: WebhookConfig::default(),
            pending_order_timeout: Duration::hours(DEFAULT_PENDING_ORDER_TIMEOUT_HRS),
            expiry_check_interval: std::time::Duration::from_secs(DEFAULT_EXPIRY_CHECK_INTERVAL_SECS),
            gateway: MercadoPagoConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FSS_HOST").ok().unwrap_or_else(|| DEFAULT_FSS_HOST.into());
        let port = parse_value("FSS_PORT", env::var("FSS_PORT").ok(), DEFAULT_FSS_PORT);
        let database_url = env::var("FSS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FSS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let webhook = WebhookConfig::from_env_or_default();
        let (pending_order_timeout, expiry_check_interval) = configure_expiry_worker();
        let gateway = MercadoPagoConfig::new_from_env_or_default();
        Self { host, port, database_url, auth, webhook, pending_order_timeout, expiry_check_interval, gateway }
    }
}

fn configure_expiry_worker() -> (Duration, std::time::Duration) {
    let hours = parse_value(
        "FSS_PENDING_ORDER_TIMEOUT",
        env::var("FSS_PENDING_ORDER_TIMEOUT").ok(),
        DEFAULT_PENDING_ORDER_TIMEOUT_HRS,
    );
    let hours = positive_or_default("FSS_PENDING_ORDER_TIMEOUT", hours, DEFAULT_PENDING_ORDER_TIMEOUT_HRS);
    let secs = parse_value(
        "FSS_EXPIRY_CHECK_INTERVAL",
        env::var("FSS_EXPIRY_CHECK_INTERVAL").ok(),
        DEFAULT_EXPIRY_CHECK_INTERVAL_SECS,
    );
    let secs = positive_or_default("FSS_EXPIRY_CHECK_INTERVAL", secs, DEFAULT_EXPIRY_CHECK_INTERVAL_SECS);
    (Duration::hours(hours), std::time::Duration::from_secs(secs))
}

/// Parses an environment value, logging and falling back to `default` when it is missing or invalid.
fn parse_value<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

fn positive_or_default<T>(name: &str, value: T, default: T) -> T
where T: PartialOrd + Default + Display {
    if value > T::default() {
        value
    } else {
        warn!("🪛️ {name} must be greater than zero. Using the default, {default}, instead.");
        default
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret that access tokens are signed with.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since every token becomes invalid when the server restarts. 🚨️🚨️🚨️"
        );
        let secret = rand::thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        match NamedTempFile::new().ok().and_then(|f| f.keep().ok()) {
            Some((mut f, p)) => match writeln!(f, "{secret}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                     you are doing it wrong! Set the FSS_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
            },
            None => warn!("🪛️ Could not create a temporary file to store the JWT secret."),
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("FSS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [FSS_JWT_SECRET]")))?;
        Self::from_secret(secret)
    }

    fn from_secret(secret: String) -> Result<Self, ServerError> {
        let secret = secret.trim().to_string();
        if secret.is_empty() {
            return Err(ServerError::ConfigurationError("FSS_JWT_SECRET is empty".into()));
        }
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            warn!("🪛️ FSS_JWT_SECRET is shorter than {MIN_JWT_SECRET_LENGTH} characters. Consider a longer secret.");
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    /// When false, payment notifications are accepted without a signature. They are still verified against the
    /// gateway before anything is applied.
    pub hmac_checks: bool,
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_checks = parse_boolean_flag(env::var("FSS_WEBHOOK_HMAC_CHECKS").ok(), false);
        let hmac_secret = env::var("FSS_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            if hmac_checks {
                error!(
                    "🪛️ FSS_WEBHOOK_HMAC_CHECKS is enabled but FSS_WEBHOOK_HMAC_SECRET is not set. Every payment \
                     notification will be rejected."
                );
            }
            String::default()
        });
        if !hmac_checks {
            info!("🪛️ Webhook signature checks are disabled.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}
