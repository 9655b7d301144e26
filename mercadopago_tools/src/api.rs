use std::sync::Arc;

use log::*;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::MercadoPagoConfig, MercadoPagoApiError, NewPayment, Payment};

#[derive(Clone)]
pub struct MercadoPagoApi {
    config: MercadoPagoConfig,
    client: Arc<Client>,
}

impl MercadoPagoApi {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, MercadoPagoApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.access_token.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MercadoPagoApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method.clone(), url);
        if let Some(body) = body {
            // Retried creations with the same key are not charged twice
            req = req.header("X-Idempotency-Key", idempotency_key()).json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                MercadoPagoApiError::Timeout
            } else {
                MercadoPagoApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message =
                response.text().await.map_err(|e| MercadoPagoApiError::RestResponseError(e.to_string()))?;
            Err(MercadoPagoApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, MercadoPagoApiError> {
        debug!(
            "Creating {} payment of {:.2} ({})",
            payment.payment_method_id, payment.transaction_amount, payment.description
        );
        let result = self.rest_query::<Payment, &NewPayment>(Method::POST, "/v1/payments", Some(payment)).await?;
        info!("Created payment #{} with status {}", result.id, result.status);
        Ok(result)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment, MercadoPagoApiError> {
        let path = format!("/v1/payments/{payment_id}");
        debug!("Fetching payment #{payment_id}");
        let result = self.rest_query::<Payment, ()>(Method::GET, &path, None).await?;
        debug!("Fetched payment #{payment_id}. Status: {}", result.status);
        Ok(result)
    }
}

fn idempotency_key() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}
