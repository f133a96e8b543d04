use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{GatewayError, PaymentGateway, PaymentHandle};
use crate::config::PaymentConfig;

/// Creates Stripe payment intents over the REST API.
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_handle(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentHandle, GatewayError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        form.extend(
            metadata
                .into_iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value)),
        );

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response
            .json::<PaymentIntentResponse>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| GatewayError::Malformed("missing client_secret".into()))?;

        Ok(PaymentHandle {
            client_secret,
            reference: intent.id,
        })
    }
}
