// libs/payment-cell/src/services/gateway.rs
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{
    PaymentError, PaymentIntentHandle, PaymentIntentSpec, PaymentMetadata, VerifiedPayment,
};

/// External payment capability: creates checkout intents carrying opaque
/// metadata and reports verified outcomes. The core never trusts a
/// client-declared outcome without going through `verify_payment`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        spec: &PaymentIntentSpec,
    ) -> Result<PaymentIntentHandle, PaymentError>;

    async fn verify_payment(&self, payment_id: &str) -> Result<VerifiedPayment, PaymentError>;

    async fn intent_metadata(&self, intent_id: &str) -> Result<PaymentMetadata, PaymentError>;
}

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    access_token: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.payment_gateway_url.clone(),
            access_token: config.payment_gateway_token.clone(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.access_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, PaymentError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Payment gateway request to {}", url);

        let mut req = self.client.request(method, &url).headers(self.headers());
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Payment gateway error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                404 => PaymentError::IntentNotFound,
                _ => PaymentError::Gateway(format!("Gateway returned {}: {}", status, error_text)),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Gateway(format!("Invalid gateway response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        spec: &PaymentIntentSpec,
    ) -> Result<PaymentIntentHandle, PaymentError> {
        let body = json!({
            "items": [{
                "title": spec.title,
                "description": spec.description,
                "quantity": 1,
                "unit_price": spec.amount,
            }],
            "payer": {
                "name": spec.payer_name,
                "email": spec.payer_email,
            },
            "metadata": spec.metadata,
        });

        self.request(Method::POST, "/v1/intents", Some(body)).await
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<VerifiedPayment, PaymentError> {
        let path = format!("/v1/payments/{}", payment_id);
        self.request(Method::GET, &path, None).await
    }

    async fn intent_metadata(&self, intent_id: &str) -> Result<PaymentMetadata, PaymentError> {
        #[derive(serde::Deserialize)]
        struct IntentDetails {
            metadata: Option<PaymentMetadata>,
        }

        let path = format!("/v1/intents/{}", intent_id);
        let details: IntentDetails = self.request(Method::GET, &path, None).await?;
        details.metadata.ok_or(PaymentError::IntentNotFound)
    }
}
