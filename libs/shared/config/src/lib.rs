use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub payment_gateway_url: String,
    pub payment_gateway_token: String,
    pub document_service_url: String,
    pub notification_service_url: String,
    pub consultation_price: f64,
    pub slot_hold_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("CLINIC_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            payment_gateway_url: env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            payment_gateway_token: env::var("PAYMENT_GATEWAY_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_GATEWAY_TOKEN not set, using empty value");
                    String::new()
                }),
            document_service_url: env::var("DOCUMENT_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("DOCUMENT_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            notification_service_url: env::var("NOTIFICATION_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            consultation_price: env::var("CONSULTATION_PRICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8.0),
            slot_hold_minutes: env::var("SLOT_HOLD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_gateway_url.is_empty() && !self.payment_gateway_token.is_empty()
    }
}
