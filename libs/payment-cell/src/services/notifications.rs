// libs/payment-cell/src/services/notifications.rs
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{BookingConfirmation, PaymentError};

/// Best-effort confirmation message after a booking commits. A failure here
/// is logged and never unbooks anything.
#[async_trait]
pub trait ConfirmationNotifier: Send + Sync {
    async fn booking_confirmed(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), PaymentError>;
}

pub struct HttpNotificationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.notification_service_url.clone(),
        }
    }
}

#[async_trait]
impl ConfirmationNotifier for HttpNotificationService {
    async fn booking_confirmed(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), PaymentError> {
        let url = format!("{}/notifications/booking-confirmation", self.base_url);
        debug!("Sending booking confirmation for {}", confirmation.patient_name);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "patient_name": confirmation.patient_name,
                "patient_email": confirmation.patient_email,
                "doctor_name": confirmation.doctor_name,
                "date": confirmation.date,
                "start_time": confirmation.start_time,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Notification service error ({}): {}", status, error_text);
            return Err(PaymentError::Notification(format!(
                "Notification service returned {}",
                status
            )));
        }

        Ok(())
    }
}
