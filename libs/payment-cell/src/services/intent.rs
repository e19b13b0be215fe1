// libs/payment-cell/src/services/intent.rs
use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use scheduling_cell::services::reservation::ReservationCoordinator;
use shared_config::AppConfig;
use shared_models::actor::Actor;

use crate::models::{
    CreatePaymentIntentRequest, PaymentError, PaymentIntentHandle, PaymentIntentSpec,
    PaymentMetadata,
};
use crate::services::gateway::PaymentGateway;

// Gateways cap item descriptions.
const MAX_DESCRIPTION_CHARS: usize = 200;

/// Starts a checkout: soft-holds the slot so nobody else can pay for it
/// during the checkout window, then asks the gateway for a hosted checkout
/// handle carrying the reservation metadata.
pub struct PaymentIntentService {
    config: Arc<AppConfig>,
    coordinator: ReservationCoordinator,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentIntentService {
    pub fn new(
        config: Arc<AppConfig>,
        coordinator: ReservationCoordinator,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            config,
            coordinator,
            gateway,
        }
    }

    pub async fn create_intent(
        &self,
        actor: &Actor,
        request: &CreatePaymentIntentRequest,
    ) -> Result<PaymentIntentHandle, PaymentError> {
        if request.reason.trim().is_empty() {
            return Err(PaymentError::Validation(
                "A consultation reason is required".to_string(),
            ));
        }

        let ttl = Duration::minutes(self.config.slot_hold_minutes);
        let slot = self.coordinator.hold(&request.slot_id, actor, ttl).await?;

        let description: String = format!("Reason: {}", request.reason)
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();

        let spec = PaymentIntentSpec {
            title: format!("Medical consultation with {}", slot.doctor_name),
            description,
            amount: self.config.consultation_price,
            payer_name: actor.name.clone(),
            payer_email: actor.email.clone(),
            metadata: PaymentMetadata {
                patient_id: actor.id.clone(),
                slot_id: request.slot_id.clone(),
                reason: request.reason.clone(),
            },
        };

        match self.gateway.create_intent(&spec).await {
            Ok(handle) => {
                info!(
                    "Payment intent {} created for slot {} (patient {})",
                    handle.intent_id, request.slot_id, actor.id
                );
                Ok(handle)
            }
            Err(e) => {
                // Checkout never started; give the slot back right away
                // instead of waiting out the hold.
                if let Err(release_err) =
                    self.coordinator.release_hold(&request.slot_id, actor).await
                {
                    warn!(
                        "Failed to release hold on slot {} after gateway error: {}",
                        request.slot_id, release_err
                    );
                }
                Err(e)
            }
        }
    }
}
