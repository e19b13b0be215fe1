// libs/payment-cell/src/services/confirmation.rs
use std::sync::Arc;

use tracing::{error, info};

use scheduling_cell::models::{
    Appointment, PaymentConfirmation, PaymentDetails, ReserveRequest, SchedulingError,
    PAYMENT_CONFIRMATIONS_COLLECTION,
};
use scheduling_cell::services::appointments::AppointmentRepository;
use scheduling_cell::services::reservation::ReservationCoordinator;
use shared_models::actor::Actor;
use shared_store::AtomicStore;

use crate::models::{BookingConfirmation, ConfirmPaymentRequest, PaymentError, PaymentStatus};
use crate::services::gateway::PaymentGateway;
use crate::services::notifications::ConfirmationNotifier;

/// Bridges an external payment outcome to the reservation transaction,
/// exactly once per payment id.
pub struct PaymentConfirmationHandler {
    store: Arc<dyn AtomicStore>,
    coordinator: ReservationCoordinator,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ConfirmationNotifier>,
}

impl PaymentConfirmationHandler {
    pub fn new(
        store: Arc<dyn AtomicStore>,
        coordinator: ReservationCoordinator,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ConfirmationNotifier>,
    ) -> Self {
        Self {
            store,
            coordinator,
            gateway,
            notifier,
        }
    }

    pub async fn confirm(
        &self,
        actor: &Actor,
        request: &ConfirmPaymentRequest,
    ) -> Result<Appointment, PaymentError> {
        if request.status != "approved" {
            return Err(PaymentError::NotApproved);
        }

        // Never trust the declared outcome alone.
        let verified = self.gateway.verify_payment(&request.payment_id).await?;
        if verified.status != PaymentStatus::Approved {
            return Err(PaymentError::NotApproved);
        }

        let metadata = self.gateway.intent_metadata(&request.intent_id).await?;
        if metadata.patient_id != actor.id {
            return Err(PaymentError::Forbidden);
        }

        // A confirmation that already went through is a no-op, not a second
        // appointment.
        if let Some(existing) = self.existing_confirmation(&request.payment_id).await? {
            info!(
                "Duplicate confirmation for payment {}, returning appointment {}",
                request.payment_id, existing.id
            );
            return Ok(existing);
        }

        let reserve_request = ReserveRequest {
            slot_id: metadata.slot_id.clone(),
            patient_id: actor.id.clone(),
            patient_name: actor.name.clone(),
            reason: metadata.reason.clone(),
            payment: Some(PaymentDetails {
                payment_id: request.payment_id.clone(),
                price: verified.amount,
                method: verified.method.clone(),
                paid_at: verified.approved_at,
            }),
        };

        let appointment = match self.coordinator.reserve(&reserve_request).await {
            Ok(appointment) => appointment,
            Err(e @ (SchedulingError::SlotUnavailable | SchedulingError::TransactionConflict)) => {
                // A racing duplicate of the same confirmation may have won;
                // if so this call is still a success.
                match self.existing_confirmation(&request.payment_id).await? {
                    Some(existing) => return Ok(existing),
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Payment {} confirmed, appointment {} reserved on slot {}",
            request.payment_id, appointment.id, appointment.slot_id
        );

        if let Err(e) = self
            .notifier
            .booking_confirmed(&BookingConfirmation {
                patient_name: appointment.patient_name.clone(),
                patient_email: actor.email.clone(),
                doctor_name: appointment.doctor_name.clone(),
                date: appointment.date,
                start_time: appointment.start_time,
            })
            .await
        {
            // The booking stands even when the message does not go out.
            error!(
                "Appointment {} reserved but the confirmation message failed: {}",
                appointment.id, e
            );
        }

        Ok(appointment)
    }

    async fn existing_confirmation(
        &self,
        payment_id: &str,
    ) -> Result<Option<Appointment>, PaymentError> {
        let doc = self
            .store
            .get(PAYMENT_CONFIRMATIONS_COLLECTION, payment_id)
            .await
            .map_err(SchedulingError::from)?;

        let Some(doc) = doc else {
            return Ok(None);
        };

        let confirmation: PaymentConfirmation =
            serde_json::from_value(doc.data.clone()).map_err(|e| {
                PaymentError::Scheduling(SchedulingError::Store(format!(
                    "Failed to parse payment confirmation: {}",
                    e
                )))
            })?;

        let appointments = AppointmentRepository::new(self.store.clone());
        let appointment = appointments.get(&confirmation.appointment_id).await?;
        Ok(Some(appointment))
    }
}
