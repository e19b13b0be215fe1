// libs/scheduling-cell/src/services/reservation.rs
//
// Every mutation that couples a slot and an appointment runs here, as a
// single atomic transaction: read the participating documents, validate,
// stage the writes, commit. A commit fails if any document changed since it
// was read; only that store-level conflict is retried (bounded), never a
// business validation failure.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::actor::Actor;
use shared_store::{AtomicStore, Transaction};

use crate::models::{
    Appointment, AppointmentStatus, AvailabilitySlot, ClinicalRecord, CompleteRequest,
    PaymentConfirmation, ReserveRequest, SchedulingError, SlotStatus, APPOINTMENTS_COLLECTION,
    PAYMENT_CONFIRMATIONS_COLLECTION, SLOTS_COLLECTION,
};
use crate::services::documents::{PrescriptionDocumentRequest, PrescriptionRenderer};

const MAX_TX_ATTEMPTS: u32 = 3;

pub struct ReservationCoordinator {
    store: Arc<dyn AtomicStore>,
    renderer: Arc<dyn PrescriptionRenderer>,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn AtomicStore>, renderer: Arc<dyn PrescriptionRenderer>) -> Self {
        Self { store, renderer }
    }

    /// Re-run `f` while it fails on a store-level write conflict, up to the
    /// attempt bound. Each attempt re-reads and re-validates from scratch.
    async fn run_with_retries<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, SchedulingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SchedulingError>>,
    {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            match f().await {
                Err(SchedulingError::TransactionConflict) if attempt < MAX_TX_ATTEMPTS => {
                    warn!(
                        "{} hit a write conflict, retrying attempt {}/{}",
                        op, attempt, MAX_TX_ATTEMPTS
                    );
                    tokio::time::sleep(StdDuration::from_millis(25 * attempt as u64)).await;
                }
                other => return other,
            }
        }
        Err(SchedulingError::TransactionConflict)
    }

    // --------------------------------------------------------------------------
    // Soft hold (payment-intent window)
    // --------------------------------------------------------------------------

    /// Place a short-lived hold on a slot while the patient goes through
    /// checkout, so two patients cannot both pay for the same slot. The hold
    /// lapses on its own if the payment is never confirmed.
    pub async fn hold(
        &self,
        slot_id: &str,
        actor: &Actor,
        ttl: Duration,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        self.run_with_retries("hold", || self.try_hold(slot_id, actor, ttl))
            .await
    }

    async fn try_hold(
        &self,
        slot_id: &str,
        actor: &Actor,
        ttl: Duration,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        let now = Utc::now();
        let doc = self
            .store
            .get(SLOTS_COLLECTION, slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        let slot = AvailabilitySlot::from_document(&doc)?;

        if !slot.is_bookable_by(&actor.id, now) {
            return Err(SchedulingError::SlotUnavailable);
        }

        let mut held = slot.clone();
        held.status = SlotStatus::Held;
        held.held_by = Some(actor.id.clone());
        held.hold_expires_at = Some(now + ttl);

        let data = encode(&held, "slot")?;
        let mut tx = Transaction::new();
        tx.observe(SLOTS_COLLECTION, &doc);
        tx.update(SLOTS_COLLECTION, slot_id, data);
        self.store.commit(tx).await?;

        debug!("Slot {} held by patient {} until {:?}", slot_id, actor.id, held.hold_expires_at);
        Ok(held)
    }

    /// Give a held slot back, e.g. when checkout could not be started.
    /// A hold owned by someone else (or no hold at all) is left alone.
    pub async fn release_hold(&self, slot_id: &str, actor: &Actor) -> Result<(), SchedulingError> {
        self.run_with_retries("release_hold", || self.try_release_hold(slot_id, actor))
            .await
    }

    async fn try_release_hold(&self, slot_id: &str, actor: &Actor) -> Result<(), SchedulingError> {
        let doc = match self.store.get(SLOTS_COLLECTION, slot_id).await? {
            Some(doc) => doc,
            None => return Ok(()),
        };
        let slot = AvailabilitySlot::from_document(&doc)?;

        if slot.status != SlotStatus::Held || slot.held_by.as_deref() != Some(actor.id.as_str()) {
            return Ok(());
        }

        let mut released = slot.clone();
        released.status = SlotStatus::Available;
        released.held_by = None;
        released.hold_expires_at = None;

        let data = encode(&released, "slot")?;
        let mut tx = Transaction::new();
        tx.observe(SLOTS_COLLECTION, &doc);
        tx.update(SLOTS_COLLECTION, slot_id, data);
        self.store.commit(tx).await?;

        debug!("Hold on slot {} released by patient {}", slot_id, actor.id);
        Ok(())
    }

    // --------------------------------------------------------------------------
    // Reserve
    // --------------------------------------------------------------------------

    /// Bind a slot to a new appointment. At most one concurrent reserve on a
    /// slot succeeds; the loser observes a conflict. When the request carries
    /// payment details, the payment-confirmation marker is created in the
    /// same transaction, so one payment id can never yield two appointments.
    pub async fn reserve(&self, request: &ReserveRequest) -> Result<Appointment, SchedulingError> {
        if request.reason.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "A consultation reason is required".to_string(),
            ));
        }
        self.run_with_retries("reserve", || self.try_reserve(request))
            .await
    }

    async fn try_reserve(&self, request: &ReserveRequest) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();
        let slot_doc = self
            .store
            .get(SLOTS_COLLECTION, &request.slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        let slot = AvailabilitySlot::from_document(&slot_doc)?;

        if !slot.is_bookable_by(&request.patient_id, now) {
            return Err(SchedulingError::SlotUnavailable);
        }

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id: request.patient_id.clone(),
            patient_name: request.patient_name.clone(),
            doctor_id: slot.doctor_id.clone(),
            doctor_name: slot.doctor_name.clone(),
            specialty_name: slot.specialty_name.clone(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            slot_id: slot.id.clone(),
            status: AppointmentStatus::Reserved,
            reason: request.reason.clone(),
            payment_id: request.payment.as_ref().map(|p| p.payment_id.clone()),
            price: request.payment.as_ref().map(|p| p.price),
            payment_method: request.payment.as_ref().and_then(|p| p.method.clone()),
            payment_date: request.payment.as_ref().and_then(|p| p.paid_at),
            rescheduled_from: None,
            clinical_record: None,
            created_at: now,
        };

        let mut reserved = slot.clone();
        reserved.status = SlotStatus::Reserved;
        reserved.patient_id = Some(request.patient_id.clone());
        reserved.held_by = None;
        reserved.hold_expires_at = None;

        let mut tx = Transaction::new();
        tx.observe(SLOTS_COLLECTION, &slot_doc);
        tx.update(SLOTS_COLLECTION, &slot.id, encode(&reserved, "slot")?);
        tx.create(
            APPOINTMENTS_COLLECTION,
            &appointment.id,
            encode(&appointment, "appointment")?,
        );

        if let Some(payment) = &request.payment {
            let confirmation = PaymentConfirmation {
                payment_id: payment.payment_id.clone(),
                appointment_id: appointment.id.clone(),
                confirmed_at: now,
            };
            tx.observe_absent(PAYMENT_CONFIRMATIONS_COLLECTION, &payment.payment_id);
            tx.create(
                PAYMENT_CONFIRMATIONS_COLLECTION,
                &payment.payment_id,
                encode(&confirmation, "payment confirmation")?,
            );
        }

        self.store.commit(tx).await?;

        info!(
            "Reserved slot {} for patient {} (appointment {})",
            slot.id, request.patient_id, appointment.id
        );
        Ok(appointment)
    }

    // --------------------------------------------------------------------------
    // Cancel
    // --------------------------------------------------------------------------

    /// Cancel a reserved appointment and free its slot, atomically: there is
    /// no window where the appointment is cancelled but the slot still shows
    /// reserved, or vice versa.
    pub async fn cancel(
        &self,
        appointment_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        self.run_with_retries("cancel", || self.try_cancel(appointment_id, actor))
            .await
    }

    async fn try_cancel(
        &self,
        appointment_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        let appointment_doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        let appointment = Appointment::from_document(&appointment_doc)?;

        if appointment.patient_id != actor.id {
            return Err(SchedulingError::Forbidden);
        }
        if appointment.status != AppointmentStatus::Reserved {
            return Err(SchedulingError::InvalidStateTransition(appointment.status));
        }

        let slot_doc = self
            .store
            .get(SLOTS_COLLECTION, &appointment.slot_id)
            .await?
            .ok_or_else(|| {
                SchedulingError::Store(format!(
                    "Slot {} referenced by appointment {} is missing",
                    appointment.slot_id, appointment_id
                ))
            })?;
        let slot = AvailabilitySlot::from_document(&slot_doc)?;

        let mut cancelled = appointment.clone();
        cancelled.status = AppointmentStatus::Cancelled;

        let mut freed = slot.clone();
        freed.status = SlotStatus::Available;
        freed.patient_id = None;
        freed.held_by = None;
        freed.hold_expires_at = None;

        let mut tx = Transaction::new();
        tx.observe(APPOINTMENTS_COLLECTION, &appointment_doc);
        tx.observe(SLOTS_COLLECTION, &slot_doc);
        tx.update(
            APPOINTMENTS_COLLECTION,
            appointment_id,
            encode(&cancelled, "appointment")?,
        );
        tx.update(SLOTS_COLLECTION, &slot.id, encode(&freed, "slot")?);
        self.store.commit(tx).await?;

        info!(
            "Appointment {} cancelled by patient {}, slot {} freed",
            appointment_id, actor.id, slot.id
        );
        Ok(cancelled)
    }

    // --------------------------------------------------------------------------
    // Reschedule
    // --------------------------------------------------------------------------

    /// Retire one appointment/slot pair in favor of a new pair, preserving
    /// payment lineage. One transaction covers all four documents; either
    /// every write commits or none does.
    pub async fn reschedule(
        &self,
        old_appointment_id: &str,
        new_slot_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        self.run_with_retries("reschedule", || {
            self.try_reschedule(old_appointment_id, new_slot_id, actor)
        })
        .await
    }

    async fn try_reschedule(
        &self,
        old_appointment_id: &str,
        new_slot_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();

        let old_appointment_doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, old_appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        let old_appointment = Appointment::from_document(&old_appointment_doc)?;

        if old_appointment.patient_id != actor.id {
            return Err(SchedulingError::Forbidden);
        }
        if old_appointment.status != AppointmentStatus::Reserved {
            return Err(SchedulingError::InvalidStateTransition(old_appointment.status));
        }

        let new_slot_doc = self
            .store
            .get(SLOTS_COLLECTION, new_slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        let new_slot = AvailabilitySlot::from_document(&new_slot_doc)?;

        // The old slot is reserved, so it also rejects itself here.
        if !new_slot.is_bookable_by(&actor.id, now) {
            return Err(SchedulingError::SlotUnavailable);
        }

        let old_slot_doc = self
            .store
            .get(SLOTS_COLLECTION, &old_appointment.slot_id)
            .await?
            .ok_or_else(|| {
                SchedulingError::Store(format!(
                    "Slot {} referenced by appointment {} is missing",
                    old_appointment.slot_id, old_appointment_id
                ))
            })?;
        let old_slot = AvailabilitySlot::from_document(&old_slot_doc)?;

        let new_appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id: actor.id.clone(),
            patient_name: old_appointment.patient_name.clone(),
            doctor_id: new_slot.doctor_id.clone(),
            doctor_name: new_slot.doctor_name.clone(),
            specialty_name: new_slot.specialty_name.clone(),
            date: new_slot.date,
            start_time: new_slot.start_time,
            end_time: new_slot.end_time,
            slot_id: new_slot.id.clone(),
            status: AppointmentStatus::Reserved,
            reason: old_appointment.reason.clone(),
            // Payment lineage carries over; no new payment is collected.
            payment_id: old_appointment.payment_id.clone(),
            price: old_appointment.price,
            payment_method: old_appointment.payment_method.clone(),
            payment_date: old_appointment.payment_date,
            rescheduled_from: Some(old_appointment.id.clone()),
            clinical_record: None,
            created_at: now,
        };

        let mut retired = old_appointment.clone();
        retired.status = AppointmentStatus::Rescheduled;

        let mut freed_old_slot = old_slot.clone();
        freed_old_slot.status = SlotStatus::Available;
        freed_old_slot.patient_id = None;
        freed_old_slot.held_by = None;
        freed_old_slot.hold_expires_at = None;

        let mut taken_new_slot = new_slot.clone();
        taken_new_slot.status = SlotStatus::Reserved;
        taken_new_slot.patient_id = Some(actor.id.clone());
        taken_new_slot.held_by = None;
        taken_new_slot.hold_expires_at = None;

        let mut tx = Transaction::new();
        tx.observe(APPOINTMENTS_COLLECTION, &old_appointment_doc);
        tx.observe(SLOTS_COLLECTION, &old_slot_doc);
        tx.observe(SLOTS_COLLECTION, &new_slot_doc);
        tx.update(
            APPOINTMENTS_COLLECTION,
            old_appointment_id,
            encode(&retired, "appointment")?,
        );
        tx.update(
            SLOTS_COLLECTION,
            &old_slot.id,
            encode(&freed_old_slot, "slot")?,
        );
        tx.update(
            SLOTS_COLLECTION,
            &new_slot.id,
            encode(&taken_new_slot, "slot")?,
        );
        tx.create(
            APPOINTMENTS_COLLECTION,
            &new_appointment.id,
            encode(&new_appointment, "appointment")?,
        );
        self.store.commit(tx).await?;

        info!(
            "Appointment {} rescheduled to slot {} (new appointment {})",
            old_appointment_id, new_slot_id, new_appointment.id
        );
        Ok(new_appointment)
    }

    // --------------------------------------------------------------------------
    // Complete / no-show
    // --------------------------------------------------------------------------

    /// Complete a consultation: render the prescription document through the
    /// external renderer, then attach the clinical record. The slot stays
    /// reserved permanently as a historical record.
    pub async fn complete(
        &self,
        appointment_id: &str,
        actor: &Actor,
        request: &CompleteRequest,
    ) -> Result<Appointment, SchedulingError> {
        if request.diagnosis.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "A diagnosis is required".to_string(),
            ));
        }

        // Validate ownership and state before paying for the render call.
        let appointment = self.load_owned_reserved(appointment_id, actor).await?;

        let document_url = self
            .renderer
            .render(&PrescriptionDocumentRequest {
                appointment_id: appointment.id.clone(),
                patient_id: appointment.patient_id.clone(),
                patient_name: appointment.patient_name.clone(),
                doctor_name: appointment.doctor_name.clone(),
                diagnosis: request.diagnosis.clone(),
                prescription: request.prescription.clone(),
            })
            .await?;

        self.run_with_retries("complete", || {
            self.try_complete(appointment_id, actor, request, &document_url)
        })
        .await
    }

    async fn try_complete(
        &self,
        appointment_id: &str,
        actor: &Actor,
        request: &CompleteRequest,
        document_url: &str,
    ) -> Result<Appointment, SchedulingError> {
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        let appointment = Appointment::from_document(&doc)?;

        if appointment.doctor_id != actor.id {
            return Err(SchedulingError::Forbidden);
        }
        if appointment.status != AppointmentStatus::Reserved {
            return Err(SchedulingError::InvalidStateTransition(appointment.status));
        }

        let mut completed = appointment.clone();
        completed.status = AppointmentStatus::Completed;
        completed.clinical_record = Some(ClinicalRecord {
            diagnosis: request.diagnosis.clone(),
            notes: request.notes.clone(),
            prescription: request.prescription.clone(),
            document_url: document_url.to_string(),
            completed_at: Utc::now(),
        });

        let mut tx = Transaction::new();
        tx.observe(APPOINTMENTS_COLLECTION, &doc);
        tx.update(
            APPOINTMENTS_COLLECTION,
            appointment_id,
            encode(&completed, "appointment")?,
        );
        self.store.commit(tx).await?;

        info!(
            "Appointment {} completed by doctor {} with prescription document",
            appointment_id, actor.id
        );
        Ok(completed)
    }

    /// Mark a reserved appointment whose patient did not attend. The slot is
    /// untouched, like completion.
    pub async fn mark_no_show(
        &self,
        appointment_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        self.run_with_retries("mark_no_show", || self.try_mark_no_show(appointment_id, actor))
            .await
    }

    async fn try_mark_no_show(
        &self,
        appointment_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        let appointment = Appointment::from_document(&doc)?;

        if appointment.doctor_id != actor.id {
            return Err(SchedulingError::Forbidden);
        }
        if appointment.status != AppointmentStatus::Reserved {
            return Err(SchedulingError::InvalidStateTransition(appointment.status));
        }

        let mut marked = appointment.clone();
        marked.status = AppointmentStatus::NoShow;

        let mut tx = Transaction::new();
        tx.observe(APPOINTMENTS_COLLECTION, &doc);
        tx.update(
            APPOINTMENTS_COLLECTION,
            appointment_id,
            encode(&marked, "appointment")?,
        );
        self.store.commit(tx).await?;

        info!("Appointment {} marked as no-show by doctor {}", appointment_id, actor.id);
        Ok(marked)
    }

    async fn load_owned_reserved(
        &self,
        appointment_id: &str,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        let appointment = Appointment::from_document(&doc)?;

        if appointment.doctor_id != actor.id {
            return Err(SchedulingError::Forbidden);
        }
        if appointment.status != AppointmentStatus::Reserved {
            return Err(SchedulingError::InvalidStateTransition(appointment.status));
        }
        Ok(appointment)
    }
}

fn encode<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, SchedulingError> {
    serde_json::to_value(value)
        .map_err(|e| SchedulingError::Store(format!("Failed to encode {}: {}", what, e)))
}
