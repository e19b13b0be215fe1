// libs/scheduling-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_store::{AtomicStore, Transaction};

use crate::models::{
    AvailabilitySlot, NewSlot, SchedulingError, SlotStatus, SLOTS_COLLECTION,
};

/// CRUD over availability slots. Slots are only ever mutated by
/// `ReservationCoordinator` transactions; this repository creates, reads and
/// deletes them.
pub struct SlotRepository {
    store: Arc<dyn AtomicStore>,
}

impl SlotRepository {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_slot: NewSlot) -> Result<AvailabilitySlot, SchedulingError> {
        if new_slot.doctor_id.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "A doctor id is required".to_string(),
            ));
        }
        if new_slot.doctor_name.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "A doctor name is required".to_string(),
            ));
        }
        if new_slot.end_time <= new_slot.start_time {
            return Err(SchedulingError::Validation(
                "Slot end time must be after its start time".to_string(),
            ));
        }

        // No overlap check against the doctor's other slots is performed here.
        let slot = AvailabilitySlot {
            id: Uuid::new_v4().to_string(),
            doctor_id: new_slot.doctor_id,
            doctor_name: new_slot.doctor_name,
            specialty_name: new_slot.specialty_name,
            date: new_slot.date,
            start_time: new_slot.start_time,
            end_time: new_slot.end_time,
            status: SlotStatus::Available,
            patient_id: None,
            held_by: None,
            hold_expires_at: None,
            created_at: Utc::now(),
        };

        let data = serde_json::to_value(&slot)
            .map_err(|e| SchedulingError::Store(format!("Failed to encode slot: {}", e)))?;
        let mut tx = Transaction::new();
        tx.create(SLOTS_COLLECTION, &slot.id, data);
        self.store.commit(tx).await?;

        info!(
            "Created slot {} for doctor {} on {}",
            slot.id, slot.doctor_id, slot.date
        );
        Ok(slot)
    }

    pub async fn get(&self, id: &str) -> Result<AvailabilitySlot, SchedulingError> {
        let doc = self
            .store
            .get(SLOTS_COLLECTION, id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        AvailabilitySlot::from_document(&doc)
    }

    /// Slots a patient could book right now: available ones plus lapsed
    /// holds, ordered by date then start time.
    pub async fn list_available(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        let now = Utc::now();
        let mut slots = self.list_all(doctor_id).await?;
        slots.retain(|s| s.status == SlotStatus::Available || s.hold_expired(now));
        Ok(slots)
    }

    pub async fn list_all(&self, doctor_id: &str) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        debug!("Listing slots for doctor {}", doctor_id);
        let docs = self.store.list(SLOTS_COLLECTION).await?;
        let mut slots = docs
            .iter()
            .map(AvailabilitySlot::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        slots.retain(|s| s.doctor_id == doctor_id);
        slots.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(slots)
    }

    /// Remove an unbooked slot. A reserved slot must have its appointment
    /// cancelled first; the delete runs as a CAS transaction so a concurrent
    /// reservation aborts it.
    pub async fn delete(&self, id: &str) -> Result<(), SchedulingError> {
        let doc = self
            .store
            .get(SLOTS_COLLECTION, id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        let slot = AvailabilitySlot::from_document(&doc)?;

        if !slot.is_deletable(Utc::now()) {
            return Err(SchedulingError::SlotUnavailable);
        }

        let mut tx = Transaction::new();
        tx.observe(SLOTS_COLLECTION, &doc);
        tx.delete(SLOTS_COLLECTION, id);
        self.store.commit(tx).await?;

        info!("Deleted slot {} of doctor {}", id, slot.doctor_id);
        Ok(())
    }
}
