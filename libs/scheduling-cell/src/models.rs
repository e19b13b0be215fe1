// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use shared_models::error::AppError;
use shared_store::{Document, StoreError};

pub const SLOTS_COLLECTION: &str = "slots";
pub const APPOINTMENTS_COLLECTION: &str = "appointments";
pub const PAYMENT_CONFIRMATIONS_COLLECTION: &str = "payment_confirmations";

// ==============================================================================
// AVAILABILITY SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    /// Soft-held while a payment intent is pending; expires automatically.
    Held,
    Reserved,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Held => write!(f, "held"),
            SlotStatus::Reserved => write!(f, "reserved"),
        }
    }
}

/// A bookable (doctor, date, time-range) unit. Doctor and specialty names are
/// denormalized at write time; renaming a doctor does not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub specialty_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub patient_id: Option<String>,
    pub held_by: Option<String>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn from_document(doc: &Document) -> Result<Self, SchedulingError> {
        let mut slot: AvailabilitySlot = serde_json::from_value(doc.data.clone())
            .map_err(|e| SchedulingError::Store(format!("Failed to parse slot: {}", e)))?;
        slot.id = doc.id.clone();
        Ok(slot)
    }

    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Held
            && self.hold_expires_at.map(|exp| exp <= now).unwrap_or(true)
    }

    /// A slot can be taken by a patient when it is available, when its hold
    /// has lapsed, or when the hold belongs to that same patient.
    pub fn is_bookable_by(&self, patient_id: &str, now: DateTime<Utc>) -> bool {
        match self.status {
            SlotStatus::Available => true,
            SlotStatus::Held => {
                self.held_by.as_deref() == Some(patient_id) || self.hold_expired(now)
            }
            SlotStatus::Reserved => false,
        }
    }

    pub fn is_deletable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SlotStatus::Available => true,
            SlotStatus::Held => self.hold_expired(now),
            SlotStatus::Reserved => false,
        }
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Reserved,
    Cancelled,
    Rescheduled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// The state machine is one-directional: `reserved` is the only live
    /// state, everything else is terminal.
    pub fn valid_transitions(&self) -> Vec<AppointmentStatus> {
        match self {
            AppointmentStatus::Reserved => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Rescheduled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            _ => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Reserved)
    }

    pub fn can_transition_to(&self, next: &AppointmentStatus) -> bool {
        self.valid_transitions().contains(next)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Reserved => write!(f, "reserved"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionItem {
    pub drug: String,
    pub dose: String,
    pub frequency: String,
    pub duration: String,
}

/// Clinical outcome attached when a doctor completes an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescription: Vec<PrescriptionItem>,
    pub document_url: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub specialty_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// The slot this appointment consumes. Never changes after creation;
    /// rescheduling spawns a new appointment on a new slot.
    pub slot_id: String,
    pub status: AppointmentStatus,
    pub reason: String,
    pub payment_id: Option<String>,
    pub price: Option<f64>,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub rescheduled_from: Option<String>,
    pub clinical_record: Option<ClinicalRecord>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn from_document(doc: &Document) -> Result<Self, SchedulingError> {
        let mut appointment: Appointment = serde_json::from_value(doc.data.clone())
            .map_err(|e| SchedulingError::Store(format!("Failed to parse appointment: {}", e)))?;
        appointment.id = doc.id.clone();
        Ok(appointment)
    }
}

/// Marker written in the same transaction as a payment-backed reservation,
/// keyed by payment id, so a payment can never produce two appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub appointment_id: String,
    pub confirmed_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    /// Required when an admin creates a slot on a doctor's behalf; a doctor
    /// always creates slots for themselves.
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub specialty_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub doctor_id: String,
    pub doctor_name: String,
    pub specialty_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub price: f64,
    pub method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub slot_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub reason: String,
    pub payment: Option<PaymentDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub diagnosis: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub prescription: Vec<PrescriptionItem>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Slot not found")]
    SlotNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Slot is no longer available")]
    SlotUnavailable,

    #[error("Concurrent update conflict")]
    TransactionConflict,

    #[error("Not allowed to modify this resource")]
    Forbidden,

    #[error("Operation not allowed while appointment is {0}")]
    InvalidStateTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for SchedulingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict => SchedulingError::TransactionConflict,
            other => SchedulingError::Store(other.to_string()),
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::SlotNotFound => AppError::NotFound("Slot not found".to_string()),
            SchedulingError::AppointmentNotFound => {
                AppError::NotFound("Appointment not found".to_string())
            }
            SchedulingError::SlotUnavailable => {
                AppError::Conflict("Slot is no longer available".to_string())
            }
            SchedulingError::TransactionConflict => {
                AppError::Conflict("Concurrent update, please retry".to_string())
            }
            SchedulingError::Forbidden => {
                AppError::Forbidden("You do not own this resource".to_string())
            }
            SchedulingError::InvalidStateTransition(status) => AppError::BadRequest(format!(
                "Operation not allowed while appointment is {}",
                status
            )),
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::ExternalService(msg) => AppError::ExternalService(msg),
            SchedulingError::Store(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slot(status: SlotStatus) -> AvailabilitySlot {
        AvailabilitySlot {
            id: "slot-1".to_string(),
            doctor_id: "doc-1".to_string(),
            doctor_name: "Dr. Soto".to_string(),
            specialty_name: "Cardiology".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            status,
            patient_id: None,
            held_by: None,
            hold_expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reserved_is_the_only_live_status() {
        assert!(!AppointmentStatus::Reserved.is_terminal());
        for terminal in [
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
        ] {
            assert!(terminal.is_terminal());
            assert!(terminal.valid_transitions().is_empty());
        }
    }

    #[test]
    fn reserved_transitions_to_every_terminal() {
        let reserved = AppointmentStatus::Reserved;
        assert!(reserved.can_transition_to(&AppointmentStatus::Cancelled));
        assert!(reserved.can_transition_to(&AppointmentStatus::Rescheduled));
        assert!(reserved.can_transition_to(&AppointmentStatus::Completed));
        assert!(reserved.can_transition_to(&AppointmentStatus::NoShow));
        assert!(!reserved.can_transition_to(&AppointmentStatus::Reserved));
    }

    #[test]
    fn available_slot_is_bookable_by_anyone() {
        let now = Utc::now();
        assert!(slot(SlotStatus::Available).is_bookable_by("patient-1", now));
    }

    #[test]
    fn live_hold_blocks_other_patients_but_not_the_holder() {
        let now = Utc::now();
        let mut held = slot(SlotStatus::Held);
        held.held_by = Some("patient-1".to_string());
        held.hold_expires_at = Some(now + Duration::minutes(10));

        assert!(held.is_bookable_by("patient-1", now));
        assert!(!held.is_bookable_by("patient-2", now));
        assert!(!held.is_deletable(now));
    }

    #[test]
    fn expired_hold_behaves_as_available() {
        let now = Utc::now();
        let mut held = slot(SlotStatus::Held);
        held.held_by = Some("patient-1".to_string());
        held.hold_expires_at = Some(now - Duration::minutes(1));

        assert!(held.is_bookable_by("patient-2", now));
        assert!(held.is_deletable(now));
    }

    #[test]
    fn reserved_slot_is_never_bookable() {
        let now = Utc::now();
        let mut reserved = slot(SlotStatus::Reserved);
        reserved.patient_id = Some("patient-1".to_string());
        assert!(!reserved.is_bookable_by("patient-1", now));
        assert!(!reserved.is_deletable(now));
    }
}
