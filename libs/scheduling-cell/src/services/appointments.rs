// libs/scheduling-cell/src/services/appointments.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use shared_store::AtomicStore;

use crate::models::{
    Appointment, AppointmentStatus, SchedulingError, APPOINTMENTS_COLLECTION,
};

/// Read-only access to appointments. All mutation goes through
/// `ReservationCoordinator`.
pub struct AppointmentRepository {
    store: Arc<dyn AtomicStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Appointment, SchedulingError> {
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;
        Appointment::from_document(&doc)
    }

    pub async fn list_by_patient(
        &self,
        patient_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Listing appointments for patient {}", patient_id);
        let mut appointments = self.list_all().await?;
        appointments.retain(|a| a.patient_id == patient_id);
        if let Some(status) = status {
            appointments.retain(|a| a.status == status);
        }
        appointments.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(appointments)
    }

    pub async fn list_by_doctor(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Listing appointments for doctor {}", doctor_id);
        let mut appointments = self.list_all().await?;
        appointments.retain(|a| a.doctor_id == doctor_id);
        if let Some(date) = date {
            appointments.retain(|a| a.date == date);
        }
        appointments.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(appointments)
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let docs = self.store.list(APPOINTMENTS_COLLECTION).await?;
        docs.iter().map(Appointment::from_document).collect()
    }
}
