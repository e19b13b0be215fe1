// libs/scheduling-cell/src/services/queries.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use shared_store::AtomicStore;

use crate::models::{Appointment, AppointmentStatus, AvailabilitySlot, SchedulingError};
use crate::services::appointments::AppointmentRepository;
use crate::services::slots::SlotRepository;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangeFilter {
    Today,
    ThisWeek,
    ThisMonth,
    All,
}

impl DateRangeFilter {
    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            DateRangeFilter::Today => date == today,
            DateRangeFilter::ThisWeek => {
                date.iso_week() == today.iso_week() && date.year() == today.year()
            }
            DateRangeFilter::ThisMonth => {
                date.month() == today.month() && date.year() == today.year()
            }
            DateRangeFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub range: Option<DateRangeFilter>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

/// What a patient gets to see of their own completed consultations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientHistoryEntry {
    pub id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub doctor_name: String,
    pub diagnosis: Option<String>,
    pub document_url: Option<String>,
}

/// Read-side filters over slots and appointments. No atomicity requirements;
/// eventual consistency with the write path is acceptable.
pub struct SchedulingQueryService {
    slots: SlotRepository,
    appointments: AppointmentRepository,
}

impl SchedulingQueryService {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self {
            slots: SlotRepository::new(store.clone()),
            appointments: AppointmentRepository::new(store),
        }
    }

    pub async fn available_slots(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        self.slots.list_available(doctor_id).await
    }

    pub async fn patient_appointments(
        &self,
        patient_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.appointments.list_by_patient(patient_id, status).await
    }

    /// A patient's clinical history: completed consultations, newest first,
    /// trimmed to the fields a patient should see.
    pub async fn patient_history(
        &self,
        patient_id: &str,
    ) -> Result<Vec<PatientHistoryEntry>, SchedulingError> {
        let mut completed = self
            .appointments
            .list_by_patient(patient_id, Some(AppointmentStatus::Completed))
            .await?;
        completed.sort_by(|a, b| (b.date, b.start_time).cmp(&(a.date, a.start_time)));

        Ok(completed
            .into_iter()
            .map(|a| PatientHistoryEntry {
                id: a.id,
                date: a.date,
                start_time: a.start_time,
                doctor_name: a.doctor_name,
                diagnosis: a.clinical_record.as_ref().map(|r| r.diagnosis.clone()),
                document_url: a.clinical_record.as_ref().map(|r| r.document_url.clone()),
            })
            .collect())
    }

    /// A doctor's live schedule: reserved appointments, optionally only
    /// today's.
    pub async fn doctor_schedule(
        &self,
        doctor_id: &str,
        today_only: bool,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let date = today_only.then(|| Utc::now().date_naive());
        let mut appointments = self.appointments.list_by_doctor(doctor_id, date).await?;
        appointments.retain(|a| a.status == AppointmentStatus::Reserved);
        Ok(appointments)
    }

    /// Admin search across all appointments: date-range bucket plus prefix
    /// match on patient or doctor name, newest first.
    pub async fn search(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Searching appointments with filters: {:?}", query);
        let today = Utc::now().date_naive();
        let range = query.range.unwrap_or(DateRangeFilter::All);

        let mut results = self.appointments.list_all().await?;
        results.retain(|a| range.contains(a.date, today));
        if let Some(prefix) = query.patient_name.as_deref() {
            results.retain(|a| a.patient_name.starts_with(prefix));
        }
        if let Some(prefix) = query.doctor_name.as_deref() {
            results.retain(|a| a.doctor_name.starts_with(prefix));
        }
        results.sort_by(|a, b| (b.date, b.start_time).cmp(&(a.date, a.start_time)));
        Ok(results)
    }
}
