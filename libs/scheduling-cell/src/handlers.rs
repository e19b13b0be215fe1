// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::actor::{Actor, ActorRole};
use shared_models::error::AppError;

use crate::models::{
    AppointmentStatus, CompleteRequest, CreateSlotRequest, NewSlot, RescheduleRequest,
};
use crate::services::appointments::AppointmentRepository;
use crate::services::queries::{AppointmentSearchQuery, SchedulingQueryService};
use crate::services::reservation::ReservationCoordinator;
use crate::services::slots::SlotRepository;
use crate::SchedulingContext;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MyAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorScheduleQuery {
    pub filter: Option<String>,
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

/// A doctor creates availability for themselves; an admin creates it on a
/// named doctor's behalf.
#[axum::debug_handler]
pub async fn create_slot(
    State(ctx): State<Arc<SchedulingContext>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let new_slot = match actor.role {
        ActorRole::Doctor => NewSlot {
            doctor_id: actor.id.clone(),
            doctor_name: actor.name.clone(),
            specialty_name: request.specialty_name,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
        },
        ActorRole::Admin => {
            let doctor_id = request.doctor_id.ok_or_else(|| {
                AppError::BadRequest("An admin must specify a doctor_id".to_string())
            })?;
            let doctor_name = request.doctor_name.ok_or_else(|| {
                AppError::BadRequest("An admin must specify a doctor_name".to_string())
            })?;
            NewSlot {
                doctor_id,
                doctor_name,
                specialty_name: request.specialty_name,
                date: request.date,
                start_time: request.start_time,
                end_time: request.end_time,
            }
        }
        ActorRole::Patient => {
            return Err(AppError::Forbidden(
                "Only doctors or admins can create slots".to_string(),
            ))
        }
    };

    let slots = SlotRepository::new(ctx.store.clone());
    let slot = slots.create(new_slot).await?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(slot_id): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let slots = SlotRepository::new(ctx.store.clone());

    let slot = slots.get(&slot_id).await?;
    if !actor.is_admin() && slot.doctor_id != actor.id {
        return Err(AppError::Forbidden(
            "You do not own this slot".to_string(),
        ));
    }

    slots.delete(&slot_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Slot deleted"
    })))
}

#[axum::debug_handler]
pub async fn list_available_slots(
    State(ctx): State<Arc<SchedulingContext>>,
    Query(query): Query<AvailableSlotsQuery>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients browse bookable slots".to_string(),
        ));
    }

    let queries = SchedulingQueryService::new(ctx.store.clone());
    let slots = queries.available_slots(&query.doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "slots": slots
    })))
}

/// Full agenda of one doctor, including held and reserved slots. Visible to
/// that doctor and to admins.
#[axum::debug_handler]
pub async fn doctor_agenda(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(doctor_id): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_admin() && actor.id != doctor_id {
        return Err(AppError::Forbidden(
            "You cannot view this agenda".to_string(),
        ));
    }

    let slots = SlotRepository::new(ctx.store.clone());
    let agenda = slots.list_all(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "slots": agenda
    })))
}

// ==============================================================================
// APPOINTMENT READ HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn my_appointments(
    State(ctx): State<Arc<SchedulingContext>>,
    Query(query): Query<MyAppointmentsQuery>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden("Patients only".to_string()));
    }

    let queries = SchedulingQueryService::new(ctx.store.clone());
    let appointments = queries.patient_appointments(&actor.id, query.status).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn my_history(
    State(ctx): State<Arc<SchedulingContext>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden("Patients only".to_string()));
    }

    let queries = SchedulingQueryService::new(ctx.store.clone());
    let history = queries.patient_history(&actor.id).await?;

    Ok(Json(json!({
        "success": true,
        "history": history
    })))
}

#[axum::debug_handler]
pub async fn doctor_appointments(
    State(ctx): State<Arc<SchedulingContext>>,
    Query(query): Query<DoctorScheduleQuery>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_doctor() {
        return Err(AppError::Forbidden("Doctors only".to_string()));
    }

    let today_only = query.filter.as_deref() == Some("today");
    let queries = SchedulingQueryService::new(ctx.store.clone());
    let appointments = queries.doctor_schedule(&actor.id, today_only).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(ctx): State<Arc<SchedulingContext>>,
    Query(query): Query<AppointmentSearchQuery>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden("Admins only".to_string()));
    }

    let queries = SchedulingQueryService::new(ctx.store.clone());
    let appointments = queries.search(&query).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

// ==============================================================================
// APPOINTMENT MUTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden("Patients only".to_string()));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let appointment = coordinator.cancel(&appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled, the slot has been freed"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<String>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden("Patients only".to_string()));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let appointment = coordinator
        .reschedule(&appointment_id, &request.new_slot_id, &actor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<String>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_doctor() {
        return Err(AppError::Forbidden("Doctors only".to_string()));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let appointment = coordinator
        .complete(&appointment_id, &actor, &request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed and prescription document generated"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_doctor() {
        return Err(AppError::Forbidden("Doctors only".to_string()));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let appointment = coordinator.mark_no_show(&appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(ctx): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentRepository::new(ctx.store.clone());
    let appointment = appointments.get(&appointment_id).await?;

    let owns_it = appointment.patient_id == actor.id || appointment.doctor_id == actor.id;
    if !owns_it && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "You do not own this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
