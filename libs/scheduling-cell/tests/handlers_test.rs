use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};

use scheduling_cell::handlers;
use scheduling_cell::models::{CreateSlotRequest, SchedulingError};
use scheduling_cell::services::documents::{PrescriptionDocumentRequest, PrescriptionRenderer};
use scheduling_cell::SchedulingContext;
use shared_models::actor::Actor;
use shared_models::error::AppError;
use shared_store::MemoryStore;
use shared_utils::test_utils::{TestActor, TestConfig};

struct FakeRenderer;

#[async_trait]
impl PrescriptionRenderer for FakeRenderer {
    async fn render(&self, _: &PrescriptionDocumentRequest) -> Result<String, SchedulingError> {
        Ok("https://documents.test/prescription.pdf".to_string())
    }
}

fn test_context() -> Arc<SchedulingContext> {
    Arc::new(SchedulingContext {
        config: TestConfig::default().to_arc(),
        store: Arc::new(MemoryStore::new()),
        renderer: Arc::new(FakeRenderer),
    })
}

fn slot_request() -> CreateSlotRequest {
    CreateSlotRequest {
        doctor_id: None,
        doctor_name: None,
        specialty_name: "General Medicine".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    }
}

fn extension(actor: &Actor) -> Extension<Actor> {
    Extension(actor.clone())
}

#[tokio::test]
async fn doctors_create_slots_for_themselves() {
    let ctx = test_context();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();

    let Json(body) = handlers::create_slot(
        State(ctx),
        extension(&doctor),
        Json(slot_request()),
    )
    .await
    .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["slot"]["doctor_id"], doctor.id);
    assert_eq!(body["slot"]["doctor_name"], "Dr. Soto");
    assert_eq!(body["slot"]["status"], "available");
}

#[tokio::test]
async fn patients_cannot_create_slots() {
    let ctx = test_context();
    let patient = TestActor::patient("Ana Torres").to_actor();

    let err = handlers::create_slot(
        State(ctx),
        extension(&patient),
        Json(slot_request()),
    )
    .await
    .unwrap_err();

    assert_matches!(err, AppError::Forbidden(_));
}

#[tokio::test]
async fn admins_must_name_the_doctor() {
    let ctx = test_context();
    let admin = TestActor::admin("Root").to_actor();

    let err = handlers::create_slot(
        State(ctx.clone()),
        extension(&admin),
        Json(slot_request()),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::BadRequest(_));

    let mut request = slot_request();
    request.doctor_id = Some("doctor-7".to_string());
    request.doctor_name = Some("Dr. Vega".to_string());

    let Json(body) = handlers::create_slot(State(ctx), extension(&admin), Json(request))
        .await
        .unwrap();
    assert_eq!(body["slot"]["doctor_id"], "doctor-7");
}

#[tokio::test]
async fn agenda_is_private_to_its_doctor_and_admins() {
    let ctx = test_context();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let other = TestActor::doctor("Dr. Vega").to_actor();
    let admin = TestActor::admin("Root").to_actor();

    let err = handlers::doctor_agenda(
        State(ctx.clone()),
        Path(doctor.id.clone()),
        extension(&other),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    handlers::doctor_agenda(
        State(ctx.clone()),
        Path(doctor.id.clone()),
        extension(&doctor),
    )
    .await
    .unwrap();

    handlers::doctor_agenda(State(ctx), Path(doctor.id.clone()), extension(&admin))
        .await
        .unwrap();
}

#[tokio::test]
async fn search_is_admin_only() {
    let ctx = test_context();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let admin = TestActor::admin("Root").to_actor();

    let err = handlers::search_appointments(
        State(ctx.clone()),
        Query(Default::default()),
        extension(&doctor),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    let Json(body) = handlers::search_appointments(
        State(ctx),
        Query(Default::default()),
        extension(&admin),
    )
    .await
    .unwrap();
    assert_eq!(body["appointments"], serde_json::json!([]));
}

#[tokio::test]
async fn lifecycle_routes_gate_by_role() {
    let ctx = test_context();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();

    // A doctor does not cancel through the patient route.
    let err = handlers::cancel_appointment(
        State(ctx.clone()),
        Path("appointment-1".to_string()),
        extension(&doctor),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    // A patient does not mark no-shows.
    let err = handlers::mark_no_show(
        State(ctx),
        Path("appointment-1".to_string()),
        extension(&patient),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));
}
