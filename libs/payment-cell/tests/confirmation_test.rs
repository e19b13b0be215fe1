use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use payment_cell::models::{
    BookingConfirmation, ConfirmPaymentRequest, CreatePaymentIntentRequest, PaymentError,
    PaymentIntentHandle, PaymentIntentSpec, PaymentMetadata, PaymentStatus, VerifiedPayment,
};
use payment_cell::services::confirmation::PaymentConfirmationHandler;
use payment_cell::services::gateway::PaymentGateway;
use payment_cell::services::intent::PaymentIntentService;
use payment_cell::services::notifications::ConfirmationNotifier;

use scheduling_cell::models::{
    AppointmentStatus, AvailabilitySlot, NewSlot, ReserveRequest, SchedulingError, SlotStatus,
    APPOINTMENTS_COLLECTION,
};
use scheduling_cell::services::documents::{PrescriptionDocumentRequest, PrescriptionRenderer};
use scheduling_cell::services::reservation::ReservationCoordinator;
use scheduling_cell::services::slots::SlotRepository;
use shared_models::actor::Actor;
use shared_store::{AtomicStore, MemoryStore};
use shared_utils::test_utils::{TestActor, TestConfig};

// ==============================================================================
// TEST DOUBLES
// ==============================================================================

struct FakeRenderer;

#[async_trait]
impl PrescriptionRenderer for FakeRenderer {
    async fn render(&self, _: &PrescriptionDocumentRequest) -> Result<String, SchedulingError> {
        Ok("https://documents.test/prescription.pdf".to_string())
    }
}

#[derive(Default)]
struct FakeGateway {
    payments: Mutex<HashMap<String, VerifiedPayment>>,
    intents: Mutex<HashMap<String, PaymentMetadata>>,
    fail_intent_creation: bool,
}

impl FakeGateway {
    fn with_approved_payment(payment_id: &str, metadata: PaymentMetadata) -> (Self, String) {
        let gateway = Self::default();
        gateway.payments.lock().unwrap().insert(
            payment_id.to_string(),
            VerifiedPayment {
                id: payment_id.to_string(),
                status: PaymentStatus::Approved,
                amount: 8.0,
                method: Some("credit_card".to_string()),
                approved_at: Some(Utc::now()),
            },
        );
        let intent_id = Uuid::new_v4().to_string();
        gateway
            .intents
            .lock()
            .unwrap()
            .insert(intent_id.clone(), metadata);
        (gateway, intent_id)
    }

    fn set_payment_status(&self, payment_id: &str, status: PaymentStatus) {
        self.payments
            .lock()
            .unwrap()
            .get_mut(payment_id)
            .unwrap()
            .status = status;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        spec: &PaymentIntentSpec,
    ) -> Result<PaymentIntentHandle, PaymentError> {
        if self.fail_intent_creation {
            return Err(PaymentError::Gateway("gateway down".to_string()));
        }
        let intent_id = Uuid::new_v4().to_string();
        self.intents
            .lock()
            .unwrap()
            .insert(intent_id.clone(), spec.metadata.clone());
        Ok(PaymentIntentHandle {
            init_point: format!("https://gateway.test/checkout/{}", intent_id),
            intent_id,
        })
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<VerifiedPayment, PaymentError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or(PaymentError::IntentNotFound)
    }

    async fn intent_metadata(&self, intent_id: &str) -> Result<PaymentMetadata, PaymentError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or(PaymentError::IntentNotFound)
    }
}

#[derive(Default)]
struct CountingNotifier {
    sent: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl ConfirmationNotifier for CountingNotifier {
    async fn booking_confirmed(&self, _: &BookingConfirmation) -> Result<(), PaymentError> {
        if self.fail {
            return Err(PaymentError::Notification("smtp down".to_string()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn new_store() -> Arc<dyn AtomicStore> {
    Arc::new(MemoryStore::new())
}

fn coordinator(store: &Arc<dyn AtomicStore>) -> ReservationCoordinator {
    ReservationCoordinator::new(store.clone(), Arc::new(FakeRenderer))
}

async fn seed_slot(store: &Arc<dyn AtomicStore>, doctor: &Actor) -> AvailabilitySlot {
    SlotRepository::new(store.clone())
        .create(NewSlot {
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            specialty_name: "General Medicine".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        })
        .await
        .unwrap()
}

fn handler(
    store: &Arc<dyn AtomicStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ConfirmationNotifier>,
) -> PaymentConfirmationHandler {
    PaymentConfirmationHandler::new(store.clone(), coordinator(store), gateway, notifier)
}

fn metadata_for(patient: &Actor, slot: &AvailabilitySlot, reason: &str) -> PaymentMetadata {
    PaymentMetadata {
        patient_id: patient.id.clone(),
        slot_id: slot.id.clone(),
        reason: reason.to_string(),
    }
}

async fn count_appointments(store: &Arc<dyn AtomicStore>) -> usize {
    store.list(APPOINTMENTS_COLLECTION).await.unwrap().len()
}

// ==============================================================================
// CONFIRMATION TESTS
// ==============================================================================

#[tokio::test]
async fn approved_payment_reserves_the_slot_with_payment_details() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let notifier = Arc::new(CountingNotifier::default());
    let handler = handler(&store, Arc::new(gateway), notifier.clone());

    let appointment = handler
        .confirm(
            &patient,
            &ConfirmPaymentRequest {
                payment_id: "pay-1".to_string(),
                status: "approved".to_string(),
                intent_id,
            },
        )
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Reserved);
    assert_eq!(appointment.payment_id, Some("pay-1".to_string()));
    assert_eq!(appointment.price, Some(8.0));
    assert_eq!(appointment.payment_method, Some("credit_card".to_string()));
    assert_eq!(appointment.reason, "fever");

    let updated = SlotRepository::new(store.clone()).get(&slot.id).await.unwrap();
    assert_eq!(updated.status, SlotStatus::Reserved);
    assert_eq!(updated.patient_id, Some(patient.id.clone()));

    assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_confirmation_for_same_payment_is_a_noop() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let notifier = Arc::new(CountingNotifier::default());
    let handler = handler(&store, Arc::new(gateway), notifier.clone());

    let request = ConfirmPaymentRequest {
        payment_id: "pay-1".to_string(),
        status: "approved".to_string(),
        intent_id,
    };

    let first = handler.confirm(&patient, &request).await.unwrap();
    let second = handler.confirm(&patient, &request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(count_appointments(&store).await, 1);
    // Only the first confirmation notifies.
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn racing_duplicate_confirmations_yield_one_appointment() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
    let notifier = Arc::new(CountingNotifier::default());
    let handler_a = handler(&store, gateway.clone(), notifier.clone());
    let handler_b = handler(&store, gateway, notifier.clone());

    let request = ConfirmPaymentRequest {
        payment_id: "pay-1".to_string(),
        status: "approved".to_string(),
        intent_id,
    };

    let (a, b) = tokio::join!(
        handler_a.confirm(&patient, &request),
        handler_b.confirm(&patient, &request),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(count_appointments(&store).await, 1);
}

#[tokio::test]
async fn declared_outcome_alone_is_never_trusted() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    // The gateway says rejected even though the client claims approved.
    gateway.set_payment_status("pay-1", PaymentStatus::Rejected);
    let handler = handler(
        &store,
        Arc::new(gateway),
        Arc::new(CountingNotifier::default()),
    );

    let err = handler
        .confirm(
            &patient,
            &ConfirmPaymentRequest {
                payment_id: "pay-1".to_string(),
                status: "approved".to_string(),
                intent_id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::NotApproved);

    assert_eq!(count_appointments(&store).await, 0);
    let untouched = SlotRepository::new(store.clone()).get(&slot.id).await.unwrap();
    assert_eq!(untouched.status, SlotStatus::Available);
}

#[tokio::test]
async fn declined_client_status_short_circuits() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let handler = handler(
        &store,
        Arc::new(gateway),
        Arc::new(CountingNotifier::default()),
    );

    let err = handler
        .confirm(
            &patient,
            &ConfirmPaymentRequest {
                payment_id: "pay-1".to_string(),
                status: "rejected".to_string(),
                intent_id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::NotApproved);
    assert_eq!(count_appointments(&store).await, 0);
}

#[tokio::test]
async fn confirmation_by_a_different_patient_is_forbidden() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let rival = TestActor::patient("Bruno Paredes").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let handler = handler(
        &store,
        Arc::new(gateway),
        Arc::new(CountingNotifier::default()),
    );

    let err = handler
        .confirm(
            &rival,
            &ConfirmPaymentRequest {
                payment_id: "pay-1".to_string(),
                status: "approved".to_string(),
                intent_id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::Forbidden);
    assert_eq!(count_appointments(&store).await, 0);
}

#[tokio::test]
async fn notifier_failure_never_unbooks() {
    let store = new_store();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let (gateway, intent_id) =
        FakeGateway::with_approved_payment("pay-1", metadata_for(&patient, &slot, "fever"));
    let notifier = Arc::new(CountingNotifier {
        sent: AtomicUsize::new(0),
        fail: true,
    });
    let handler = handler(&store, Arc::new(gateway), notifier);

    let appointment = handler
        .confirm(
            &patient,
            &ConfirmPaymentRequest {
                payment_id: "pay-1".to_string(),
                status: "approved".to_string(),
                intent_id,
            },
        )
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Reserved);
    let reserved = SlotRepository::new(store.clone()).get(&slot.id).await.unwrap();
    assert_eq!(reserved.status, SlotStatus::Reserved);
}

// ==============================================================================
// PAYMENT INTENT TESTS
// ==============================================================================

#[tokio::test]
async fn intent_creation_holds_the_slot_for_the_payer() {
    let store = new_store();
    let config = TestConfig::default().to_arc();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let rival = TestActor::patient("Bruno Paredes").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway::default());
    let service = PaymentIntentService::new(config, coordinator(&store), gateway);

    let handle = service
        .create_intent(
            &patient,
            &CreatePaymentIntentRequest {
                slot_id: slot.id.clone(),
                reason: "fever".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(handle.init_point.contains(&handle.intent_id));

    let held = SlotRepository::new(store.clone()).get(&slot.id).await.unwrap();
    assert_eq!(held.status, SlotStatus::Held);
    assert_eq!(held.held_by, Some(patient.id.clone()));

    // The window is closed for everyone else.
    let err = coordinator(&store)
        .reserve(&ReserveRequest {
            slot_id: slot.id.clone(),
            patient_id: rival.id.clone(),
            patient_name: rival.name.clone(),
            reason: "checkup".to_string(),
            payment: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::SlotUnavailable);
}

#[tokio::test]
async fn gateway_failure_releases_the_hold() {
    let store = new_store();
    let config = TestConfig::default().to_arc();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway {
        fail_intent_creation: true,
        ..FakeGateway::default()
    });
    let service = PaymentIntentService::new(config, coordinator(&store), gateway);

    let err = service
        .create_intent(
            &patient,
            &CreatePaymentIntentRequest {
                slot_id: slot.id.clone(),
                reason: "fever".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::Gateway(_));

    let released = SlotRepository::new(store.clone()).get(&slot.id).await.unwrap();
    assert_eq!(released.status, SlotStatus::Available);
    assert_eq!(released.held_by, None);
}

#[tokio::test]
async fn intent_for_a_reserved_slot_is_rejected() {
    let store = new_store();
    let config = TestConfig::default().to_arc();
    let doctor = TestActor::doctor("Dr. Soto").to_actor();
    let patient = TestActor::patient("Ana Torres").to_actor();
    let rival = TestActor::patient("Bruno Paredes").to_actor();
    let slot = seed_slot(&store, &doctor).await;

    coordinator(&store)
        .reserve(&ReserveRequest {
            slot_id: slot.id.clone(),
            patient_id: rival.id.clone(),
            patient_name: rival.name.clone(),
            reason: "checkup".to_string(),
            payment: None,
        })
        .await
        .unwrap();

    let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway::default());
    let service = PaymentIntentService::new(config, coordinator(&store), gateway);

    let err = service
        .create_intent(
            &patient,
            &CreatePaymentIntentRequest {
                slot_id: slot.id.clone(),
                reason: "fever".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::Scheduling(SchedulingError::SlotUnavailable));
}
