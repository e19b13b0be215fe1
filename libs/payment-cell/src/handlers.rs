// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use scheduling_cell::services::reservation::ReservationCoordinator;
use shared_models::actor::Actor;
use shared_models::error::AppError;

use crate::models::{ConfirmPaymentRequest, CreatePaymentIntentRequest};
use crate::services::confirmation::PaymentConfirmationHandler;
use crate::services::intent::PaymentIntentService;
use crate::PaymentContext;

#[axum::debug_handler]
pub async fn create_payment_intent(
    State(ctx): State<Arc<PaymentContext>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients start a checkout".to_string(),
        ));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let service = PaymentIntentService::new(ctx.config.clone(), coordinator, ctx.gateway.clone());

    let handle = service.create_intent(&actor, &request).await?;

    Ok(Json(json!({
        "success": true,
        "intent_id": handle.intent_id,
        "init_point": handle.init_point
    })))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(ctx): State<Arc<PaymentContext>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    if !actor.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients confirm a payment".to_string(),
        ));
    }

    let coordinator = ReservationCoordinator::new(ctx.store.clone(), ctx.renderer.clone());
    let handler = PaymentConfirmationHandler::new(
        ctx.store.clone(),
        coordinator,
        ctx.gateway.clone(),
        ctx.notifier.clone(),
    );

    let appointment = handler.confirm(&actor, &request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Payment confirmed, your appointment has been reserved"
    })))
}
