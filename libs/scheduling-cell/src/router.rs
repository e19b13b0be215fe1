// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::SchedulingContext;

pub fn scheduling_routes(ctx: Arc<SchedulingContext>) -> Router {
    let protected_routes = Router::new()
        // Availability management
        .route("/slots", post(handlers::create_slot).get(handlers::list_available_slots))
        .route("/slots/{slot_id}", delete(handlers::delete_slot))
        .route("/slots/doctor/{doctor_id}", get(handlers::doctor_agenda))
        // Appointment listings
        .route("/appointments/mine", get(handlers::my_appointments))
        .route("/appointments/history", get(handlers::my_history))
        .route("/appointments/doctor", get(handlers::doctor_appointments))
        .route("/appointments/search", get(handlers::search_appointments))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        // Lifecycle transitions
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/appointments/{appointment_id}/reschedule",
            post(handlers::reschedule_appointment),
        )
        .route(
            "/appointments/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        .route("/appointments/{appointment_id}/no-show", post(handlers::mark_no_show))
        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(ctx)
}
