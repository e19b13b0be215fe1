// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::PaymentContext;

pub fn payment_routes(ctx: Arc<PaymentContext>) -> Router {
    let protected_routes = Router::new()
        .route("/intent", post(handlers::create_payment_intent))
        .route("/confirm", post(handlers::confirm_payment))
        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(ctx)
}
