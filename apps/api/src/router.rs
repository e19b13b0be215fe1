use std::sync::Arc;

use axum::{routing::get, Router};

use payment_cell::router::payment_routes;
use payment_cell::services::gateway::HttpPaymentGateway;
use payment_cell::services::notifications::HttpNotificationService;
use payment_cell::PaymentContext;
use scheduling_cell::router::scheduling_routes;
use scheduling_cell::services::documents::HttpDocumentService;
use scheduling_cell::SchedulingContext;
use shared_config::AppConfig;
use shared_store::{AtomicStore, MemoryStore};

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let store: Arc<dyn AtomicStore> = Arc::new(MemoryStore::new());
    let renderer = Arc::new(HttpDocumentService::new(&config));
    let gateway = Arc::new(HttpPaymentGateway::new(&config));
    let notifier = Arc::new(HttpNotificationService::new(&config));

    let scheduling_ctx = Arc::new(SchedulingContext {
        config: config.clone(),
        store: store.clone(),
        renderer: renderer.clone(),
    });

    let payment_ctx = Arc::new(PaymentContext {
        config: config.clone(),
        store,
        renderer,
        gateway,
        notifier,
    });

    Router::new()
        .route("/", get(|| async { "Vita Clinic scheduling API is running!" }))
        .nest("/scheduling", scheduling_routes(scheduling_ctx))
        .nest("/payments", payment_routes(payment_ctx))
}
