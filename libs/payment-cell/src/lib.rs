pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use scheduling_cell::services::documents::PrescriptionRenderer;
use shared_config::AppConfig;
use shared_store::AtomicStore;

use services::gateway::PaymentGateway;
use services::notifications::ConfirmationNotifier;

pub use router::payment_routes;

/// Injected collaborators for the payment cell. The renderer is only here so
/// handlers can assemble a `ReservationCoordinator`.
pub struct PaymentContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AtomicStore>,
    pub renderer: Arc<dyn PrescriptionRenderer>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn ConfirmationNotifier>,
}
