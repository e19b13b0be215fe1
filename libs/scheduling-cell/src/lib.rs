pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_store::AtomicStore;

use services::documents::PrescriptionRenderer;

pub use router::scheduling_routes;

/// Injected collaborators for the scheduling cell. Handlers build the
/// services they need from these per request; no component reaches for a
/// process-wide handle.
pub struct SchedulingContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AtomicStore>,
    pub renderer: Arc<dyn PrescriptionRenderer>,
}
