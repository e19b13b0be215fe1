// libs/scheduling-cell/src/services/documents.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{PrescriptionItem, SchedulingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionDocumentRequest {
    pub appointment_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub diagnosis: String,
    pub prescription: Vec<PrescriptionItem>,
}

/// External collaborator that renders a prescription document and returns a
/// durable URL. Rendering happens outside the reservation transaction; a
/// failure here means the completion never commits.
#[async_trait]
pub trait PrescriptionRenderer: Send + Sync {
    async fn render(&self, request: &PrescriptionDocumentRequest)
        -> Result<String, SchedulingError>;
}

pub struct HttpDocumentService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.document_service_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RenderedDocument {
    url: String,
}

#[async_trait]
impl PrescriptionRenderer for HttpDocumentService {
    async fn render(
        &self,
        request: &PrescriptionDocumentRequest,
    ) -> Result<String, SchedulingError> {
        let url = format!("{}/documents/prescriptions", self.base_url);
        debug!("Rendering prescription document for appointment {}", request.appointment_id);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "appointment_id": request.appointment_id,
                "patient_id": request.patient_id,
                "patient_name": request.patient_name,
                "doctor_name": request.doctor_name,
                "diagnosis": request.diagnosis,
                "prescription": request.prescription,
            }))
            .send()
            .await
            .map_err(|e| SchedulingError::ExternalService(format!("Document service: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Document service error ({}): {}", status, error_text);
            return Err(SchedulingError::ExternalService(format!(
                "Document service returned {}",
                status
            )));
        }

        let rendered: RenderedDocument = response.json().await.map_err(|e| {
            SchedulingError::ExternalService(format!("Invalid document service response: {}", e))
        })?;

        Ok(rendered.url)
    }
}
