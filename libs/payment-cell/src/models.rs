// libs/payment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use scheduling_cell::models::SchedulingError;
use shared_models::error::AppError;

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub slot_id: String,
    pub reason: String,
}

/// Opaque checkout handle handed back to the client. `init_point` is the
/// gateway's hosted checkout URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentHandle {
    pub intent_id: String,
    pub init_point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_id: String,
    pub status: String,
    pub intent_id: String,
}

/// Metadata attached when the intent is created and read back at
/// confirmation time. The gateway round-trips it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub patient_id: String,
    pub slot_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Pending,
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Approved => write!(f, "approved"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A payment outcome as re-verified against the gateway, never as declared
/// by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: f64,
    pub method: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PaymentIntentSpec {
    pub title: String,
    pub description: String,
    pub amount: f64,
    pub payer_name: String,
    pub payer_email: Option<String>,
    pub metadata: PaymentMetadata,
}

/// Payload for the booking-confirmation message sent after a reservation
/// commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment was not approved")]
    NotApproved,

    #[error("Payment intent not found or missing metadata")]
    IntentNotFound,

    #[error("Payment does not belong to this user")]
    Forbidden,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotApproved => {
                AppError::BadRequest("Payment was not approved".to_string())
            }
            PaymentError::IntentNotFound => {
                AppError::NotFound("Payment intent not found".to_string())
            }
            PaymentError::Forbidden => {
                AppError::Forbidden("Payment does not belong to this user".to_string())
            }
            PaymentError::Gateway(msg) => AppError::ExternalService(msg),
            PaymentError::Validation(msg) => AppError::ValidationError(msg),
            PaymentError::Notification(msg) => AppError::ExternalService(msg),
            PaymentError::Scheduling(inner) => inner.into(),
        }
    }
}
