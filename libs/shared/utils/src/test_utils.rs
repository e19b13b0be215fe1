use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::actor::{Actor, ActorRole};

pub struct TestConfig {
    pub jwt_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            payment_gateway_url: "http://localhost:54310".to_string(),
            payment_gateway_token: "test-gateway-token".to_string(),
            document_service_url: "http://localhost:54311".to_string(),
            notification_service_url: "http://localhost:54312".to_string(),
            consultation_price: 8.0,
            slot_hold_minutes: 15,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestActor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: ActorRole,
}

impl TestActor {
    pub fn new(name: &str, email: &str, role: ActorRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn patient(name: &str) -> Self {
        Self::new(name, "patient@example.com", ActorRole::Patient)
    }

    pub fn doctor(name: &str) -> Self {
        Self::new(name, "doctor@example.com", ActorRole::Doctor)
    }

    pub fn admin(name: &str) -> Self {
        Self::new(name, "admin@example.com", ActorRole::Admin)
    }

    pub fn to_actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            role: self.role,
            authenticated_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(actor: &TestActor, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": actor.id,
            "name": actor.name,
            "email": actor.email,
            "role": actor.role.to_string(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }
}
