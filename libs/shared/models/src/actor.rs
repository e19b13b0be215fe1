use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Role a caller presented at the boundary. The scheduling core never
/// branches on this beyond the route-level gate; ownership checks use ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
}

impl ActorRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "patient" => Some(ActorRole::Patient),
            "doctor" => Some(ActorRole::Doctor),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

/// Authenticated caller identity, attached to the request by the auth
/// middleware after token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: ActorRole,
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == ActorRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == ActorRole::Patient
    }
}
