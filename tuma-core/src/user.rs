use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed role set evaluated by the authorization middleware
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Courier,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Courier => "courier",
            Role::Customer => "customer",
        }
    }
}

/// The authenticated principal a request acts as, extracted from its
/// token by the middleware and kept orthogonal to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

/// Minimal view of a user held by the directory collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}
