use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tuma_core::{Actor, Role};
use uuid::Uuid;

use crate::state::AppState;

/// Token claims issued by the external identity service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "admin" => Some(Role::Admin),
        "courier" => Some(Role::Courier),
        "customer" => Some(Role::Customer),
        _ => None,
    }
}

/// Validates the bearer token and injects the [`Actor`] it represents
/// into request extensions. Handlers do the fine-grained checks.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let role = parse_role(&token_data.claims.role).ok_or(StatusCode::FORBIDDEN)?;

    req.extensions_mut().insert(Actor { user_id, role });
    Ok(next.run(req).await)
}

/// Coarse role gate used by handlers that serve exactly one role
pub fn require_role(actor: Actor, role: Role) -> tuma_core::Result<()> {
    if actor.role == role {
        Ok(())
    } else {
        Err(tuma_core::Error::Authorization(format!(
            "requires {} role",
            role.as_str()
        )))
    }
}
