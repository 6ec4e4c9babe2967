use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crosspost_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// The owner an authenticated request acts for. Inserted by [`require_session`].
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub owner_id: i64,
}

/// Pull the raw credential out of `Authorization: Bearer <token>`.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Validate a session JWT and return the owner it names.
pub fn owner_from_jwt(secret: &str, token: &str) -> Option<i64> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    (data.claims.sub > 0).then_some(data.claims.sub)
}

pub fn issue(secret: &str, owner_id: i64, ttl: chrono::Duration) -> anyhow::Result<String> {
    anyhow::ensure!(owner_id > 0, "owner id must be positive, got {owner_id}");

    let claims = Claims {
        sub: owner_id,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Reject requests without a valid session JWT.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer(req.headers()).ok_or(ApiError::Unauthorized("No token provided"))?;
    let owner_id =
        owner_from_jwt(&state.jwt_secret, token).ok_or(ApiError::Unauthorized("Invalid session"))?;

    req.extensions_mut().insert(Session { owner_id });
    Ok(next.run(req).await)
}
