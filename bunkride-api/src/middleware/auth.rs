use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use bunkride_core::College;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

/// Claims carried by every rider token. The college rides along so list
/// endpoints can partition without a profile lookup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RiderClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub college: String,
    pub exp: usize,
}

/// The authenticated principal, injected into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub college: College,
}

pub async fn rider_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate JWT
    let token_data = decode::<RiderClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let claims = token_data.claims;
    let id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Inject the principal into request extensions
    req.extensions_mut().insert(CurrentUser {
        id,
        email: claims.email,
        name: claims.name,
        college: College::from(claims.college),
    });

    Ok(next.run(req).await)
}
