use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::State, routing::post, Json, Router};
use bunkride_core::college::is_institutional;
use bunkride_core::profile::NewProfile;
use bunkride_core::WorkflowError;
use bunkride_shared::events::SignupEvent;
use bunkride_store::events::TOPIC_SIGNUP;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::RiderClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct SignupResponse {
    id: Uuid,
    college: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    token: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/signup", post(signup))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/verify", post(verify))
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<NewProfile>,
) -> Result<Json<SignupResponse>, AppError> {
    if !is_institutional(&req.email, &state.business_rules.allowed_email_suffixes) {
        return Err(WorkflowError::Validation(
            "signup requires an institutional email address".to_string(),
        )
        .into());
    }
    if req.password.len() < 8 {
        return Err(WorkflowError::Validation(
            "password must be at least 8 characters".to_string(),
        )
        .into());
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {e}")))?
        .to_string();

    let verification_token = Uuid::new_v4();
    let profile = state
        .profiles
        .create_profile(&req, &password_hash, verification_token)
        .await?;

    // The external mailer picks this up and sends the confirmation link.
    let event = SignupEvent {
        user_id: profile.id,
        email: profile.email.clone(),
        name: profile.name.clone(),
        verification_token,
        signed_up_at: Utc::now().timestamp(),
    };
    let payload = serde_json::to_string(&event)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let _ = state
        .kafka
        .publish(TOPIC_SIGNUP, &profile.id.to_string(), &payload)
        .await;

    info!("Signup: {} ({})", profile.id, profile.college);
    Ok(Json(SignupResponse {
        id: profile.id,
        college: profile.college.as_str().to_string(),
    }))
}

async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = state
        .profiles
        .verify_email(req.token)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("verification token".to_string()))?;

    Ok(Json(serde_json::json!({ "verified": true, "email": profile.email })))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let stored_hash = state
        .profiles
        .password_hash(&req.email)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("invalid email or password".to_string()))?;

    let parsed = PasswordHash::new(&stored_hash)
        .map_err(|e| AppError::InternalServerError(format!("Corrupt password hash: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed)
        .map_err(|_| AppError::AuthenticationError("invalid email or password".to_string()))?;

    let profile = state
        .profiles
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("invalid email or password".to_string()))?;

    // Unverified identities hold no rights anywhere in the system.
    if !profile.email_verified {
        return Err(AppError::AuthenticationError(
            "email address not yet verified".to_string(),
        ));
    }

    let claims = RiderClaims {
        sub: profile.id.to_string(),
        email: profile.email.clone(),
        name: profile.name.clone(),
        college: profile.college.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {e}")))?;

    Ok(Json(AuthResponse { token }))
}
