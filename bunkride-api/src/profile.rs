use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use bunkride_core::profile::ProfileUpdate;
use bunkride_core::WorkflowError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

/// The owner's own view; phone is exposed because it is theirs.
#[derive(Debug, Serialize)]
struct ProfileResponse {
    id: Uuid,
    name: String,
    email: String,
    college: String,
    phone: String,
    year: Option<String>,
    avatar_url: Option<String>,
    show_name: bool,
    show_year: bool,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/profile", get(get_profile).put(update_profile))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .profiles
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("profile {}", user.id)))?;

    Ok(Json(ProfileResponse {
        id: profile.id,
        name: profile.name.clone(),
        email: profile.email.clone(),
        college: profile.college.as_str().to_string(),
        phone: profile.phone.expose().clone(),
        year: profile.year.clone(),
        avatar_url: profile.avatar_url.clone(),
        show_name: profile.show_name,
        show_year: profile.show_year,
        email_verified: profile.email_verified,
        created_at: profile.created_at,
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(WorkflowError::Validation("name must not be empty".to_string()).into());
        }
    }

    let profile = state.profiles.update_profile(user.id, &update).await?;
    Ok(Json(serde_json::json!({
        "id": profile.id,
        "name": profile.name,
        "updated": true,
    })))
}
