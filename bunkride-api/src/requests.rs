use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Extension, Json, Router,
};
use bunkride_core::WorkflowError;
use bunkride_shared::events::{RequestApprovedEvent, RequestCreatedEvent, TripChangeKind};
use bunkride_store::events::{TOPIC_REQUEST_APPROVED, TOPIC_REQUEST_CREATED};
use bunkride_trips::workflow::Decision;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;
use crate::trips::broadcast_change;

#[derive(Debug, Deserialize)]
struct ResolveRequestBody {
    decision: Decision,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/requests", post(submit_request).delete(withdraw_request))
        .route("/v1/trips/{id}/requests/{requester_id}", put(resolve_request))
}

async fn submit_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let profile = state
        .profiles
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("profile {}", user.id)))?;

    let trip = state.trips.submit_request(trip_id, &profile).await?;

    let requested_at = trip
        .request_of(user.id)
        .map(|r| r.requested_at.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp());

    // Host gets an email through the external trigger.
    let event = RequestCreatedEvent {
        trip_id,
        route_from: trip.route_from.clone(),
        route_to: trip.route_to.clone(),
        trip_date: trip.date,
        creator_id: trip.creator_id,
        requester_id: user.id,
        requester_name: profile.name.clone(),
        requested_at,
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let _ = state
            .kafka
            .publish(TOPIC_REQUEST_CREATED, &trip_id.to_string(), &payload)
            .await;
    }

    broadcast_change(&state, &trip, TripChangeKind::RequestSubmitted);
    info!("Join request: trip {} by {}", trip_id, user.id);
    Ok(StatusCode::CREATED)
}

async fn withdraw_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let trip = state.trips.withdraw_request(trip_id, user.id).await?;

    broadcast_change(&state, &trip, TripChangeKind::RequestWithdrawn);
    info!("Request withdrawn: trip {} by {}", trip_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn resolve_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((trip_id, requester_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ResolveRequestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let trip = state
        .trips
        .resolve_request(trip_id, user.id, requester_id, body.decision)
        .await?;

    if body.decision == Decision::Approve {
        if let Some(request) = trip.request_of(requester_id) {
            // Rider gets an approval email through the external trigger.
            let event = RequestApprovedEvent {
                trip_id,
                route_to: trip.route_to.clone(),
                trip_date: trip.date,
                creator_id: trip.creator_id,
                creator_name: trip.creator_name.clone(),
                requester_id,
                requester_email: request.requester_email.clone(),
                approved_at: Utc::now().timestamp(),
            };
            if let Ok(payload) = serde_json::to_string(&event) {
                let _ = state
                    .kafka
                    .publish(TOPIC_REQUEST_APPROVED, &trip_id.to_string(), &payload)
                    .await;
            }
        }
    }

    broadcast_change(&state, &trip, TripChangeKind::RequestResolved);
    info!(
        "Request resolved: trip {} requester {} by host {}",
        trip_id, requester_id, user.id
    );

    let status = trip
        .request_of(requester_id)
        .map(|r| r.status.as_str())
        .unwrap_or("pending");
    Ok(Json(serde_json::json!({
        "requester_id": requester_id,
        "status": status,
        "available_seats": trip.available_seats,
    })))
}
