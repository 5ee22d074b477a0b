use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use bunkride_core::WorkflowError;
use bunkride_shared::events::{TripChangeKind, TripChangedEvent};
use bunkride_trips::models::{RequestStatus, TransportMode, Trip, TripStatus};
use bunkride_trips::views::{self, TripFilters};
use bunkride_trips::workflow;
use bunkride_trips::NewTrip;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TripSummary {
    pub id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: TransportMode,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price_per_person: Option<i64>,
    pub creator_name: String,
    pub creator_college: String,
    pub status: TripStatus,
    pub my_request_status: Option<RequestStatus>,
}

#[derive(Debug, Serialize)]
pub struct RequestView {
    pub requester_id: Uuid,
    pub requester_name: String,
    pub requester_email: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContactCard {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TripDetail {
    #[serde(flatten)]
    pub summary: TripSummary,
    /// Present for the host only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<RequestView>>,
    /// Exchanged after approval: the host's card for approved riders, the
    /// approved riders' cards for the host.
    pub contacts: Vec<ContactCard>,
    pub can_delete: bool,
    pub chat_unlocked: bool,
}

fn summarize(trip: &Trip, viewer_id: Uuid) -> TripSummary {
    TripSummary {
        id: trip.id,
        route_from: trip.route_from.clone(),
        route_to: trip.route_to.clone(),
        date: trip.date,
        time: trip.time,
        mode: trip.mode,
        total_seats: trip.total_seats,
        available_seats: trip.available_seats,
        price_per_person: trip.price_per_person,
        creator_name: trip.creator_name.clone(),
        creator_college: trip.creator_college.as_str().to_string(),
        status: trip.status,
        my_request_status: trip.request_of(viewer_id).map(|r| r.status),
    }
}

fn request_views(trip: &Trip) -> Vec<RequestView> {
    trip.requests
        .iter()
        .map(|(id, r)| RequestView {
            requester_id: *id,
            requester_name: r.requester_name.clone(),
            requester_email: r.requester_email.clone(),
            status: r.status,
            requested_at: r.requested_at,
        })
        .collect()
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip).get(list_joinable))
        .route("/v1/trips/mine", get(list_mine))
        .route("/v1/trips/upcoming", get(list_upcoming))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/trips/{id}", get(get_trip).delete(delete_trip))
        .route("/v1/trips/{id}/stream", get(trip_stream))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<NewTrip>,
) -> Result<(StatusCode, Json<TripSummary>), AppError> {
    let profile = state
        .profiles
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("profile {}", user.id)))?;

    let trip = state.trips.create_trip(&profile, input).await?;
    broadcast_change(&state, &trip, TripChangeKind::Created);

    info!("Trip created by {}: {}", user.id, trip.id);
    Ok((StatusCode::CREATED, Json(summarize(&trip, user.id))))
}

async fn list_joinable(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<TripFilters>,
) -> Result<Json<Vec<TripSummary>>, AppError> {
    let trips = state.trips.list_college_trips(user.college.as_str()).await?;
    let today = Utc::now().date_naive();
    let visible = views::joinable(&trips, user.id, &user.college, today, &filters);
    Ok(Json(visible.into_iter().map(|t| summarize(t, user.id)).collect()))
}

async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<TripDetail>>, AppError> {
    let trips = state.trips.list_by_creator(user.id).await?;
    let window = state.business_rules.deletion_window_hours;
    let now = Utc::now();

    let details = views::my_created(&trips, user.id)
        .into_iter()
        .map(|t| TripDetail {
            summary: summarize(t, user.id),
            requests: Some(request_views(t)),
            contacts: Vec::new(),
            can_delete: workflow::can_delete(t, now, window),
            chat_unlocked: true,
        })
        .collect();
    Ok(Json(details))
}

async fn list_upcoming(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<TripSummary>>, AppError> {
    let today = Utc::now().date_naive();
    let trips = state.trips.list_involving(user.id, today).await?;
    let upcoming = views::upcoming_relevant(&trips, user.id, today);
    Ok(Json(upcoming.into_iter().map(|t| summarize(t, user.id)).collect()))
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<views::DashboardStats>, AppError> {
    let today = Utc::now().date_naive();
    let trips = state.trips.list_involving(user.id, today).await?;
    Ok(Json(views::dashboard_stats(&trips, user.id, today)))
}

async fn get_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    let trip = state
        .trips
        .get_trip(id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("trip {id}")))?;

    // Outside the college partition the trip does not exist.
    if !views::can_watch(&trip, user.id, &user.college) {
        return Err(WorkflowError::NotFound(format!("trip {id}")).into());
    }

    let is_host = trip.creator_id == user.id;
    let contacts = if views::can_view_contacts(&trip, user.id) {
        load_contacts(&state, &trip, user.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(TripDetail {
        summary: summarize(&trip, user.id),
        requests: is_host.then(|| request_views(&trip)),
        contacts,
        can_delete: is_host
            && workflow::can_delete(&trip, Utc::now(), state.business_rules.deletion_window_hours),
        chat_unlocked: views::can_chat(&trip, user.id),
    }))
}

/// Batch the profile lookups behind a deduplicated id set; the host gets the
/// approved riders' cards, an approved rider gets the host's.
async fn load_contacts(
    state: &AppState,
    trip: &Trip,
    viewer_id: Uuid,
) -> Result<Vec<ContactCard>, AppError> {
    let mut ids: BTreeSet<Uuid> = BTreeSet::new();
    if trip.creator_id == viewer_id {
        ids.extend(
            trip.requests
                .iter()
                .filter(|(_, r)| r.status == RequestStatus::Approved)
                .map(|(id, _)| *id),
        );
    } else {
        ids.insert(trip.creator_id);
    }

    let mut cards = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(profile) = state.profiles.find_by_id(id).await? {
            cards.push(ContactCard {
                name: profile.public_name(),
                phone: profile.phone.expose().clone(),
                email: profile.email,
            });
        }
    }
    Ok(cards)
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let trip = state
        .trips
        .get_trip(id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("trip {id}")))?;

    state
        .trips
        .delete_trip(id, user.id, state.business_rules.deletion_window_hours)
        .await?;

    broadcast_change(&state, &trip, TripChangeKind::Deleted);
    info!("Trip deleted by {}: {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Change stream
// ============================================================================

async fn trip_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let trip = state
        .trips
        .get_trip(id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("trip {id}")))?;

    if !views::can_watch(&trip, user.id, &user.college) {
        return Err(WorkflowError::NotFound(format!("trip {id}")).into());
    }

    // Dropping the stream drops the receiver, which is the unsubscribe.
    let rx = state.trip_tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.trip_id == id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().event("trip_changed").data(data)))
            }
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub(crate) fn broadcast_change(state: &AppState, trip: &Trip, kind: TripChangeKind) {
    let _ = state.trip_tx.send(TripChangedEvent {
        trip_id: trip.id,
        college: trip.creator_college.as_str().to_string(),
        kind,
        occurred_at: Utc::now().timestamp(),
    });
}
