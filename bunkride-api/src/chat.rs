use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get},
    Extension, Json, Router,
};
use bunkride_core::WorkflowError;
use bunkride_shared::events::ChatMessageEvent;
use bunkride_trips::models::{ChatMessage, Trip};
use bunkride_trips::views;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PostMessageBody {
    body: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/chat", get(list_messages).post(post_message))
        .route("/v1/trips/{id}/chat/{message_id}", delete(delete_message))
        .route("/v1/trips/{id}/chat/stream", get(chat_stream))
}

/// The chat admits the host and approved riders; everyone else sees a 403.
async fn chat_trip(state: &AppState, trip_id: Uuid, user_id: Uuid) -> Result<Trip, AppError> {
    let trip = state
        .trips
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("trip {trip_id}")))?;

    if !views::can_chat(&trip, user_id) {
        return Err(WorkflowError::NotAuthorized(
            "chat unlocks after the host approves your request".to_string(),
        )
        .into());
    }
    Ok(trip)
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    chat_trip(&state, trip_id, user.id).await?;
    let messages = state
        .chat
        .list_messages(trip_id, state.business_rules.chat_history_limit)
        .await?;
    Ok(Json(messages))
}

async fn post_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trip_id): Path<Uuid>,
    Json(body): Json<PostMessageBody>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let text = body.body.trim();
    if text.is_empty() {
        return Err(WorkflowError::Validation("message body is empty".to_string()).into());
    }

    chat_trip(&state, trip_id, user.id).await?;
    let message = state
        .chat
        .append_message(trip_id, user.id, &user.name, text)
        .await?;

    let _ = state.chat_tx.send(ChatMessageEvent {
        trip_id,
        message_id: message.id,
        sender_id: message.sender_id,
        sender_name: message.sender_name.clone(),
        body: message.body.clone(),
        sent_at: message.sent_at.timestamp(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((trip_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    chat_trip(&state, trip_id, user.id).await?;
    state.chat.delete_message(trip_id, message_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn chat_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    chat_trip(&state, trip_id, user.id).await?;

    let rx = state.chat_tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.trip_id == trip_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().event("message").data(data)))
            }
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
