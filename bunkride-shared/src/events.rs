use uuid::Uuid;

/// Published to `trips.request.created` when a rider asks to join a trip.
/// The external mailer reads these fields to notify the host.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RequestCreatedEvent {
    pub trip_id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub trip_date: chrono::NaiveDate,
    pub creator_id: Uuid,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub requested_at: i64,
}

/// Published to `trips.request.approved` when a host approves a request.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RequestApprovedEvent {
    pub trip_id: Uuid,
    pub route_to: String,
    pub trip_date: chrono::NaiveDate,
    pub creator_id: Uuid,
    pub creator_name: String,
    pub requester_id: Uuid,
    pub requester_email: String,
    pub approved_at: i64,
}

/// Published to `users.signup`; carries the verification token the mailer
/// embeds in the confirmation link.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SignupEvent {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub verification_token: Uuid,
    pub signed_up_at: i64,
}

/// Fan-out event for per-trip SSE streams.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TripChangedEvent {
    pub trip_id: Uuid,
    pub college: String,
    pub kind: TripChangeKind,
    pub occurred_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripChangeKind {
    Created,
    RequestSubmitted,
    RequestWithdrawn,
    RequestResolved,
    Deleted,
}

/// Fan-out event for per-trip chat streams.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ChatMessageEvent {
    pub trip_id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub sent_at: i64,
}
