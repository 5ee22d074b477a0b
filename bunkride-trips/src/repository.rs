use async_trait::async_trait;
use bunkride_core::{Profile, WorkflowResult};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{ChatMessage, NewTrip, Trip};
use crate::workflow::Decision;

/// Repository trait for trip data access.
///
/// Mutating operations apply the workflow rules inside a single atomic
/// read-modify-write against the stored row, because independent clients
/// (host approving, rider withdrawing, the sweep) race on the same trip.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create_trip(&self, host: &Profile, input: NewTrip) -> WorkflowResult<Trip>;

    async fn get_trip(&self, id: Uuid) -> WorkflowResult<Option<Trip>>;

    /// All trips partitioned to one college; the read-side views refine this.
    async fn list_college_trips(&self, college: &str) -> WorkflowResult<Vec<Trip>>;

    async fn list_by_creator(&self, creator_id: Uuid) -> WorkflowResult<Vec<Trip>>;

    /// Trips where the user is the creator or holds a request, future only.
    async fn list_involving(&self, user_id: Uuid, today: NaiveDate) -> WorkflowResult<Vec<Trip>>;

    /// Insert a pending request keyed by requester id. Returns the updated trip.
    async fn submit_request(&self, trip_id: Uuid, requester: &Profile) -> WorkflowResult<Trip>;

    async fn withdraw_request(&self, trip_id: Uuid, caller_id: Uuid) -> WorkflowResult<Trip>;

    /// Host decision; approval decrements the seat counter atomically.
    async fn resolve_request(
        &self,
        trip_id: Uuid,
        caller_id: Uuid,
        requester_id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Trip>;

    async fn delete_trip(
        &self,
        trip_id: Uuid,
        caller_id: Uuid,
        deletion_window_hours: i64,
    ) -> WorkflowResult<()>;

    /// Remove all departed trips (requests and messages cascade).
    /// Returns the deleted trip ids.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<Uuid>>;
}

/// Repository trait for the per-trip message list.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Most recent messages, oldest first, capped at `limit`.
    async fn list_messages(&self, trip_id: Uuid, limit: i64) -> WorkflowResult<Vec<ChatMessage>>;

    async fn append_message(
        &self,
        trip_id: Uuid,
        sender_id: Uuid,
        sender_name: &str,
        body: &str,
    ) -> WorkflowResult<ChatMessage>;

    /// Senders may delete their own messages only.
    async fn delete_message(
        &self,
        trip_id: Uuid,
        message_id: Uuid,
        caller_id: Uuid,
    ) -> WorkflowResult<()>;
}
