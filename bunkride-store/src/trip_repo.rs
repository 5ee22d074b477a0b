use std::collections::BTreeMap;

use async_trait::async_trait;
use bunkride_core::{College, Profile, WorkflowError, WorkflowResult};
use bunkride_trips::models::{JoinRequest, NewTrip, RequestStatus, TransportMode, Trip, TripStatus};
use bunkride_trips::repository::TripRepository;
use bunkride_trips::workflow::{self, Decision};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    route_from: String,
    route_to: String,
    date: NaiveDate,
    time: NaiveTime,
    mode: String,
    total_seats: i32,
    available_seats: i32,
    total_cost: Option<i64>,
    price_per_person: Option<i64>,
    creator_id: Uuid,
    creator_name: String,
    creator_college: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    trip_id: Uuid,
    requester_id: Uuid,
    requester_name: String,
    requester_email: String,
    status: String,
    requested_at: DateTime<Utc>,
}

const TRIP_COLUMNS: &str = "id, route_from, route_to, date, time, mode, total_seats, \
     available_seats, total_cost, price_per_person, creator_id, creator_name, \
     creator_college, status, created_at";

fn store_err(e: sqlx::Error) -> WorkflowError {
    WorkflowError::StoreUnavailable(e.to_string())
}

// Stored shapes are validated here, at the deserialization boundary, instead
// of being trusted implicitly further up.
fn trip_from_row(row: TripRow, requests: BTreeMap<Uuid, JoinRequest>) -> WorkflowResult<Trip> {
    let mode = TransportMode::parse(&row.mode)
        .ok_or_else(|| WorkflowError::StoreUnavailable(format!("bad transport mode '{}'", row.mode)))?;
    let status = TripStatus::parse(&row.status)
        .ok_or_else(|| WorkflowError::StoreUnavailable(format!("bad trip status '{}'", row.status)))?;

    Ok(Trip {
        id: row.id,
        route_from: row.route_from,
        route_to: row.route_to,
        date: row.date,
        time: row.time,
        mode,
        total_seats: row.total_seats,
        available_seats: row.available_seats,
        total_cost: row.total_cost,
        price_per_person: row.price_per_person,
        creator_id: row.creator_id,
        creator_name: row.creator_name,
        creator_college: College::from(row.creator_college),
        status,
        created_at: row.created_at,
        requests,
    })
}

fn request_from_row(row: &RequestRow) -> WorkflowResult<JoinRequest> {
    let status = RequestStatus::parse(&row.status).ok_or_else(|| {
        WorkflowError::StoreUnavailable(format!("bad request status '{}'", row.status))
    })?;
    Ok(JoinRequest {
        requester_name: row.requester_name.clone(),
        requester_email: row.requester_email.clone(),
        status,
        requested_at: row.requested_at,
    })
}

/// Batch-load the request maps for a set of trips in one round trip.
async fn load_request_maps(
    pool: &PgPool,
    trip_ids: &[Uuid],
) -> WorkflowResult<BTreeMap<Uuid, BTreeMap<Uuid, JoinRequest>>> {
    let mut maps: BTreeMap<Uuid, BTreeMap<Uuid, JoinRequest>> = BTreeMap::new();
    if trip_ids.is_empty() {
        return Ok(maps);
    }

    let rows: Vec<RequestRow> = sqlx::query_as(
        "SELECT trip_id, requester_id, requester_name, requester_email, status, requested_at \
         FROM trip_requests WHERE trip_id = ANY($1)",
    )
    .bind(trip_ids)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;

    for row in rows {
        maps.entry(row.trip_id)
            .or_default()
            .insert(row.requester_id, request_from_row(&row)?);
    }
    Ok(maps)
}

async fn attach_requests(pool: &PgPool, rows: Vec<TripRow>) -> WorkflowResult<Vec<Trip>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut maps = load_request_maps(pool, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let requests = maps.remove(&row.id).unwrap_or_default();
            trip_from_row(row, requests)
        })
        .collect()
}

/// Load one trip inside a transaction with the row locked, so the workflow
/// transition and the write-back happen against the latest stored value.
async fn lock_trip(tx: &mut Transaction<'_, Postgres>, trip_id: Uuid) -> WorkflowResult<Trip> {
    let row: Option<TripRow> = sqlx::query_as(&format!(
        "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 FOR UPDATE"
    ))
    .bind(trip_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(store_err)?;

    let row = row.ok_or_else(|| WorkflowError::NotFound(format!("trip {trip_id}")))?;

    let request_rows: Vec<RequestRow> = sqlx::query_as(
        "SELECT trip_id, requester_id, requester_name, requester_email, status, requested_at \
         FROM trip_requests WHERE trip_id = $1",
    )
    .bind(trip_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(store_err)?;

    let mut requests = BTreeMap::new();
    for r in &request_rows {
        requests.insert(r.requester_id, request_from_row(r)?);
    }
    trip_from_row(row, requests)
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn create_trip(&self, host: &Profile, input: NewTrip) -> WorkflowResult<Trip> {
        let mut trip = workflow::plan_trip(host, input, Utc::now())?;

        let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
            "INSERT INTO trips (id, route_from, route_to, date, time, mode, total_seats, \
             available_seats, total_cost, price_per_person, creator_id, creator_name, \
             creator_college, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING created_at",
        )
        .bind(trip.id)
        .bind(&trip.route_from)
        .bind(&trip.route_to)
        .bind(trip.date)
        .bind(trip.time)
        .bind(trip.mode.as_str())
        .bind(trip.total_seats)
        .bind(trip.available_seats)
        .bind(trip.total_cost)
        .bind(trip.price_per_person)
        .bind(trip.creator_id)
        .bind(&trip.creator_name)
        .bind(trip.creator_college.as_str())
        .bind(trip.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        trip.created_at = created_at;
        info!("Trip created: {} {} -> {}", trip.id, trip.route_from, trip.route_to);
        Ok(trip)
    }

    async fn get_trip(&self, id: Uuid) -> WorkflowResult<Option<Trip>> {
        let row: Option<TripRow> =
            sqlx::query_as(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut trips = attach_requests(&self.pool, vec![row]).await?;
        Ok(trips.pop())
    }

    async fn list_college_trips(&self, college: &str) -> WorkflowResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE creator_college = $1 ORDER BY date, time"
        ))
        .bind(college)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        attach_requests(&self.pool, rows).await
    }

    async fn list_by_creator(&self, creator_id: Uuid) -> WorkflowResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE creator_id = $1 ORDER BY created_at"
        ))
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        attach_requests(&self.pool, rows).await
    }

    async fn list_involving(&self, user_id: Uuid, today: NaiveDate) -> WorkflowResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips \
             WHERE date >= $2 AND (creator_id = $1 OR id IN \
                 (SELECT trip_id FROM trip_requests WHERE requester_id = $1)) \
             ORDER BY date, time"
        ))
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        attach_requests(&self.pool, rows).await
    }

    async fn submit_request(&self, trip_id: Uuid, requester: &Profile) -> WorkflowResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut trip = lock_trip(&mut tx, trip_id).await?;

        workflow::request_to_join(&mut trip, requester, Utc::now())?;

        // Keyed by requester: a concurrent duplicate from the same principal
        // collapses onto the existing row instead of creating a second one.
        let (requested_at,): (DateTime<Utc>,) = sqlx::query_as(
            "INSERT INTO trip_requests (trip_id, requester_id, requester_name, requester_email, status) \
             VALUES ($1, $2, $3, $4, 'pending') \
             ON CONFLICT (trip_id, requester_id) DO UPDATE SET requester_name = EXCLUDED.requester_name \
             RETURNING requested_at",
        )
        .bind(trip_id)
        .bind(requester.id)
        .bind(&requester.name)
        .bind(&requester.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        if let Some(request) = trip.requests.get_mut(&requester.id) {
            request.requested_at = requested_at;
        }
        info!("Request submitted: trip {} by {}", trip_id, requester.id);
        Ok(trip)
    }

    async fn withdraw_request(&self, trip_id: Uuid, caller_id: Uuid) -> WorkflowResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut trip = lock_trip(&mut tx, trip_id).await?;

        workflow::withdraw_request(&mut trip, caller_id, caller_id)?;

        sqlx::query("DELETE FROM trip_requests WHERE trip_id = $1 AND requester_id = $2")
            .bind(trip_id)
            .bind(caller_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        info!("Request withdrawn: trip {} by {}", trip_id, caller_id);
        Ok(trip)
    }

    async fn resolve_request(
        &self,
        trip_id: Uuid,
        caller_id: Uuid,
        requester_id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut trip = lock_trip(&mut tx, trip_id).await?;

        workflow::resolve_request(&mut trip, caller_id, requester_id, decision)?;

        let new_status = trip
            .requests
            .get(&requester_id)
            .map(|r| r.status.as_str())
            .unwrap_or("pending");

        // Guarded by the pending check so a racing resolution on the same
        // request cannot double-apply.
        let updated = sqlx::query(
            "UPDATE trip_requests SET status = $1 \
             WHERE trip_id = $2 AND requester_id = $3 AND status = 'pending'",
        )
        .bind(new_status)
        .bind(trip_id)
        .bind(requester_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if updated.rows_affected() != 1 {
            return Err(WorkflowError::InvalidTransition {
                from: "unknown".to_string(),
                to: new_status.to_string(),
            });
        }

        if decision == Decision::Approve {
            // Clamped decrement against the stored value, never a cached one.
            sqlx::query(
                "UPDATE trips SET available_seats = GREATEST(available_seats - 1, 0) WHERE id = $1",
            )
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        info!(
            "Request resolved: trip {} requester {} -> {}",
            trip_id, requester_id, new_status
        );
        Ok(trip)
    }

    async fn delete_trip(
        &self,
        trip_id: Uuid,
        caller_id: Uuid,
        deletion_window_hours: i64,
    ) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let trip = lock_trip(&mut tx, trip_id).await?;

        workflow::authorize_delete(&trip, caller_id, Utc::now(), deletion_window_hours)?;

        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        info!("Trip deleted: {} by {}", trip_id, caller_id);
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<Uuid>> {
        // Requests and messages go with the trip via ON DELETE CASCADE.
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "DELETE FROM trips WHERE date + time < $1 RETURNING id",
        )
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
