//! Trip lifecycle and request workflow.
//!
//! Every transition rule lives here; repositories and handlers call these
//! functions instead of re-implementing the rules. Functions are pure over
//! `Trip` state so the store can apply them inside a transaction and the
//! tests can drive them without I/O.

use bunkride_core::{Profile, WorkflowError, WorkflowResult};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{price_per_person, JoinRequest, NewTrip, RequestStatus, Trip, TripStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Validate trip input and build the initial record.
///
/// The host's college is snapshotted here and never recomputed for this trip.
pub fn plan_trip(host: &Profile, input: NewTrip, now: DateTime<Utc>) -> WorkflowResult<Trip> {
    if !host.email_verified {
        return Err(WorkflowError::Validation(
            "email must be verified before creating trips".to_string(),
        ));
    }
    if input.total_seats < 1 {
        return Err(WorkflowError::Validation(format!(
            "totalSeats must be at least 1, got {}",
            input.total_seats
        )));
    }
    if let Some(cost) = input.total_cost {
        if cost < 0 {
            return Err(WorkflowError::Validation(format!(
                "totalCost must not be negative, got {cost}"
            )));
        }
    }
    if input.route_from.trim().is_empty() || input.route_to.trim().is_empty() {
        return Err(WorkflowError::Validation("route must name both endpoints".to_string()));
    }
    // Day granularity: a trip later today is still creatable.
    if input.date < now.date_naive() {
        return Err(WorkflowError::Validation(format!(
            "departure date {} is in the past",
            input.date
        )));
    }

    Ok(Trip {
        id: Uuid::new_v4(),
        route_from: input.route_from,
        route_to: input.route_to,
        date: input.date,
        time: input.time,
        mode: input.mode,
        total_seats: input.total_seats,
        available_seats: input.total_seats,
        price_per_person: price_per_person(input.total_cost, input.total_seats),
        total_cost: input.total_cost,
        creator_id: host.id,
        creator_name: host.name.clone(),
        creator_college: host.college.clone(),
        status: TripStatus::Active,
        created_at: now,
        requests: Default::default(),
    })
}

/// Submit a join request. Does not touch seat accounting; seats move only on
/// approval.
pub fn request_to_join(trip: &mut Trip, requester: &Profile, now: DateTime<Utc>) -> WorkflowResult<()> {
    if trip.creator_id == requester.id {
        return Err(WorkflowError::SelfJoin);
    }
    if trip.available_seats == 0 {
        return Err(WorkflowError::TripFull);
    }
    if trip.status != TripStatus::Active {
        return Err(WorkflowError::TripInactive {
            status: trip.status.as_str().to_string(),
        });
    }
    // One request per (trip, requester), ever. Rejection is terminal.
    if let Some(existing) = trip.request_of(requester.id) {
        return Err(WorkflowError::DuplicateRequest {
            status: existing.status.as_str().to_string(),
        });
    }

    trip.requests.insert(
        requester.id,
        JoinRequest {
            requester_name: requester.name.clone(),
            requester_email: requester.email.clone(),
            status: RequestStatus::Pending,
            requested_at: now,
        },
    );
    Ok(())
}

/// Withdraw a pending request. Decided requests cannot be withdrawn.
pub fn withdraw_request(trip: &mut Trip, caller_id: Uuid, requester_id: Uuid) -> WorkflowResult<()> {
    if caller_id != requester_id {
        return Err(WorkflowError::NotAuthorized(
            "only the requester may withdraw their request".to_string(),
        ));
    }
    match trip.request_of(requester_id) {
        Some(request) if request.status == RequestStatus::Pending => {
            trip.requests.remove(&requester_id);
            Ok(())
        }
        _ => Err(WorkflowError::NotFound(format!(
            "no pending request on trip {} for this user",
            trip.id
        ))),
    }
}

/// Host decision on a pending request.
///
/// Approve: request → approved, one seat taken. Reject: request → rejected,
/// seats unchanged. Decided requests stay decided; re-deciding fails rather
/// than silently overwriting.
pub fn resolve_request(
    trip: &mut Trip,
    caller_id: Uuid,
    requester_id: Uuid,
    decision: Decision,
) -> WorkflowResult<()> {
    if trip.creator_id != caller_id {
        return Err(WorkflowError::NotAuthorized(
            "only the trip host may resolve requests".to_string(),
        ));
    }

    let target = match decision {
        Decision::Approve => RequestStatus::Approved,
        Decision::Reject => RequestStatus::Rejected,
    };

    let request = trip.requests.get_mut(&requester_id).ok_or_else(|| {
        WorkflowError::InvalidTransition {
            from: "none".to_string(),
            to: target.as_str().to_string(),
        }
    })?;

    if request.status != RequestStatus::Pending {
        return Err(WorkflowError::InvalidTransition {
            from: request.status.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }

    request.status = target;
    if decision == Decision::Approve {
        // Floor at zero: submission-time checks keep this from mattering,
        // but concurrent approvals racing on a stale read must not go negative.
        trip.available_seats = (trip.available_seats - 1).max(0);
    }
    Ok(())
}

/// Deletion is open until the window before departure closes.
pub fn can_delete(trip: &Trip, now: DateTime<Utc>, window_hours: i64) -> bool {
    trip.departure() - now > Duration::hours(window_hours)
}

pub fn authorize_delete(
    trip: &Trip,
    caller_id: Uuid,
    now: DateTime<Utc>,
    window_hours: i64,
) -> WorkflowResult<()> {
    if trip.creator_id != caller_id {
        return Err(WorkflowError::NotAuthorized(
            "only the trip host may delete a trip".to_string(),
        ));
    }
    if !can_delete(trip, now, window_hours) {
        return Err(WorkflowError::TooLate {
            window_hours,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunkride_core::College;
    use bunkride_shared::pii::Masked;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn student(email: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            name: "Priya Singh".to_string(),
            email: email.to_string(),
            college: College::from_email(email).unwrap(),
            phone: Masked::new("+91 98765 43210".to_string()),
            year: None,
            avatar_url: None,
            show_name: true,
            show_year: true,
            email_verified: true,
            created_at: now(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn draft(seats: i32, cost: Option<i64>) -> NewTrip {
        NewTrip {
            route_from: "Patiala".to_string(),
            route_to: "Delhi".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            mode: crate::models::TransportMode::Car,
            total_seats: seats,
            total_cost: cost,
        }
    }

    fn trip_with_host(host: &Profile, seats: i32, cost: Option<i64>) -> Trip {
        plan_trip(host, draft(seats, cost), now()).unwrap()
    }

    #[test]
    fn creation_derives_price_and_seats() {
        let host = student("host@thapar.edu");
        let trip = trip_with_host(&host, 4, Some(1000));
        assert_eq!(trip.price_per_person, Some(250));
        assert_eq!(trip.available_seats, 4);
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(trip.creator_college.as_str(), "thapar");
    }

    #[test]
    fn undecided_cost_keeps_price_unset() {
        let host = student("host@thapar.edu");
        let trip = trip_with_host(&host, 3, None);
        assert_eq!(trip.price_per_person, None);
        assert_eq!(trip.total_cost, None);
    }

    #[test]
    fn creation_rejects_bad_input() {
        let host = student("host@thapar.edu");
        assert!(matches!(
            plan_trip(&host, draft(0, Some(100)), now()),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            plan_trip(&host, draft(2, Some(-5)), now()),
            Err(WorkflowError::Validation(_))
        ));

        let mut past = draft(2, Some(100));
        past.date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert!(matches!(
            plan_trip(&host, past, now()),
            Err(WorkflowError::Validation(_))
        ));

        let mut unverified = student("host@thapar.edu");
        unverified.email_verified = false;
        assert!(matches!(
            plan_trip(&unverified, draft(2, Some(100)), now()),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn same_day_trip_is_creatable() {
        let host = student("host@thapar.edu");
        let mut today = draft(2, Some(100));
        today.date = now().date_naive();
        assert!(plan_trip(&host, today, now()).is_ok());
    }

    #[test]
    fn host_cannot_request_own_trip() {
        let host = student("host@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        assert!(matches!(
            request_to_join(&mut trip, &host, now()),
            Err(WorkflowError::SelfJoin)
        ));
        assert!(trip.requests.is_empty());
    }

    #[test]
    fn duplicate_request_cites_existing_status() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));

        request_to_join(&mut trip, &rider, now()).unwrap();
        match request_to_join(&mut trip, &rider, now()) {
            Err(WorkflowError::DuplicateRequest { status }) => assert_eq!(status, "pending"),
            other => panic!("expected DuplicateRequest, got {other:?}"),
        }
    }

    #[test]
    fn rejection_is_terminal() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));

        request_to_join(&mut trip, &rider, now()).unwrap();
        resolve_request(&mut trip, host.id, rider.id, Decision::Reject).unwrap();

        match request_to_join(&mut trip, &rider, now()) {
            Err(WorkflowError::DuplicateRequest { status }) => assert_eq!(status, "rejected"),
            other => panic!("expected DuplicateRequest, got {other:?}"),
        }
    }

    #[test]
    fn full_trip_rejects_new_requests() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 1, Some(100));
        trip.available_seats = 0;
        assert!(matches!(
            request_to_join(&mut trip, &rider, now()),
            Err(WorkflowError::TripFull)
        ));
    }

    #[test]
    fn inactive_trip_rejects_new_requests() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        trip.status = TripStatus::Cancelled;
        match request_to_join(&mut trip, &rider, now()) {
            Err(WorkflowError::TripInactive { status }) => assert_eq!(status, "cancelled"),
            other => panic!("expected TripInactive, got {other:?}"),
        }
    }

    #[test]
    fn only_host_resolves_requests() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        request_to_join(&mut trip, &rider, now()).unwrap();

        assert!(matches!(
            resolve_request(&mut trip, rider.id, rider.id, Decision::Approve),
            Err(WorkflowError::NotAuthorized(_))
        ));
    }

    #[test]
    fn approval_takes_one_seat_and_rejection_takes_none() {
        let host = student("host@thapar.edu");
        let a = student("a@thapar.edu");
        let b = student("b@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));

        request_to_join(&mut trip, &a, now()).unwrap();
        request_to_join(&mut trip, &b, now()).unwrap();

        resolve_request(&mut trip, host.id, a.id, Decision::Approve).unwrap();
        assert_eq!(trip.available_seats, 3);

        resolve_request(&mut trip, host.id, b.id, Decision::Reject).unwrap();
        assert_eq!(trip.available_seats, 3);
    }

    #[test]
    fn re_deciding_a_decided_request_fails() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        request_to_join(&mut trip, &rider, now()).unwrap();
        resolve_request(&mut trip, host.id, rider.id, Decision::Approve).unwrap();

        match resolve_request(&mut trip, host.id, rider.id, Decision::Reject) {
            Err(WorkflowError::InvalidTransition { from, to }) => {
                assert_eq!(from, "approved");
                assert_eq!(to, "rejected");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(trip.available_seats, 3);
    }

    #[test]
    fn resolving_an_absent_request_fails() {
        let host = student("host@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        assert!(matches!(
            resolve_request(&mut trip, host.id, Uuid::new_v4(), Decision::Approve),
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn seats_never_leave_bounds_over_full_lifecycle() {
        // 4 seats, 1000 cost: price 250; four approvals drain the trip, a
        // fifth attempt has no pending request left to act on.
        let host = student("host@thapar.edu");
        let riders: Vec<Profile> = (0..4).map(|i| student(&format!("r{i}@thapar.edu"))).collect();
        let mut trip = trip_with_host(&host, 4, Some(1000));
        assert_eq!(trip.price_per_person, Some(250));

        for rider in &riders {
            request_to_join(&mut trip, rider, now()).unwrap();
        }

        resolve_request(&mut trip, host.id, riders[0].id, Decision::Approve).unwrap();
        resolve_request(&mut trip, host.id, riders[1].id, Decision::Approve).unwrap();
        assert_eq!(trip.available_seats, 2);

        resolve_request(&mut trip, host.id, riders[2].id, Decision::Approve).unwrap();
        resolve_request(&mut trip, host.id, riders[3].id, Decision::Approve).unwrap();
        assert_eq!(trip.available_seats, 0);

        assert!(matches!(
            resolve_request(&mut trip, host.id, Uuid::new_v4(), Decision::Approve),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let late = student("late@thapar.edu");
        assert!(matches!(
            request_to_join(&mut trip, &late, now()),
            Err(WorkflowError::TripFull)
        ));

        assert!(trip.available_seats >= 0 && trip.available_seats <= trip.total_seats);
    }

    #[test]
    fn seat_floor_holds_under_stale_approvals() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 1, Some(100));
        request_to_join(&mut trip, &rider, now()).unwrap();

        // Simulate a racing approval already having drained the seat.
        trip.available_seats = 0;
        resolve_request(&mut trip, host.id, rider.id, Decision::Approve).unwrap();
        assert_eq!(trip.available_seats, 0);
    }

    #[test]
    fn withdraw_is_pending_only_and_not_idempotent() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        request_to_join(&mut trip, &rider, now()).unwrap();

        withdraw_request(&mut trip, rider.id, rider.id).unwrap();
        assert!(trip.requests.is_empty());

        // Second withdrawal: nothing there, state unchanged.
        assert!(matches!(
            withdraw_request(&mut trip, rider.id, rider.id),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(trip.requests.is_empty());
    }

    #[test]
    fn withdraw_of_someone_elses_request_is_denied() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let stranger = student("stranger@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        request_to_join(&mut trip, &rider, now()).unwrap();

        assert!(matches!(
            withdraw_request(&mut trip, stranger.id, rider.id),
            Err(WorkflowError::NotAuthorized(_))
        ));
        assert_eq!(trip.requests.len(), 1);
    }

    #[test]
    fn approved_request_cannot_be_withdrawn() {
        let host = student("host@thapar.edu");
        let rider = student("rider@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));
        request_to_join(&mut trip, &rider, now()).unwrap();
        resolve_request(&mut trip, host.id, rider.id, Decision::Approve).unwrap();

        assert!(matches!(
            withdraw_request(&mut trip, rider.id, rider.id),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn deletion_window_is_48_hours_from_departure() {
        let host = student("host@thapar.edu");
        let mut trip = trip_with_host(&host, 4, Some(1000));

        // Departure 49 hours out: still deletable.
        let departure = trip.departure();
        assert!(can_delete(&trip, departure - Duration::hours(49), 48));
        // 47 hours out: too late.
        assert!(!can_delete(&trip, departure - Duration::hours(47), 48));

        trip.creator_id = host.id;
        assert!(matches!(
            authorize_delete(&trip, Uuid::new_v4(), departure - Duration::hours(49), 48),
            Err(WorkflowError::NotAuthorized(_))
        ));
        assert!(matches!(
            authorize_delete(&trip, host.id, departure - Duration::hours(47), 48),
            Err(WorkflowError::TooLate { .. })
        ));
        assert!(authorize_delete(&trip, host.id, departure - Duration::hours(49), 48).is_ok());
    }
}
