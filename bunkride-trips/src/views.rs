//! Read-side composition: visibility predicates and derived views.
//!
//! These are pure post-filters over trips already loaded from the store.
//! The read path applies them on every change notification rather than
//! caching derived lists, so a stale-but-unswept trip never shows up.

use bunkride_core::College;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{RequestStatus, Trip, TripStatus};

/// Optional refinement filters for the joinable listing. Pure post-filters,
/// no side effects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilters {
    /// Substring match on either route endpoint, case-insensitive.
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_seats: Option<i32>,
}

impl TripFilters {
    pub fn matches(&self, trip: &Trip) -> bool {
        if let Some(needle) = &self.destination {
            let needle = needle.to_lowercase();
            if !trip.route_to.to_lowercase().contains(&needle)
                && !trip.route_from.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(date) = self.date {
            if trip.date != date {
                return false;
            }
        }
        if let Some(min_seats) = self.min_seats {
            if trip.available_seats < min_seats {
                return false;
            }
        }
        true
    }
}

/// Trips the viewer could request to join: same college, active, not yet
/// departed, not their own, seats left. Ascending by departure.
pub fn joinable<'a>(
    trips: &'a [Trip],
    viewer_id: Uuid,
    college: &College,
    today: NaiveDate,
    filters: &TripFilters,
) -> Vec<&'a Trip> {
    let mut visible: Vec<&Trip> = trips
        .iter()
        .filter(|t| t.creator_college == *college)
        .filter(|t| t.status == TripStatus::Active)
        .filter(|t| t.date >= today)
        .filter(|t| t.creator_id != viewer_id)
        .filter(|t| t.available_seats > 0)
        .filter(|t| filters.matches(t))
        .collect();
    visible.sort_by_key(|t| (t.date, t.time));
    visible
}

/// Trips the viewer created, in stable insertion order.
pub fn my_created<'a>(trips: &'a [Trip], viewer_id: Uuid) -> Vec<&'a Trip> {
    trips.iter().filter(|t| t.creator_id == viewer_id).collect()
}

/// Upcoming trips the viewer is involved in, hosts first, then approved
/// rides, then anything they have requested, each band by departure.
/// Hosts keep seeing their trip when it fills up; riders do not.
pub fn upcoming_relevant<'a>(trips: &'a [Trip], viewer_id: Uuid, today: NaiveDate) -> Vec<&'a Trip> {
    let mut relevant: Vec<&Trip> = trips
        .iter()
        .filter(|t| t.status == TripStatus::Active && t.date >= today)
        .filter(|t| {
            if t.creator_id == viewer_id {
                return true;
            }
            t.request_of(viewer_id).is_some() && t.available_seats > 0
        })
        .collect();
    relevant.sort_by_key(|t| (relevance_rank(t, viewer_id), t.date, t.time));
    relevant
}

fn relevance_rank(trip: &Trip, viewer_id: Uuid) -> u8 {
    if trip.creator_id == viewer_id {
        0
    } else if trip.is_approved_rider(viewer_id) {
        1
    } else {
        2
    }
}

/// Contact details unlock after approval: the host sees approved riders'
/// contacts, approved riders see the host's.
pub fn can_view_contacts(trip: &Trip, viewer_id: Uuid) -> bool {
    trip.creator_id == viewer_id || trip.is_approved_rider(viewer_id)
}

/// The per-trip chat admits the host and approved riders only.
pub fn can_chat(trip: &Trip, viewer_id: Uuid) -> bool {
    can_view_contacts(trip, viewer_id)
}

/// Anyone from the trip's college may watch its change stream; riders with a
/// request keep access even if their college record later diverges.
pub fn can_watch(trip: &Trip, viewer_id: Uuid, college: &College) -> bool {
    trip.creator_college == *college
        || trip.creator_id == viewer_id
        || trip.request_of(viewer_id).is_some()
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DashboardStats {
    pub upcoming: usize,
    pub created: usize,
    pub pending_requests: usize,
    pub approved_rides: usize,
}

pub fn dashboard_stats(trips: &[Trip], viewer_id: Uuid, today: NaiveDate) -> DashboardStats {
    let created: Vec<&Trip> = trips.iter().filter(|t| t.creator_id == viewer_id).collect();
    DashboardStats {
        upcoming: upcoming_relevant(trips, viewer_id, today).len(),
        created: created.len(),
        pending_requests: created.iter().map(|t| t.pending_count()).sum(),
        approved_rides: trips
            .iter()
            .filter(|t| t.creator_id != viewer_id && t.is_approved_rider(viewer_id))
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JoinRequest, TransportMode};
    use chrono::{NaiveTime, TimeZone, Utc};

    fn trip(college: &str, creator_id: Uuid, date: NaiveDate, hour: u32, seats: i32) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            route_from: "Patiala".to_string(),
            route_to: "Delhi".to_string(),
            date,
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            mode: TransportMode::Car,
            total_seats: 4,
            available_seats: seats,
            total_cost: Some(1000),
            price_per_person: Some(250),
            creator_id,
            creator_name: "Host".to_string(),
            creator_college: College::from(college.to_string()),
            status: TripStatus::Active,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            requests: Default::default(),
        }
    }

    fn with_request(mut t: Trip, requester: Uuid, status: RequestStatus) -> Trip {
        t.requests.insert(
            requester,
            JoinRequest {
                requester_name: "Rider".to_string(),
                requester_email: "rider@thapar.edu".to_string(),
                status,
                requested_at: t.created_at,
            },
        );
        t
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn joinable_is_partitioned_by_college() {
        let viewer = Uuid::new_v4();
        let college = College::from("thapar".to_string());
        let trips = vec![
            trip("thapar", Uuid::new_v4(), date(15), 9, 3),
            trip("chitkara", Uuid::new_v4(), date(15), 9, 3),
        ];
        let visible = joinable(&trips, viewer, &college, date(10), &TripFilters::default());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].creator_college.as_str(), "thapar");
    }

    #[test]
    fn joinable_excludes_own_past_full_and_inactive_trips() {
        let viewer = Uuid::new_v4();
        let college = College::from("thapar".to_string());
        let mut cancelled = trip("thapar", Uuid::new_v4(), date(15), 9, 3);
        cancelled.status = TripStatus::Cancelled;
        let trips = vec![
            trip("thapar", viewer, date(15), 9, 3),
            trip("thapar", Uuid::new_v4(), date(5), 9, 3),
            trip("thapar", Uuid::new_v4(), date(15), 9, 0),
            cancelled,
            trip("thapar", Uuid::new_v4(), date(16), 9, 2),
        ];
        let visible = joinable(&trips, viewer, &college, date(10), &TripFilters::default());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].date, date(16));
    }

    #[test]
    fn joinable_sorts_by_departure() {
        let viewer = Uuid::new_v4();
        let college = College::from("thapar".to_string());
        let trips = vec![
            trip("thapar", Uuid::new_v4(), date(16), 8, 3),
            trip("thapar", Uuid::new_v4(), date(15), 22, 3),
            trip("thapar", Uuid::new_v4(), date(15), 6, 3),
        ];
        let visible = joinable(&trips, viewer, &college, date(10), &TripFilters::default());
        let order: Vec<(NaiveDate, String)> =
            visible.iter().map(|t| (t.date, t.time.to_string())).collect();
        assert_eq!(
            order,
            vec![
                (date(15), "06:00:00".to_string()),
                (date(15), "22:00:00".to_string()),
                (date(16), "08:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn refinement_filters_are_pure_post_filters() {
        let viewer = Uuid::new_v4();
        let college = College::from("thapar".to_string());
        let mut bangalore = trip("thapar", Uuid::new_v4(), date(15), 9, 1);
        bangalore.route_to = "Bangalore".to_string();
        let trips = vec![trip("thapar", Uuid::new_v4(), date(16), 9, 3), bangalore];

        let by_dest = TripFilters {
            destination: Some("bangal".to_string()),
            ..Default::default()
        };
        assert_eq!(joinable(&trips, viewer, &college, date(10), &by_dest).len(), 1);

        let by_date = TripFilters {
            date: Some(date(16)),
            ..Default::default()
        };
        assert_eq!(joinable(&trips, viewer, &college, date(10), &by_date).len(), 1);

        let by_seats = TripFilters {
            min_seats: Some(2),
            ..Default::default()
        };
        assert_eq!(joinable(&trips, viewer, &college, date(10), &by_seats).len(), 1);
    }

    #[test]
    fn upcoming_relevant_orders_hosting_before_approved_before_requested() {
        let viewer = Uuid::new_v4();
        let hosted = trip("thapar", viewer, date(20), 9, 4);
        let approved = with_request(
            trip("thapar", Uuid::new_v4(), date(14), 9, 2),
            viewer,
            RequestStatus::Approved,
        );
        let pending = with_request(
            trip("thapar", Uuid::new_v4(), date(12), 9, 2),
            viewer,
            RequestStatus::Pending,
        );
        let unrelated = trip("thapar", Uuid::new_v4(), date(11), 9, 2);

        let trips = vec![pending.clone(), unrelated, approved.clone(), hosted.clone()];
        let upcoming = upcoming_relevant(&trips, viewer, date(10));
        let ids: Vec<Uuid> = upcoming.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![hosted.id, approved.id, pending.id]);
    }

    #[test]
    fn hosts_see_full_trips_riders_do_not() {
        let host = Uuid::new_v4();
        let rider = Uuid::new_v4();
        let full = with_request(
            trip("thapar", host, date(15), 9, 0),
            rider,
            RequestStatus::Approved,
        );
        let trips = vec![full];

        assert_eq!(upcoming_relevant(&trips, host, date(10)).len(), 1);
        assert_eq!(upcoming_relevant(&trips, rider, date(10)).len(), 0);
    }

    #[test]
    fn contacts_and_chat_unlock_on_approval_only() {
        let host = Uuid::new_v4();
        let approved = Uuid::new_v4();
        let pending = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let t = with_request(
            with_request(
                trip("thapar", host, date(15), 9, 2),
                approved,
                RequestStatus::Approved,
            ),
            pending,
            RequestStatus::Pending,
        );

        assert!(can_view_contacts(&t, host));
        assert!(can_view_contacts(&t, approved));
        assert!(!can_view_contacts(&t, pending));
        assert!(!can_view_contacts(&t, stranger));
        assert!(can_chat(&t, approved));
        assert!(!can_chat(&t, pending));
    }

    #[test]
    fn stats_count_per_role() {
        let viewer = Uuid::new_v4();
        let hosted = with_request(
            trip("thapar", viewer, date(20), 9, 4),
            Uuid::new_v4(),
            RequestStatus::Pending,
        );
        let ride = with_request(
            trip("thapar", Uuid::new_v4(), date(14), 9, 2),
            viewer,
            RequestStatus::Approved,
        );
        let stats = dashboard_stats(&[hosted, ride], viewer, date(10));
        assert_eq!(
            stats,
            DashboardStats {
                upcoming: 2,
                created: 1,
                pending_requests: 1,
                approved_rides: 1,
            }
        );
    }
}
