use std::collections::BTreeMap;

use bunkride_core::College;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Car,
    Bus,
    Train,
    Metro,
    Bike,
    Flight,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Car => "car",
            TransportMode::Bus => "bus",
            TransportMode::Train => "train",
            TransportMode::Metro => "metro",
            TransportMode::Bike => "bike",
            TransportMode::Flight => "flight",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "car" => Some(TransportMode::Car),
            "bus" => Some(TransportMode::Bus),
            "train" => Some(TransportMode::Train),
            "metro" => Some(TransportMode::Metro),
            "bike" => Some(TransportMode::Bike),
            "flight" => Some(TransportMode::Flight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(TripStatus::Active),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A rider's application to join a trip. Keyed by requester id on the trip,
/// so a requester can hold at most one request per trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub requester_name: String,
    pub requester_email: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
}

/// A host-created ride offer with fixed seats and cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: TransportMode,
    pub total_seats: i32,
    pub available_seats: i32,
    /// None = the host marked the cost as undecided.
    pub total_cost: Option<i64>,
    /// Derived once at creation; None while the cost is undecided.
    pub price_per_person: Option<i64>,
    pub creator_id: Uuid,
    pub creator_name: String,
    /// Snapshot of the host's college at creation, used for visibility partitioning.
    pub creator_college: College,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub requests: BTreeMap<Uuid, JoinRequest>,
}

impl Trip {
    /// Date and time are naive; the whole system compares them in one zone.
    pub fn departure(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.departure() < now
    }

    pub fn request_of(&self, requester_id: Uuid) -> Option<&JoinRequest> {
        self.requests.get(&requester_id)
    }

    pub fn pending_count(&self) -> usize {
        self.requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .count()
    }

    pub fn is_approved_rider(&self, user_id: Uuid) -> bool {
        self.requests
            .get(&user_id)
            .map(|r| r.status == RequestStatus::Approved)
            .unwrap_or(false)
    }
}

/// One entry in a trip's message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Validated-at-the-boundary input for trip creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub route_from: String,
    pub route_to: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: TransportMode,
    pub total_seats: i32,
    /// None = cost undecided.
    pub total_cost: Option<i64>,
}

/// floor(total_cost / total_seats); undecided cost stays undecided.
pub fn price_per_person(total_cost: Option<i64>, total_seats: i32) -> Option<i64> {
    total_cost.map(|cost| cost / total_seats as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_floored() {
        assert_eq!(price_per_person(Some(1000), 4), Some(250));
        assert_eq!(price_per_person(Some(1000), 3), Some(333));
    }

    #[test]
    fn undecided_cost_has_no_price() {
        assert_eq!(price_per_person(None, 4), None);
    }

    #[test]
    fn status_text_round_trips() {
        for status in ["pending", "approved", "rejected"] {
            assert_eq!(RequestStatus::parse(status).unwrap().as_str(), status);
        }
        for status in ["active", "completed", "cancelled"] {
            assert_eq!(TripStatus::parse(status).unwrap().as_str(), status);
        }
        for mode in ["car", "bus", "train", "metro", "bike", "flight"] {
            assert_eq!(TransportMode::parse(mode).unwrap().as_str(), mode);
        }
    }
}
