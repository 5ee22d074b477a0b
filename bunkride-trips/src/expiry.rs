//! Expiry bookkeeping for departed trips.
//!
//! The sweep is cleanup, not a safety mechanism: the read side filters on
//! `date >= today` independently, so a trip that has departed but not yet
//! been swept never reaches a listing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Trip;

/// Trips whose departure instant has passed.
pub fn sweep_candidates(trips: &[Trip], now: DateTime<Utc>) -> Vec<Uuid> {
    trips
        .iter()
        .filter(|t| t.is_expired(now))
        .map(|t| t.id)
        .collect()
}
