pub mod expiry;
pub mod models;
pub mod repository;
pub mod views;
pub mod workflow;

pub use models::{ChatMessage, JoinRequest, NewTrip, RequestStatus, TransportMode, Trip, TripStatus};
pub use workflow::Decision;
