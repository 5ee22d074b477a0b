#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A request already exists on this trip with status {status}")]
    DuplicateRequest { status: String },

    #[error("Hosts cannot request a seat on their own trip")]
    SelfJoin,

    #[error("Trip is fully booked")]
    TripFull,

    #[error("Trip is {status} and not accepting requests")]
    TripInactive { status: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Deletion window has passed: less than {window_hours} hours before departure")]
    TooLate { window_hours: i64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
