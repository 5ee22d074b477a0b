use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bunkride_core::WorkflowError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    Workflow(WorkflowError),
    InternalServerError(String),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError::Workflow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Workflow(err) => {
                let status = match &err {
                    WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                    WorkflowError::NotAuthorized(_) => StatusCode::FORBIDDEN,
                    WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::DuplicateRequest { .. }
                    | WorkflowError::SelfJoin
                    | WorkflowError::TripFull
                    | WorkflowError::TripInactive { .. }
                    | WorkflowError::InvalidTransition { .. }
                    | WorkflowError::TooLate { .. } => StatusCode::CONFLICT,
                    WorkflowError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Store error: {}", err);
                    (status, "Internal Server Error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
