use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    dao::{catalog::CatalogError, storage::StorageError},
    state::{
        queue::QueueRejection,
        state_machine::{AbortError, ApplyError, PlanError},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested party, song or participant does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller lacks the role required for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Operation attempted against a party that has ended.
    #[error("party has ended")]
    Ended,
    /// Queue cap reached.
    #[error("queue is full")]
    QueueFull,
    /// Per-participant song cap reached.
    #[error("song limit reached")]
    PerPersonLimitReached,
    /// Lifecycle transition could not be planned or applied.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Music catalog could not be queried.
    #[error("catalog unavailable")]
    CatalogUnavailable(#[source] CatalogError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        ServiceError::CatalogUnavailable(err)
    }
}

impl From<QueueRejection> for ServiceError {
    fn from(err: QueueRejection) -> Self {
        match err {
            QueueRejection::QueueFull { .. } => ServiceError::QueueFull,
            QueueRejection::PerPersonLimitReached { .. } => ServiceError::PerPersonLimitReached,
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Caller is not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with the current party state, tagged with a machine-readable code.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    /// Service unavailable or degraded.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code carried in the `error` field of the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict { code, .. } => code,
            AppError::ServiceUnavailable(_) => "unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            err @ ServiceError::Ended => AppError::Conflict {
                code: "ended",
                message: err.to_string(),
            },
            err @ ServiceError::QueueFull => AppError::Conflict {
                code: "queue_full",
                message: err.to_string(),
            },
            err @ ServiceError::PerPersonLimitReached => AppError::Conflict {
                code: "per_person_limit_reached",
                message: err.to_string(),
            },
            ServiceError::InvalidState(message) => {
                error!(reason = %message, "party state machine rejected a transition");
                AppError::Internal("internal error".into())
            }
            ServiceError::Unavailable(source) => {
                error!(error = %source, "storage operation failed");
                AppError::ServiceUnavailable("storage unavailable".into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::CatalogUnavailable(source) => {
                error!(error = %source, "catalog request failed");
                AppError::ServiceUnavailable("catalog unavailable".into())
            }
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("state transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "state changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "state version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}
