//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use schedule_core::{PortError, ScheduleError, ValidationError};
use serde_json::json;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scheduling operation failed.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error related to the WebSocket connection.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] axum::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request parameter could not be understood.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Schedule(ScheduleError::Validation(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Schedule(e) => match e {
                ScheduleError::Validation(_) => StatusCode::BAD_REQUEST,
                ScheduleError::NotFound(_) => StatusCode::NOT_FOUND,
                ScheduleError::SaveInProgress => StatusCode::CONFLICT,
                ScheduleError::NoSeason | ScheduleError::NoSelection => StatusCode::CONFLICT,
                ScheduleError::Store { .. } | ScheduleError::PartialSave(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let bad_date: ApiError = ValidationError::MalformedDate("2024-9-2".to_string()).into();
        assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);

        let busy: ApiError = ScheduleError::SaveInProgress.into();
        assert_eq!(busy.status(), StatusCode::CONFLICT);

        let missing: ApiError = PortError::NotFound("Season".to_string()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let store: ApiError = ScheduleError::Store {
            context: "listing seasons".to_string(),
            source: PortError::Unexpected("connection reset".to_string()),
        }
        .into();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
