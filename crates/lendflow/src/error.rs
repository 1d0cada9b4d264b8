use crate::config::ConfigError;
use crate::links::LinkError;
use crate::telemetry::TelemetryError;
use crate::workflows::underwriting::repository::{
    ProviderError, RepositoryError, StorageError,
};
use crate::workflows::underwriting::service::LoanServiceError;
use crate::workflows::underwriting::WorkflowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Service(LoanServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Service(err) => write!(f, "workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Service(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Service(err) => service_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Service(LoanServiceError::Workflow(WorkflowError::ValidationFailed {
                violations,
            })) => Json(json!({ "error": "validation failed", "violations": violations })),
            _ => Json(json!({ "error": self.to_string() })),
        };
        (status, body).into_response()
    }
}

fn service_status(err: &LoanServiceError) -> StatusCode {
    match err {
        LoanServiceError::Workflow(workflow) => match workflow {
            WorkflowError::InvalidTransition { .. } | WorkflowError::ValidationFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WorkflowError::Locked { .. } | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Unauthorized => StatusCode::UNAUTHORIZED,
        },
        LoanServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LoanServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LoanServiceError::Repository(RepositoryError::Unavailable(_))
        | LoanServiceError::Storage(StorageError::Unavailable(_))
        | LoanServiceError::Provider(ProviderError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        LoanServiceError::Link(LinkError::SignatureMismatch | LinkError::Expired) => {
            StatusCode::UNAUTHORIZED
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<LoanServiceError> for AppError {
    fn from(value: LoanServiceError) -> Self {
        Self::Service(value)
    }
}
