// src/error.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode as AxumStatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::approval::TransitionError;
use crate::luma_client::StoreError;
use crate::permissions::Permission;

/// Envelope shared by every API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn empty() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }

    pub fn failure(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.into()),
        })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Document store error")]
    Store(#[from] StoreError),
    #[error("Stored document is malformed: {0}")]
    MalformedDocument(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing permission: {0}")]
    Forbidden(Permission),
    #[error("Invalid approval transition")]
    Transition(#[from] TransitionError),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            AppError::Store(store_err) => {
                error!("Document store failure: {:?}", store_err);
                (
                    AxumStatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to communicate with the document store.".to_string(),
                )
            }
            AppError::MalformedDocument(details) => {
                error!("Malformed document: {}", details);
                (
                    AxumStatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error processing stored data.".to_string(),
                )
            }
            AppError::BadRequest(details) => {
                warn!("Bad request: {}", details);
                (AxumStatusCode::BAD_REQUEST, details.clone())
            }
            AppError::NotFound(entity) => {
                (AxumStatusCode::NOT_FOUND, format!("{} not found", entity))
            }
            AppError::Unauthorized => (
                AxumStatusCode::UNAUTHORIZED,
                "Authentication required.".to_string(),
            ),
            AppError::InvalidCredentials => (
                AxumStatusCode::UNAUTHORIZED,
                "Invalid email or password.".to_string(),
            ),
            AppError::Forbidden(permission) => {
                warn!("Permission denied: {}", permission);
                (
                    AxumStatusCode::FORBIDDEN,
                    format!("Missing permission '{}'.", permission),
                )
            }
            AppError::Transition(transition) => {
                warn!("Rejected approval transition: {}", transition);
                (AxumStatusCode::CONFLICT, transition.to_string())
            }
            AppError::Conflict(details) => {
                warn!("Conflict: {}", details);
                (AxumStatusCode::CONFLICT, details.clone())
            }
        };

        (status_code, ApiResponse::failure(error_message)).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::approval::ApprovalStatus;

    fn status_of(err: AppError) -> AxumStatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        let store = StoreError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert_eq!(
            status_of(AppError::Store(store)),
            AxumStatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::BadRequest("id is required".into())),
            AxumStatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("Task")),
            AxumStatusCode::NOT_FOUND
        );
        assert_eq!(status_of(AppError::Unauthorized), AxumStatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::Forbidden(Permission::ReportsCosts)),
            AxumStatusCode::FORBIDDEN
        );
        let transition = ApprovalStatus::Approved
            .transition_to(ApprovalStatus::Rejected)
            .unwrap_err();
        assert_eq!(
            status_of(AppError::from(transition)),
            AxumStatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Conflict("entry is approved".into())),
            AxumStatusCode::CONFLICT
        );
    }

    #[test]
    fn test_failure_envelope_shape() {
        let Json(body) = ApiResponse::failure("nope");
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value, serde_json::json!({ "success": false, "error": "nope" }));
    }
}
