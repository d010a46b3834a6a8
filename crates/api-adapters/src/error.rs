//! API error types and response formatting.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{DomainError, EntityKind};
use serde::Serialize;

/// Error returned by every handler. Domain failures keep their variant so
/// the client can render a specific message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed path, query or body.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

fn entity_code(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Thread => "thread_not_found",
        EntityKind::Message => "message_not_found",
        EntityKind::Gossip => "gossip_not_found",
        EntityKind::Comment => "comment_not_found",
        EntityKind::User => "user_not_found",
    }
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Domain(err) => match err {
                DomainError::NotFound { kind, .. } => (StatusCode::NOT_FOUND, entity_code(*kind)),
                DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
                DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                DomainError::Expired { .. } => (StatusCode::GONE, "expired"),
                DomainError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                DomainError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let message = match &self {
            Self::Domain(DomainError::Storage(detail)) => {
                tracing::error!(error = %detail, "storage failure");
                "The service is temporarily unavailable, please retry".to_string()
            }
            Self::Domain(err) => err.to_string(),
            Self::BadRequest(detail) => detail.clone(),
        };
        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{ConflictReason, ForbiddenReason, ValidationError};
    use uuid::Uuid;

    #[test]
    fn domain_errors_map_to_distinct_statuses() {
        let cases = [
            (DomainError::not_found(EntityKind::Thread, Uuid::nil()), StatusCode::NOT_FOUND),
            (ForbiddenReason::NotAMember.into(), StatusCode::FORBIDDEN),
            (ConflictReason::AlreadyPending.into(), StatusCode::CONFLICT),
            (DomainError::expired(EntityKind::Thread, Uuid::nil()), StatusCode::GONE),
            (ValidationError::EmptyMessage.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::storage("pool timed out"), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_and_code().0, status);
        }
    }

    #[tokio::test]
    async fn storage_details_stay_out_of_the_body() {
        let response = ApiError::from(DomainError::storage("disk path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unavailable");
        assert!(!json["message"].as_str().unwrap().contains("/var/db"));
    }
}
