use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gifter_store::{ErrorKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized")]
    Unauthorized,

    /// The user is not a participant of the event (or it does not exist).
    #[error("Event not found")]
    NoAccess,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Client-correctable conflict (taken email, buyer lock).
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e.kind() {
            ErrorKind::AccessDenied => ServerError::NoAccess,
            ErrorKind::Conflict => ServerError::Conflict(e.to_string()),
            ErrorKind::NotFound => ServerError::NotFound(e.to_string()),
            ErrorKind::Validation => ServerError::BadRequest(e.to_string()),
            ErrorKind::Internal => ServerError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::NoAccess => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_by_kind() {
        assert!(matches!(
            ServerError::from(StoreError::NoAccess),
            ServerError::NoAccess
        ));
        assert!(matches!(
            ServerError::from(StoreError::BuyerConflict),
            ServerError::Conflict(_)
        ));
        assert!(matches!(
            ServerError::from(StoreError::UnknownParticipant("x@y.z".into())),
            ServerError::BadRequest(_)
        ));
        assert!(matches!(
            ServerError::from(StoreError::Migration("boom".into())),
            ServerError::Internal(_)
        ));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServerError::NoAccess, StatusCode::BAD_REQUEST),
            (ServerError::Conflict("taken".into()), StatusCode::BAD_REQUEST),
            (ServerError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ServerError::Internal("db down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
