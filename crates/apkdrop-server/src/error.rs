use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("File exceeds the upload limit of {max} bytes")]
    TooLarge { max: u64 },

    /// Filesystem failure; the message names the operation, the OS error
    /// is logged where it happened.
    #[error("{0}")]
    Io(String),

    #[error("Malformed document: {0}")]
    Serialization(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Log an I/O failure with its OS error and keep only `context` for the
    /// client.
    pub fn io(context: impl Into<String>, err: std::io::Error) -> Self {
        let context = context.into();
        tracing::error!(error = %err, "{}", context);
        PortalError::Io(context)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::Io(_) | PortalError::Serialization(_) | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            PortalError::Serialization(_) | PortalError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.public_message(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PortalError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PortalError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::TooLarge { max: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            PortalError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = PortalError::Internal("stack trace here".into());
        assert_eq!(err.public_message(), "Internal server error");
        let err = PortalError::Io("Failed to write file to disk".into());
        assert_eq!(err.public_message(), "Failed to write file to disk");
    }
}
