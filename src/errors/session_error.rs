use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Error codes for structured error responses
pub mod error_codes {
    pub const MISSING_SESSION_TOKEN: &str = "missing_session_token";
    pub const INVALID_SESSION_TOKEN: &str = "invalid_session_token";
}

/// Rejections of the session token presented at WebSocket upgrade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `session_id` or `token` query parameter absent
    #[error("Missing session token")]
    MissingToken,

    /// Unknown, expired, already used, or mismatched token
    #[error("Invalid or expired session token")]
    InvalidToken,
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::MissingToken => error_codes::MISSING_SESSION_TOKEN,
            SessionError::InvalidToken => error_codes::INVALID_SESSION_TOKEN,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        match self {
            SessionError::MissingToken => tracing::debug!("{}", self),
            SessionError::InvalidToken => tracing::warn!("{}", self),
        }

        // Response format: {"error": "error_code", "message": "human readable message"}
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string()
        }));

        (self.status_code(), body).into_response()
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SessionError::MissingToken.error_code(),
            error_codes::MISSING_SESSION_TOKEN
        );
        assert_eq!(
            SessionError::InvalidToken.error_code(),
            error_codes::INVALID_SESSION_TOKEN
        );
    }

    #[test]
    fn test_rejections_are_unauthorized() {
        let response = SessionError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
