//! Authentication Error Types
//!
//! Every failure the core can produce. Authentication failures all collapse
//! into one uniform 401 response at the HTTP boundary.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;

/// Body message for every unauthenticated response
pub const UNAUTHENTICATED_MESSAGE: &str = "Could not validate credentials";

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Stored credential record is missing its salt, hash or KDF parameters
    #[error("Malformed credential record")]
    InvalidRecord,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    /// Token could not be parsed at all
    #[error("Token is malformed")]
    Malformed,

    /// Signature is fine but issuer/audience belong to someone else
    #[error("Token claims do not match this issuer")]
    InvalidClaims,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    MissingToken,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Whether this error means "the caller is not authenticated"
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidSignature
                | AuthError::Expired
                | AuthError::Malformed
                | AuthError::InvalidClaims
                | AuthError::InvalidCredentials
                | AuthError::MissingToken
        )
    }
}

/// The single response every authentication failure turns into
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": UNAUTHENTICATED_MESSAGE
        })),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AuthError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AuthError::Config(_) | AuthError::InvalidRecord | AuthError::Internal => {
                tracing::error!(error = %self, "Authentication failed on the server side");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            _ => return unauthorized_response(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error_code,
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature => AuthError::InvalidClaims,
            _ => AuthError::Malformed,
        }
    }
}
