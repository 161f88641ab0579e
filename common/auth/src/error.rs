use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::claims::SchemaViolations;

pub type AuthResult<T> = Result<T, AuthError>;

const VALIDATION_FAILED: &str = "JWT validation failed";

/// Errors surfaced to callers. Every token problem collapses into `Validation`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "AUTH_TOKEN",
            AuthError::Unauthorized => "AUTH_REQUIRED",
            AuthError::Forbidden(_) => "AUTH_FORBIDDEN",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        Self::Validation(ValidationFailure::new(value))
    }
}

/// A token could not be turned into a trusted identity.
#[derive(Debug, Default)]
pub struct ValidationFailure {
    cause: Option<TokenError>,
}

impl ValidationFailure {
    pub fn new(cause: TokenError) -> Self {
        Self { cause: Some(cause) }
    }

    pub fn without_cause() -> Self {
        Self::default()
    }

    pub fn cause(&self) -> Option<&TokenError> {
        self.cause.as_ref()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self
            .cause
            .as_ref()
            .map(ToString::to_string)
            .filter(|message| !message.is_empty());
        match detail {
            Some(message) => write!(f, "{VALIDATION_FAILED}: {message}"),
            None => f.write_str(VALIDATION_FAILED),
        }
    }
}

impl std::error::Error for ValidationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Underlying reason a token was rejected.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("unsupported JWS algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("no applicable key found in the JSON Web Key Set")]
    NoMatchingKey,
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS request timed out after {0:?}")]
    JwksTimeout(Duration),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("\"exp\" claim timestamp check failed")]
    Expired,
    #[error("\"nbf\" claim timestamp check failed")]
    NotYetValid,
    #[error("unexpected \"iss\" claim value")]
    InvalidIssuer,
    #[error("unexpected \"aud\" claim value")]
    InvalidAudience,
    #[error("missing required \"{0}\" claim")]
    MissingClaim(String),
    #[error("{0}")]
    Malformed(String),
    #[error("invalid claims: {0}")]
    Claims(#[from] SchemaViolations),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::Validation(failure) => {
                debug!(error = %failure, "rejecting request with invalid token");
                VALIDATION_FAILED.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            code: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
