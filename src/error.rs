//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the
//! application, together with the uniform JSON envelope every error response
//! is rendered into.
//!
//! `AppError` implements `actix_web::error::ResponseError` so handler errors
//! convert into HTTP responses automatically. It also provides `From` trait
//! implementations for common error types like `sqlx::Error`,
//! `validator::ValidationErrors`, `jsonwebtoken::errors::Error`, and
//! `bcrypt::BcryptError`, allowing for easy conversion using the `?` operator.
//!
//! All authentication failures deliberately collapse to 401 with a small set
//! of fixed messages; which of username/password was wrong, or why exactly a
//! token failed to decode, is never surfaced to the client.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use validator::ValidationErrors;

/// Uniform error envelope returned for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Bad credentials or a disabled account on login (HTTP 401).
    /// Rendered with a generic message so the client cannot tell which
    /// of username/password was wrong.
    AuthenticationFailed,
    /// A refresh token that is absent from the store: never issued, already
    /// rotated, or revoked by logout (HTTP 401).
    TokenNotFound,
    /// A refresh token that was found but whose expiry instant has passed
    /// (HTTP 401). The row is deleted before this error is returned.
    TokenExpired,
    /// A missing, malformed, expired, or wrongly signed access token on the
    /// stateless validation path (HTTP 401). Also used when a structurally
    /// valid token resolves to a vanished or disabled account.
    InvalidAccessToken,
    /// Represents a client-side error due to a malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// Represents a situation where a requested resource was not found (HTTP 404).
    NotFound(String),
    /// Represents an unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Represents an error originating from database operations (HTTP 500).
    /// Wraps errors from the `sqlx` crate.
    DatabaseError(String),
    /// Represents an error due to failed input validation (HTTP 422 Unprocessable Entity).
    /// Wraps errors from the `validator` crate.
    ValidationError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailed
            | AppError::TokenNotFound
            | AppError::TokenExpired
            | AppError::InvalidAccessToken => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Message placed in the envelope. Fixed strings for the auth taxonomy,
    /// the carried detail for everything else.
    pub fn message(&self) -> String {
        match self {
            AppError::AuthenticationFailed => "invalid username or password".to_string(),
            AppError::TokenNotFound => "refresh token not found".to_string(),
            AppError::TokenExpired => {
                "refresh token has expired, please login again".to_string()
            }
            AppError::InvalidAccessToken => "unauthenticated".to_string(),
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ValidationError(msg) => msg.clone(),
        }
    }

    /// Renders the uniform envelope for the given request path.
    ///
    /// The principal-resolver middleware calls this for every error it
    /// produces or catches, so the `path` field reflects the request that
    /// actually failed.
    pub fn error_response_at(&self, path: &str) -> HttpResponse {
        let status = self.status();
        HttpResponse::build(status).json(ErrorBody {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: self.message(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::AuthenticationFailed => write!(f, "Authentication failed"),
            AppError::TokenNotFound => write!(f, "Refresh token not found"),
            AppError::TokenExpired => write!(f, "Refresh token expired"),
            AppError::InvalidAccessToken => write!(f, "Invalid access token"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// Handlers below the principal-resolver middleware rarely hit this path
/// (the middleware re-renders their errors with the request path); it exists
/// so `AppError` satisfies actix's error conversions everywhere.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        self.error_response_at("")
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `sqlx::Error::RowNotFound` maps to `AppError::NotFound`; any other
/// database error becomes `AppError::DatabaseError`, rendered as a 5xx for
/// the specific request only.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::InvalidAccessToken`.
///
/// The decode failure detail is only useful for logging; callers log it at
/// debug before the conversion collapses it.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> AppError {
        AppError::InvalidAccessToken
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::AuthenticationFailed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenNotFound.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidAccessToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::BadRequest("Invalid input".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("Resource not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InternalServerError("Server error".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ValidationError("bad field".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_auth_failures_do_not_leak_detail() {
        // Bad username and bad password must be indistinguishable.
        assert_eq!(
            AppError::AuthenticationFailed.message(),
            "invalid username or password"
        );
        assert_eq!(AppError::InvalidAccessToken.message(), "unauthenticated");
    }

    #[test]
    fn test_error_envelope_shape() {
        let response = AppError::TokenNotFound.error_response_at("/api/auth/refresh");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = actix_web::body::to_bytes(response.into_body());
        let body = futures::executor::block_on(body).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], 401);
        assert_eq!(json["error"], "Unauthorized");
        assert_eq!(json["message"], "refresh token not found");
        assert_eq!(json["path"], "/api/auth/refresh");
        assert!(json["timestamp"].is_string());
    }
}
