pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use extractors::CurrentUser;
pub use middleware::PrincipalResolver;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenCodec};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a user login request.
///
/// Only presence is validated here; anything beyond that (unknown user,
/// wrong password, disabled account) is an authentication failure, not a
/// validation failure, and must come back as a uniform 401.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username for the new account.
    /// Must be between 3 and 32 characters, alphanumeric, and can include underscores or hyphens.
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    /// Email address for the new account.
    /// Must be a valid email format.
    #[validate(email)]
    pub email: String,
    /// Password for the new account.
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Payload carrying an opaque refresh-token value (refresh and logout).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by successful login, registration, and refresh.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    /// Short-lived signed access token.
    pub access_token: String,
    /// Long-lived opaque refresh token, valid for exactly one refresh.
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

impl TokenPairResponse {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            username: "alice".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        // A short password is a credential problem, not a validation
        // problem; it must pass validation and fail authentication later.
        let short_password_login = LoginRequest {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        };
        assert!(short_password_login.validate().is_ok());

        let empty_username_login = LoginRequest {
            username: "".to_string(),
            password: "password123".to_string(),
        };
        assert!(empty_username_login.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let valid_register = RegisterRequest {
            username: "test_user-123".to_string(),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_register.validate().is_ok());

        let invalid_username_register = RegisterRequest {
            username: "test user!".to_string(), // Contains space and exclamation
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_username_register.validate().is_err());

        let short_username_register = RegisterRequest {
            username: "tu".to_string(),
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(short_username_register.validate().is_err());

        let short_password_register = RegisterRequest {
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            password: "123".to_string(),
        };
        assert!(short_password_register.validate().is_err());
    }

    #[test]
    fn test_token_pair_wire_shape() {
        let pair = TokenPairResponse::bearer("acc".to_string(), "ref".to_string(), 900);
        let json = serde_json::to_value(&pair).unwrap();

        assert_eq!(json["accessToken"], "acc");
        assert_eq!(json["refreshToken"], "ref");
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 900);
    }

    #[test]
    fn test_refresh_request_wire_shape() {
        let req: RefreshRequest =
            serde_json::from_value(serde_json::json!({ "refreshToken": "opaque" })).unwrap();
        assert_eq!(req.refresh_token, "opaque");
    }
}
