//!
//! # Session Manager
//!
//! Orchestrates login, refresh (rotation), and logout over the credential
//! store, the refresh-token store, and the signed-token codec. This is the
//! only place with business rules across those components; the stores stay
//! mechanical and the codec stays pure.
//!
//! Refresh-token lifecycle, per value: live while its row exists and has
//! not expired; terminal once rotated (row replaced), expired (row deleted
//! on first use past the expiry instant), or revoked (row deleted by
//! logout). Replay of a rotated value resolves to "not found" because the
//! row no longer exists; that absence is the replay-detection mechanism.

use crate::auth::{TokenCodec, TokenPairResponse};
use crate::error::AppError;
use crate::models::User;
use crate::store::{CredentialStore, RefreshTokenStore};

pub struct SessionManager {
    credentials: CredentialStore,
    refresh_tokens: RefreshTokenStore,
    codec: TokenCodec,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        refresh_tokens: RefreshTokenStore,
        codec: TokenCodec,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            codec,
        }
    }

    /// Issues a fresh token pair for an already-authenticated principal:
    /// one signed access token plus one newly minted refresh token. Called
    /// by login and registration; existing refresh tokens of the principal
    /// (other devices) are left untouched.
    pub async fn issue_pair(&self, user: &User) -> Result<TokenPairResponse, AppError> {
        let access_token = self.codec.issue(&user.username)?;
        let refresh_token = self.refresh_tokens.create(user.id).await?;

        Ok(TokenPairResponse::bearer(
            access_token,
            refresh_token.token,
            self.codec.access_ttl_secs(),
        ))
    }

    /// Verifies credentials and opens a session.
    ///
    /// Bad credentials and disabled accounts are rejected inside
    /// `CredentialStore::verify` with a uniform `AuthenticationFailed`.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPairResponse, AppError> {
        let user = self.credentials.verify(username, password).await?;

        log::info!("user {} logged in", user.id);
        self.issue_pair(&user).await
    }

    /// Exchanges a live refresh token for a new pair, rotating the token.
    ///
    /// Misses report `TokenNotFound`. A present-but-expired row is deleted
    /// first and reported as `TokenExpired`; any later use of that value
    /// then reports `TokenNotFound` like every other dead token. A row that
    /// disappears between lookup and rotation means a concurrent caller
    /// rotated the same value; the loser reports `TokenNotFound` as well.
    pub async fn refresh(&self, refresh_value: &str) -> Result<TokenPairResponse, AppError> {
        let token = self
            .refresh_tokens
            .find_by_value(refresh_value)
            .await?
            .ok_or(AppError::TokenNotFound)?;

        if token.is_expired() {
            // Cleanup on detection; the row is gone before we answer.
            self.refresh_tokens.delete(&token).await?;
            log::debug!("expired refresh token removed for user {}", token.user_id);
            return Err(AppError::TokenExpired);
        }

        let rotated = match self.refresh_tokens.rotate(&token).await? {
            Some(rotated) => rotated,
            None => {
                log::debug!("lost rotation race for a token of user {}", token.user_id);
                return Err(AppError::TokenNotFound);
            }
        };

        let user = self
            .credentials
            .find_by_id(rotated.user_id)
            .await?
            .ok_or(AppError::TokenNotFound)?;
        if !user.enabled {
            log::debug!("refresh rejected for user {}: account disabled", user.id);
            return Err(AppError::AuthenticationFailed);
        }

        let access_token = self.codec.issue(&user.username)?;
        log::debug!("rotated refresh token for user {}", user.id);

        Ok(TokenPairResponse::bearer(
            access_token,
            rotated.token,
            self.codec.access_ttl_secs(),
        ))
    }

    /// Revokes a refresh token by value. Idempotent: revoking a value that
    /// is absent (never issued, already rotated, already revoked) succeeds.
    pub async fn logout(&self, refresh_value: &str) -> Result<(), AppError> {
        if self.refresh_tokens.delete_by_value(refresh_value).await? {
            log::debug!("refresh token revoked by logout");
        }
        Ok(())
    }

    /// Revokes every session of the principal at once, across all devices.
    /// Hook for full logout and credential changes.
    pub async fn logout_all(&self, user_id: i32) -> Result<u64, AppError> {
        let revoked = self.refresh_tokens.delete_all_for_user(user_id).await?;
        log::info!("revoked {} session(s) for user {}", revoked, user_id);
        Ok(revoked)
    }
}
