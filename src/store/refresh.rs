use crate::error::AppError;
use crate::models::RefreshToken;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::PgPool;

/// Number of random bytes behind each opaque token value.
const TOKEN_BYTES: usize = 32;

/// Persistent store for opaque, single-use refresh tokens.
///
/// A principal may hold any number of live rows at once (one per device).
/// Rotation is delete-then-insert inside one transaction; the row delete is
/// the linearization point that guarantees at most one concurrent caller
/// can rotate a given value. No in-process locking is involved.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: PgPool,
    ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(pool: PgPool, refresh_ttl_secs: i64) -> Self {
        Self {
            pool,
            ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// Generates an unguessable opaque value: 32 bytes from the OS CSPRNG,
    /// URL-safe base64 without padding.
    fn generate_value() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Mints a fresh token for the principal, expiring `ttl` from now.
    pub async fn create(&self, user_id: i32) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (token, user_id, expiry_instant)
             VALUES ($1, $2, $3)
             RETURNING id, token, user_id, expiry_instant",
        )
        .bind(Self::generate_value())
        .bind(user_id)
        .bind(Utc::now() + self.ttl)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    /// Looks a token up by its opaque value.
    ///
    /// Deliberately does not filter on expiry: the session manager needs to
    /// tell an expired-but-present row (delete it, report expired) apart
    /// from a row that does not exist at all.
    pub async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, token, user_id, expiry_instant
             FROM refresh_tokens WHERE token = $1",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Deletes a specific row. Returns whether a row was removed.
    pub async fn delete(&self, token: &RefreshToken) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(token.id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes by opaque value. Absence is not an error; logout is
    /// idempotent on top of this.
    pub async fn delete_by_value(&self, value: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every token the principal holds, across all devices.
    pub async fn delete_all_for_user(&self, user_id: i32) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Atomically replaces `old` with a fresh token for the same principal.
    ///
    /// Returns `None` when the old row was already gone by the time the
    /// delete ran, i.e. a concurrent caller rotated (or logout revoked) the
    /// same value first. Exactly one caller can ever see `Some` for a given
    /// row; everyone else must report the token as not found.
    pub async fn rotate(&self, old: &RefreshToken) -> Result<Option<RefreshToken>, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(old.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let replacement = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (token, user_id, expiry_instant)
             VALUES ($1, $2, $3)
             RETURNING id, token, user_id, expiry_instant",
        )
        .bind(Self::generate_value())
        .bind(old.user_id)
        .bind(Utc::now() + self.ttl)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(replacement))
    }
}
