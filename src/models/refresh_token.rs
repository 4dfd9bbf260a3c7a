use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A row of the `refresh_tokens` table.
///
/// A token is live exactly while its row exists and `expiry_instant` is in
/// the future. There is no "used" flag: rotation deletes the row, so a
/// replayed value simply fails to resolve.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: i64,
    /// Opaque random value handed to the client. Unique across the store.
    pub token: String,
    pub user_id: i32,
    pub expiry_instant: DateTime<Utc>,
}

impl RefreshToken {
    /// Wall-clock expiry check, evaluated at use time.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_instant
    }
}
