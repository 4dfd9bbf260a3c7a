use crate::auth::password::verify_password;
use crate::error::AppError;
use crate::models::User;
use sqlx::PgPool;

/// Lookup and verification against the `users` table.
///
/// The session manager and the principal resolver consume this through two
/// calls only: credential verification at login and username resolution on
/// authenticated requests.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, enabled, created_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, enabled, created_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, enabled, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Verifies a username/password pair.
    ///
    /// Unknown user, wrong password, and disabled account all collapse to
    /// `AuthenticationFailed`; the distinction is logged at debug only so
    /// the response cannot be used to probe which part was wrong.
    pub async fn verify(&self, username: &str, password: &str) -> Result<User, AppError> {
        let user = match self.find_by_username(username).await? {
            Some(user) => user,
            None => {
                log::debug!("login rejected: unknown username");
                return Err(AppError::AuthenticationFailed);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            log::debug!("login rejected for user {}: wrong password", user.id);
            return Err(AppError::AuthenticationFailed);
        }

        if !user.enabled {
            log::debug!("login rejected for user {}: account disabled", user.id);
            return Err(AppError::AuthenticationFailed);
        }

        Ok(user)
    }

    /// Inserts a new user row. Uniqueness of username/email is checked by
    /// the caller first; the database constraints remain the backstop.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, username, email, password_hash, enabled, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
