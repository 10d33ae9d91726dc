use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserUpdate};

/// Column list shared by every query that returns a full `User`.
macro_rules! user_columns {
    () => {
        "id, uuid, username, email, password_hash, role_id, provider_id, \
         two_factor_enabled, email_verified, email_verification_token, \
         password_reset_token, password_reset_expires, last_login, is_online, \
         created_at, updated_at, deleted_at"
    };
}

/// Partial unique index on live emails.
pub const EMAIL_UNIQUE_KEY: &str = "users_email_live_key";
/// Partial unique index on live usernames.
pub const USERNAME_UNIQUE_KEY: &str = "users_username_live_key";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of user identities. Every read and write only sees rows with
/// `deleted_at IS NULL`. Writes report "no matching row" as `false`/`None`,
/// never as an error.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>>;
    /// Account bound to the named provider with the given email.
    async fn find_by_provider_email(&self, provider: &str, email: &str)
        -> StoreResult<Option<User>>;

    async fn role_id(&self, name: &str) -> StoreResult<Option<i32>>;
    async fn provider_id(&self, name: &str) -> StoreResult<Option<i32>>;

    async fn insert_user(&self, new: &NewUser) -> StoreResult<User>;
    async fn update_fields(
        &self,
        id: i64,
        update: &UserUpdate,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>>;
    /// Page of users, newest first, plus the total number of live users.
    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)>;
    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> StoreResult<bool>;

    /// Overwrites any outstanding reset token for the account with `email`.
    async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expires: OffsetDateTime,
    ) -> StoreResult<bool>;
    async fn find_by_reset_token(&self, token: &str, now: OffsetDateTime)
        -> StoreResult<Option<User>>;
    /// Sets the new hash and clears token and expiry together, provided
    /// `token` is still the live reset token of user `id`.
    async fn complete_password_reset(
        &self,
        id: i64,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Replaces the verification token of an account that is not yet verified.
    async fn set_verification_token(&self, id: i64, token: &str) -> StoreResult<bool>;
    /// Flags the account unverified and stores a fresh verification token,
    /// used after the email address changed.
    async fn reset_email_verification(&self, id: i64, token: &str) -> StoreResult<bool>;
    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>>;
    /// Marks the email verified and clears the token, provided `token` is
    /// still the outstanding verification token of user `id`.
    async fn mark_email_verified(&self, id: i64, token: &str) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE (email = $1 OR username = $2) AND deleted_at IS NULL LIMIT 1"
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_provider_email(
        &self,
        provider: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users
              WHERE email = $1
                AND provider_id = (SELECT id FROM providers WHERE name = $2)
                AND deleted_at IS NULL"
        ))
        .bind(email)
        .bind(provider)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn role_id(&self, name: &str) -> StoreResult<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }

    async fn provider_id(&self, name: &str) -> StoreResult<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM providers WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }

    async fn insert_user(&self, new: &NewUser) -> StoreResult<User> {
        // The partial unique indexes on email/username are what actually
        // serialise concurrent registrations; a loser surfaces as Conflict.
        let user = sqlx::query_as::<_, User>(concat!(
            "INSERT INTO users (
                uuid, username, email, password_hash, role_id, provider_id,
                email_verified, email_verification_token
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING ",
            user_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role_id)
        .bind(new.provider_id)
        .bind(new.email_verified)
        .bind(&new.email_verification_token)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_fields(
        &self,
        id: i64,
        update: &UserUpdate,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "UPDATE users
                SET username = COALESCE($2, username),
                    email = COALESCE($3, email),
                    two_factor_enabled = COALESCE($4, two_factor_enabled),
                    updated_at = $5
              WHERE id = $1 AND deleted_at IS NULL
          RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(update.two_factor_enabled)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        let rows = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users
              WHERE deleted_at IS NULL
              ORDER BY created_at DESC, id DESC
              LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.db)
                .await?;

        Ok((rows, total))
    }

    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET last_login = $2, updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expires: OffsetDateTime,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_reset_token = $2,
                   password_reset_expires = $3
             WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .bind(token)
        .bind(expires)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users
              WHERE password_reset_token = $1
                AND password_reset_expires > $2
                AND deleted_at IS NULL"
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn complete_password_reset(
        &self,
        id: i64,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3,
                   password_reset_token = NULL,
                   password_reset_expires = NULL,
                   updated_at = $4
             WHERE id = $1
               AND password_reset_token = $2
               AND password_reset_expires > $4
               AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_verification_token(&self, id: i64, token: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email_verification_token = $2
             WHERE id = $1 AND email_verified = FALSE AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reset_email_verification(&self, id: i64, token: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email_verified = FALSE,
                   email_verification_token = $2
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email_verification_token = $1 AND deleted_at IS NULL"
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn mark_email_verified(&self, id: i64, token: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email_verified = TRUE,
                   email_verification_token = NULL,
                   updated_at = now()
             WHERE id = $1 AND email_verification_token = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
