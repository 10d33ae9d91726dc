use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role id of the admin role, seeded by the initial migration.
pub const ADMIN_ROLE_ID: i32 = 1;

/// User record in the database. Never serialised directly; see `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>, // None for OAuth-only accounts
    pub role_id: i32,
    pub provider_id: i32,
    pub two_factor_enabled: bool,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    pub is_online: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_role_id(self.role_id)
    }
}

/// Row to insert. `uuid` and timestamps are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role_id: i32,
    pub provider_id: i32,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
}

/// The only profile columns a caller may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub two_factor_enabled: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.two_factor_enabled.is_none()
    }
}

/// Coarse role label attached to authenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn from_role_id(role_id: i32) -> Self {
        if role_id == ADMIN_ROLE_ID {
            Role::Admin
        } else {
            Role::User
        }
    }
}
