use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Public part of the user returned to clients. Carries no secrets.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub role_id: i32,
    pub provider_id: i32,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            uuid: u.uuid,
            username: u.username,
            email: u.email,
            role_id: u.role_id,
            provider_id: u.provider_id,
            email_verified: u.email_verified,
            two_factor_enabled: u.two_factor_enabled,
            last_login: u.last_login,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    100
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    /// `(limit, offset)` with page and limit clamped to sane ranges.
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = self.limit.clamp(1, Self::MAX_LIMIT);
        let page = self.page.max(1);
        (limit, (page - 1) * limit)
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
    pub total: i64,
}
