//! In-memory `UserStore` for tests. A single mutex makes each operation
//! atomic, standing in for the database's unique indexes.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{
    StoreError, StoreResult, UserStore, EMAIL_UNIQUE_KEY, USERNAME_UNIQUE_KEY,
};
use super::repo_types::{NewUser, User, UserUpdate, ADMIN_ROLE_ID};

struct Inner {
    users: Vec<User>,
    roles: Vec<(i32, String)>,
    providers: Vec<(i32, String)>,
    next_id: i64,
}

pub struct InMemoryUserStore {
    inner: Mutex<Inner>,
}

impl InMemoryUserStore {
    /// Store seeded like the initial migration.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: Vec::new(),
                roles: vec![(ADMIN_ROLE_ID, "admin".into()), (2, "user".into())],
                providers: vec![(1, "local".into()), (2, "google".into()), (3, "github".into())],
                next_id: 1,
            }),
        }
    }

    /// Store without any roles or providers, to exercise misconfiguration.
    pub fn unseeded() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.roles.clear();
            inner.providers.clear();
        }
        store
    }

    pub fn soft_delete(&self, id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(u) = inner.users.iter_mut().find(|u| u.id == id) {
            u.deleted_at = Some(OffsetDateTime::now_utc());
        }
    }

    pub fn set_role(&self, id: i64, role_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(u) = inner.users.iter_mut().find(|u| u.id == id) {
            u.role_id = role_id;
        }
    }

    /// Raw row lookup that ignores soft deletion.
    pub fn raw(&self, id: i64) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|u| u.id == id).cloned()
    }

    /// Number of rows, deleted ones included.
    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }
}

impl Inner {
    fn live(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| u.deleted_at.is_none())
    }

    fn live_mut(&mut self, id: i64) -> Option<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
    }

    fn check_unique(&self, id: Option<i64>, email: &str, username: &str) -> StoreResult<()> {
        for u in self.live().filter(|u| Some(u.id) != id) {
            if u.email == email {
                return Err(StoreError::Conflict(EMAIL_UNIQUE_KEY.into()));
            }
            if u.username == username {
                return Err(StoreError::Conflict(USERNAME_UNIQUE_KEY.into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let found = inner.live().find(|u| u.id == id).cloned();
        Ok(found)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let found = inner.live().find(|u| u.email == email).cloned();
        Ok(found)
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let found = inner
            .live()
            .find(|u| u.email == email || u.username == username)
            .cloned();
        Ok(found)
    }

    async fn find_by_provider_email(
        &self,
        provider: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let Some(provider_id) = inner
            .providers
            .iter()
            .find(|(_, n)| n == provider)
            .map(|(id, _)| *id)
        else {
            return Ok(None);
        };
        let found = inner
            .live()
            .find(|u| u.email == email && u.provider_id == provider_id)
            .cloned();
        Ok(found)
    }

    async fn role_id(&self, name: &str) -> StoreResult<Option<i32>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.roles.iter().find(|(_, n)| n == name).map(|(id, _)| *id))
    }

    async fn provider_id(&self, name: &str) -> StoreResult<Option<i32>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .providers
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| *id))
    }

    async fn insert_user(&self, new: &NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_unique(None, &new.email, &new.username)?;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.next_id,
            uuid: Uuid::new_v4(),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            role_id: new.role_id,
            provider_id: new.provider_id,
            two_factor_enabled: false,
            email_verified: new.email_verified,
            email_verification_token: new.email_verification_token.clone(),
            password_reset_token: None,
            password_reset_expires: None,
            last_login: None,
            is_online: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.next_id += 1;
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_fields(
        &self,
        id: i64,
        update: &UserUpdate,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(current) = inner.live().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let email = update.email.clone().unwrap_or(current.email);
        let username = update.username.clone().unwrap_or(current.username);
        inner.check_unique(Some(id), &email, &username)?;

        let Some(u) = inner.live_mut(id) else {
            return Ok(None);
        };
        u.email = email;
        u.username = username;
        if let Some(flag) = update.two_factor_enabled {
            u.two_factor_enabled = flag;
        }
        u.updated_at = now;
        Ok(Some(u.clone()))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<User> = inner.live().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.live_mut(id) {
            Some(u) => {
                u.last_login = Some(at);
                u.updated_at = at;
                true
            }
            None => false,
        })
    }

    async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expires: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let mut touched = false;
        for u in inner
            .users
            .iter_mut()
            .filter(|u| u.email == email && u.deleted_at.is_none())
        {
            u.password_reset_token = Some(token.to_string());
            u.password_reset_expires = Some(expires);
            touched = true;
        }
        Ok(touched)
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let found = inner
            .live()
            .find(|u| {
                u.password_reset_token.as_deref() == Some(token)
                    && u.password_reset_expires.is_some_and(|exp| exp > now)
            })
            .cloned();
        Ok(found)
    }

    async fn complete_password_reset(
        &self,
        id: i64,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(u) = inner.live_mut(id) else {
            return Ok(false);
        };
        let live = u.password_reset_token.as_deref() == Some(token)
            && u.password_reset_expires.is_some_and(|exp| exp > now);
        if !live {
            return Ok(false);
        }
        u.password_hash = Some(password_hash.to_string());
        u.password_reset_token = None;
        u.password_reset_expires = None;
        u.updated_at = now;
        Ok(true)
    }

    async fn set_verification_token(&self, id: i64, token: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.live_mut(id) {
            Some(u) if !u.email_verified => {
                u.email_verification_token = Some(token.to_string());
                true
            }
            _ => false,
        })
    }

    async fn reset_email_verification(&self, id: i64, token: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.live_mut(id) {
            Some(u) => {
                u.email_verified = false;
                u.email_verification_token = Some(token.to_string());
                true
            }
            None => false,
        })
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let found = inner
            .live()
            .find(|u| u.email_verification_token.as_deref() == Some(token))
            .cloned();
        Ok(found)
    }

    async fn mark_email_verified(&self, id: i64, token: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.live_mut(id) {
            Some(u) if u.email_verification_token.as_deref() == Some(token) => {
                u.email_verified = true;
                u.email_verification_token = None;
                u.updated_at = OffsetDateTime::now_utc();
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: Some("hash".into()),
            role_id: 2,
            provider_id: 1,
            email_verified: false,
            email_verification_token: Some("tok".into()),
        }
    }

    #[tokio::test]
    async fn insert_enforces_live_uniqueness() {
        let store = InMemoryUserStore::new();
        let a = store.insert_user(&new_user("a", "a@x.io")).await.unwrap();
        let err = store.insert_user(&new_user("b", "a@x.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c.contains("email")));

        // soft-deleted rows free their email and username
        store.soft_delete(a.id);
        store.insert_user(&new_user("a", "a@x.io")).await.unwrap();
        assert_eq!(store.row_count(), 2);
    }

    #[tokio::test]
    async fn writes_skip_deleted_rows() {
        let store = InMemoryUserStore::new();
        let a = store.insert_user(&new_user("a", "a@x.io")).await.unwrap();
        store.soft_delete(a.id);
        let now = OffsetDateTime::now_utc();
        assert!(!store.touch_last_login(a.id, now).await.unwrap());
        assert!(store.find_by_id(a.id).await.unwrap().is_none());
        assert!(!store.set_reset_token("a@x.io", "t", now).await.unwrap());
    }
}
