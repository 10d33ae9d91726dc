use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{error::AuthError, state::AppState, users::repo_types::Role};

/// Authenticated caller: verified bearer token plus a live user row.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn invalid_token() -> AuthError {
    AuthError::Unauthenticated("Invalid token".into())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AuthError::Unauthenticated("No authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(invalid_token)?;

        // expired, forged and malformed all look the same to the caller
        let claims = state.keys.verify(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            invalid_token()
        })?;
        let user_id = claims.user_id().ok_or_else(invalid_token)?;

        let user = match state.store.find_by_id(user_id).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!(user_id, "token subject no longer exists");
                return Err(invalid_token());
            }
            Err(e) => {
                warn!(error = %e, user_id, "user lookup failed during authentication");
                return Err(invalid_token());
            }
        };

        Ok(AuthUser {
            user_id: user.id,
            role: user.role(),
        })
    }
}
