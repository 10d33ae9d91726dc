use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{Pagination, PublicUser, UserList},
    repo_types::UserUpdate,
    services,
};
use crate::{auth::extractors::AuthUser, error::AuthError, state::AppState};

/// Profile routes; every one requires a bearer token.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    services::get_user(&state, auth.user_id).await.map(Json)
}

#[instrument(skip(state, update))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<PublicUser>, AuthError> {
    services::update_user(&state, auth.user_id, update)
        .await
        .map(Json)
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, AuthError> {
    if !auth.is_admin() && auth.user_id != id {
        warn!(caller = auth.user_id, target = id, "profile read denied");
        return Err(AuthError::PermissionDenied("Insufficient permissions".into()));
    }
    services::get_user(&state, id).await.map(Json)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<UserList>, AuthError> {
    if !auth.is_admin() {
        return Err(AuthError::PermissionDenied("Insufficient permissions".into()));
    }
    services::list_users(&state, &page).await.map(Json)
}
