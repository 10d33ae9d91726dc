use time::OffsetDateTime;
use tracing::info;

use super::{
    dto::{Pagination, PublicUser, UserList},
    repo_types::UserUpdate,
};
use crate::{
    auth::{
        services::{normalize_email, publish_email, validate_email, validate_username},
        tokens::generate_opaque_token,
    },
    email::EmailEvent,
    error::AuthError,
    state::AppState,
};

pub async fn get_user(st: &AppState, user_id: i64) -> Result<PublicUser, AuthError> {
    st.store
        .find_by_id(user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AuthError::NotFound("User not found".into()))
}

pub async fn update_user(
    st: &AppState,
    user_id: i64,
    mut update: UserUpdate,
) -> Result<PublicUser, AuthError> {
    if update.is_empty() {
        return Err(AuthError::InvalidArgument("No valid fields to update".into()));
    }
    if let Some(email) = update.email.as_mut() {
        *email = normalize_email(email);
        validate_email(email)?;
    }
    if let Some(username) = update.username.as_mut() {
        *username = username.trim().to_string();
        validate_username(username)?;
    }

    let Some(current) = st.store.find_by_id(user_id).await? else {
        return Err(AuthError::NotFound("User not found".into()));
    };
    let mut user = st
        .store
        .update_fields(user_id, &update, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

    // A new address has to be proven again before it counts as verified.
    if user.email != current.email {
        let token = generate_opaque_token();
        if st.store.reset_email_verification(user_id, &token).await? {
            user.email_verified = false;
            publish_email(
                st,
                EmailEvent::verification(&user.email, &token, &user.username),
            )
            .await;
            user.email_verification_token = Some(token);
            info!(user_id, "email changed, verification reset");
        }
    }

    info!(user_id, "profile updated");
    Ok(user.into())
}

pub async fn list_users(st: &AppState, page: &Pagination) -> Result<UserList, AuthError> {
    let (limit, offset) = page.limit_offset();
    let (rows, total) = st.store.list_users(limit, offset).await?;
    Ok(UserList {
        users: rows.into_iter().map(PublicUser::from).collect(),
        total,
    })
}
