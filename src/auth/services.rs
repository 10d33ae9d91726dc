use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        oauth::OAuthProvider,
        password::{burn_verification, hash_password, verify_password},
        tokens::generate_opaque_token,
    },
    email::EmailEvent,
    error::AuthError,
    state::AppState,
    users::{
        repo::{StoreError, USERNAME_UNIQUE_KEY},
        repo_types::{NewUser, User},
    },
};

pub const DEFAULT_ROLE: &str = "user";
pub const LOCAL_PROVIDER: &str = "local";
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 255;
const OAUTH_USERNAME_ATTEMPTS: usize = 5;
const USERNAME_SUFFIX_LEN: usize = 6;

/// Same text for unknown email and wrong password, so callers cannot probe
/// which accounts exist.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
pub const INVALID_VERIFICATION_TOKEN: &str = "Invalid verification token";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<(), AuthError> {
    if is_valid_email(email) && email.len() <= 255 {
        Ok(())
    } else {
        Err(AuthError::InvalidArgument("Invalid email".into()))
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if len == 0 || len > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidArgument(format!(
            "Username must be between 1 and {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidArgument(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Username for a new OAuth account: the display name, else the local part
/// of the email, cut to `MAX_USERNAME_LEN` characters. Retries append a
/// random suffix.
fn oauth_username(display_name: &str, email: &str, attempt: usize) -> String {
    let base = match display_name.trim() {
        "" => email.split('@').next().unwrap_or_default(),
        name => name,
    };
    if attempt == 0 {
        return base.chars().take(MAX_USERNAME_LEN).collect();
    }
    let head: String = base
        .chars()
        .take(MAX_USERNAME_LEN - USERNAME_SUFFIX_LEN - 1)
        .collect();
    let suffix: String = generate_opaque_token()
        .chars()
        .take(USERNAME_SUFFIX_LEN)
        .collect();
    format!("{head}_{suffix}")
}

fn invalid_credentials() -> AuthError {
    AuthError::Unauthenticated(INVALID_CREDENTIALS.into())
}

fn sign_session(st: &AppState, user: User) -> Result<AuthResponse, AuthError> {
    let token = st
        .keys
        .sign(user.id)
        .map_err(|e| AuthError::internal("jwt sign failed", e))?;
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Fire-and-forget: a failed publish is logged, never surfaced.
pub(crate) async fn publish_email(st: &AppState, event: EmailEvent) {
    let template = event.template;
    match st.mailer.publish(event).await {
        Ok(message_id) => debug!(%message_id, ?template, "email queued"),
        Err(e) => warn!(error = %e, ?template, "failed to publish email event"),
    }
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email);
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&req.password)?;

    if st
        .store
        .find_by_email_or_username(&email, &username)
        .await?
        .is_some()
    {
        warn!(%email, %username, "username or email already registered");
        return Err(AuthError::AlreadyExists(
            "Username or email already exists".into(),
        ));
    }

    let role_id = st.store.role_id(DEFAULT_ROLE).await?;
    let provider_id = st.store.provider_id(LOCAL_PROVIDER).await?;
    let (Some(role_id), Some(provider_id)) = (role_id, provider_id) else {
        error!(role = DEFAULT_ROLE, provider = LOCAL_PROVIDER, "default role or provider missing");
        return Err(AuthError::NotFound(
            "Default role or provider not found".into(),
        ));
    };

    let password_hash =
        hash_password(&req.password).map_err(|e| AuthError::internal("hash_password failed", e))?;
    let verification_token = generate_opaque_token();

    // A concurrent registration that slipped past the check above is
    // rejected here by the unique index and reported as AlreadyExists.
    let user = st
        .store
        .insert_user(&NewUser {
            username,
            email,
            password_hash: Some(password_hash),
            role_id,
            provider_id,
            email_verified: false,
            email_verification_token: Some(verification_token.clone()),
        })
        .await?;

    publish_email(
        st,
        EmailEvent::verification(&user.email, &verification_token, &user.username),
    )
    .await;

    info!(user_id = user.id, "user registered");
    sign_session(st, user)
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email);

    let Some(mut user) = st.store.find_by_email(&email).await? else {
        burn_verification(&req.password);
        warn!("login for unknown email");
        return Err(invalid_credentials());
    };

    let Some(hash) = user.password_hash.as_deref() else {
        burn_verification(&req.password);
        warn!(user_id = user.id, "password login on account without password");
        return Err(invalid_credentials());
    };

    let ok = verify_password(&req.password, hash)
        .map_err(|e| AuthError::internal("verify_password failed", e))?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    if st.config.require_email_verification && !user.email_verified {
        warn!(user_id = user.id, "login before email verification");
        return Err(AuthError::PermissionDenied("Email not verified".into()));
    }

    let now = OffsetDateTime::now_utc();
    if !st.store.touch_last_login(user.id, now).await? {
        // deleted between lookup and touch
        return Err(invalid_credentials());
    }
    user.last_login = Some(now);

    info!(user_id = user.id, "user logged in");
    sign_session(st, user)
}

/// Records activity only; session tokens stay valid until they expire.
pub async fn logout(st: &AppState, user_id: i64) -> Result<(), AuthError> {
    if !st
        .store
        .touch_last_login(user_id, OffsetDateTime::now_utc())
        .await?
    {
        return Err(AuthError::NotFound("User not found".into()));
    }
    info!(user_id, "user logged out");
    Ok(())
}

/// Always succeeds for well-formed input, whether or not the email is known.
pub async fn request_password_reset(st: &AppState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let token = generate_opaque_token();
    let expires =
        OffsetDateTime::now_utc() + TimeDuration::minutes(st.config.password_reset_ttl_minutes);

    if st.store.set_reset_token(&email, &token, expires).await? {
        publish_email(st, EmailEvent::password_reset(&email, &token)).await;
        info!("password reset requested");
    } else {
        debug!("password reset requested for unknown email");
    }
    Ok(())
}

pub async fn reset_password(
    st: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidArgument(INVALID_RESET_TOKEN.into()));
    }

    let now = OffsetDateTime::now_utc();
    let Some(user) = st.store.find_by_reset_token(token, now).await? else {
        warn!("password reset with unknown or expired token");
        return Err(AuthError::InvalidArgument(INVALID_RESET_TOKEN.into()));
    };
    validate_password(new_password)?;

    let password_hash =
        hash_password(new_password).map_err(|e| AuthError::internal("hash_password failed", e))?;

    // Conditional on the token, so a token raced by a second reset or a
    // newer request no longer applies.
    if !st
        .store
        .complete_password_reset(user.id, token, &password_hash, OffsetDateTime::now_utc())
        .await?
    {
        return Err(AuthError::InvalidArgument(INVALID_RESET_TOKEN.into()));
    }

    info!(user_id = user.id, "password reset completed");
    Ok(())
}

pub async fn verify_email(st: &AppState, token: &str) -> Result<(), AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidArgument(INVALID_VERIFICATION_TOKEN.into()));
    }

    let Some(user) = st.store.find_by_verification_token(token).await? else {
        warn!("email verification with unknown token");
        return Err(AuthError::InvalidArgument(INVALID_VERIFICATION_TOKEN.into()));
    };
    if !st.store.mark_email_verified(user.id, token).await? {
        return Err(AuthError::InvalidArgument(INVALID_VERIFICATION_TOKEN.into()));
    }

    info!(user_id = user.id, "email verified");
    Ok(())
}

/// Issues a fresh verification token for an unverified account. Reports
/// success for unknown and already verified emails alike.
pub async fn resend_verification(st: &AppState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let user = match st.store.find_by_email(&email).await? {
        Some(u) if !u.email_verified => u,
        _ => {
            debug!("verification resend skipped");
            return Ok(());
        }
    };

    let token = generate_opaque_token();
    if st.store.set_verification_token(user.id, &token).await? {
        publish_email(
            st,
            EmailEvent::verification(&user.email, &token, &user.username),
        )
        .await;
        info!(user_id = user.id, "verification email re-sent");
    }
    Ok(())
}

pub async fn oauth_login(
    st: &AppState,
    provider: &str,
    code: &str,
) -> Result<AuthResponse, AuthError> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|_| AuthError::InvalidArgument("Invalid OAuth provider".into()))?;
    if code.trim().is_empty() {
        return Err(AuthError::InvalidArgument("Missing authorization code".into()));
    }

    let identity = st
        .oauth
        .exchange(provider, code.trim())
        .await
        .map_err(|e| AuthError::internal("oauth code exchange failed", e))?;
    let email = normalize_email(&identity.email);
    if !is_valid_email(&email) {
        return Err(AuthError::internal(
            "oauth provider returned an unusable email",
            &identity.external_id,
        ));
    }

    let existing = st
        .store
        .find_by_provider_email(provider.as_str(), &email)
        .await?;
    let mut user = match existing {
        Some(u) => u,
        None => {
            let Some(provider_id) = st.store.provider_id(provider.as_str()).await? else {
                error!(%provider, "oauth provider row missing");
                return Err(AuthError::NotFound("OAuth provider not found".into()));
            };
            let Some(role_id) = st.store.role_id(DEFAULT_ROLE).await? else {
                error!(role = DEFAULT_ROLE, "default role missing");
                return Err(AuthError::NotFound("Default role not found".into()));
            };
            // A taken display name must not block a new identity; only an
            // email conflict is reported to the caller.
            let mut attempt = 0;
            let user = loop {
                let new_user = NewUser {
                    username: oauth_username(&identity.display_name, &email, attempt),
                    email: email.clone(),
                    password_hash: None,
                    role_id,
                    provider_id,
                    email_verified: true,
                    email_verification_token: None,
                };
                match st.store.insert_user(&new_user).await {
                    Ok(user) => break user,
                    Err(StoreError::Conflict(key))
                        if key == USERNAME_UNIQUE_KEY && attempt + 1 < OAUTH_USERNAME_ATTEMPTS =>
                    {
                        debug!(attempt, "oauth username taken, retrying with suffix");
                        attempt += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            info!(user_id = user.id, %provider, "account created from oauth identity");
            user
        }
    };

    let now = OffsetDateTime::now_utc();
    if st.store.touch_last_login(user.id, now).await? {
        user.last_login = Some(now);
    }

    info!(user_id = user.id, %provider, "oauth login");
    sign_session(st, user)
}
