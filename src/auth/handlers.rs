use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, LogoutRequest, OAuthLoginRequest, PasswordResetRequest,
            RegisterRequest, ResendVerificationRequest, ResetPasswordRequest, SuccessResponse,
            VerifyEmailRequest,
        },
        services,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/password-reset-request", post(request_password_reset))
        .route("/password-reset", post(reset_password))
        .route("/verify-email", post(verify_email))
        .route("/verify-email/resend", post(resend_verification))
        .route("/oauth/login", post(oauth_login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    services::register(&state, payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    services::login(&state, payload).await.map(Json)
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    services::logout(&state, payload.user_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    services::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    services::verify_email(&state, &payload.token).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    services::resend_verification(&state, &payload.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip(state, payload), fields(provider = %payload.provider))]
pub async fn oauth_login(
    State(state): State<AppState>,
    Json(payload): Json<OAuthLoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    services::oauth_login(&state, &payload.provider, &payload.code)
        .await
        .map(Json)
}
