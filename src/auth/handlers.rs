use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
            MessageResponse, RegisterRequest, ResetPasswordRequest,
        },
        errors::AccountError,
        jwt::{AuthUser, SessionKeys},
        repo_types::PublicUser,
        reset_token,
    },
    state::AppState,
};

const RESET_REQUESTED: &str = "If your email is registered, you will receive a reset link";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", get(list_users))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AccountError> {
    let user = state
        .accounts
        .register(
            &payload.full_name,
            &payload.email,
            &payload.mobile,
            &payload.password,
            &payload.confirm_password,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AccountError> {
    let user = state
        .accounts
        .authenticate(&payload.email, &payload.password)
        .await?;

    let keys = SessionKeys::from_ref(&state);
    let session = keys.issue(user.id, &user.email).map_err(|e| {
        error!(error = %e, "session token signing failed");
        AccountError::Internal(e)
    })?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AccountError> {
    let issued = state.accounts.request_password_reset(&payload.email).await?;

    // Same answer whether or not the email exists; the link is only
    // echoed back in demo mode since nothing delivers mail.
    let reset = &state.config.reset;
    let reset_link = issued
        .filter(|_| reset.expose_links)
        .map(|issued| reset_token::reset_link(&reset.public_base_url, &issued.token));

    Ok(Json(ForgotPasswordResponse {
        message: RESET_REQUESTED,
        reset_link,
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    state
        .accounts
        .redeem_password_reset(&token, &payload.password, &payload.confirm_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AccountError> {
    Ok(Json(state.accounts.profile(user_id).await?))
}

/// Admin view of every registered user.
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AccountError> {
    Ok(Json(state.accounts.list_users().await?))
}
