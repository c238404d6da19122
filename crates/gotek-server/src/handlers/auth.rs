//! Registration, login and session handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::session::{self, AuthUser};
use crate::{AppError, AppState, SuccessResponse};
use gotek_core::models::{NewUser, User};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or phone number
    pub identifier: String,
    pub password: String,
}

/// Respond with the user and a fresh session cookie
fn with_session(state: &AppState, status: StatusCode, user: User) -> Result<Response, AppError> {
    let token = session::issue_token(&state.config, &user).map_err(|e| anyhow::anyhow!(e))?;
    let cookie = session::session_cookie(&state.config, &token);
    Ok((status, [(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

/// POST /api/auth/register - Create an account and start a session
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(new_user): Json<NewUser>,
) -> Result<Response, AppError> {
    let user = state.db.create_user(&new_user).map_err(AppError::from_core)?;

    state.db.log_audit(
        &format!("user:{}", user.id),
        "register",
        Some("user"),
        Some(user.id),
        None,
    )?;

    with_session(&state, StatusCode::CREATED, user)
}

/// POST /api/auth/login - Exchange credentials for a session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let Some(user) = state
        .db
        .verify_user_password(req.identifier.trim(), &req.password)
        .map_err(AppError::from_core)?
    else {
        warn!("Failed login attempt");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    info!(user_id = user.id, "User logged in");
    state.db.log_audit(
        &format!("user:{}", user.id),
        "login",
        Some("user"),
        Some(user.id),
        None,
    )?;

    with_session(&state, StatusCode::OK, user)
}

/// POST /api/auth/logout - Expire the session cookie
pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, session::expired_cookie(&state.config))],
        Json(SuccessResponse { success: true }),
    )
}

/// GET /api/auth/me - The signed-in user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = state
        .db
        .get_user(auth.id)?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    Ok(Json(user))
}
