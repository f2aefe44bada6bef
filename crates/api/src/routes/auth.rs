//! Account routes: register, login, logout, role, user listing.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument};

use mercato_core::{Role, UserId};

use super::extract::ApiJson;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAdmin, RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{LoginForm, RegisterForm};
use crate::state::AppState;

/// Response body for the role endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub success: bool,
    pub user_id: UserId,
    pub role: Role,
}

/// POST /api/auth/register
#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<RegisterForm>,
) -> Result<(StatusCode, Json<Value>)> {
    let user = state.auth().register(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully.",
            "user": user,
        })),
    ))
}

/// POST /api/auth/login
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginForm>,
) -> Result<Json<Value>> {
    let user: User = state.auth().login(form).await?;

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    info!(user_id = %user.id, "User logged in");
    Ok(Json(json!({
        "success": true,
        "message": "Login successful.",
        "user": user,
    })))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();

    Ok(Json(json!({
        "success": true,
        "message": "Logged out.",
    })))
}

/// GET /api/auth/role
///
/// Reads the role from the account, so role changes show up without a new
/// login.
pub async fn role(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<RoleResponse>> {
    let user = state.auth().get_user(current.id).await?;
    Ok(Json(RoleResponse {
        success: true,
        user_id: user.id,
        role: user.role,
    }))
}

/// GET /api/auth/users
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>> {
    let users = state.auth().list_users().await?;
    Ok(Json(json!({
        "success": true,
        "users": users,
    })))
}
