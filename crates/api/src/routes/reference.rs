//! Reference data routes. Reads are public; writes need an admin.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{Value, json};

use mercato_core::ReferenceItemId;

use super::extract::{ApiJson, ApiPath};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::reference::{ReferenceForm, Saved};
use crate::state::AppState;

/// GET /api/reference
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>> {
    let categories = state.reference().list().await?;
    Ok(Json(json!({
        "success": true,
        "data": categories,
    })))
}

/// POST /api/reference
///
/// 201 when the category is created, 200 when items are appended to an
/// existing one.
pub async fn create_or_append(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiJson(form): ApiJson<ReferenceForm>,
) -> Result<(StatusCode, Json<Value>)> {
    let (status, message, category) = match state.reference().create_or_append(form).await? {
        Saved::Created(category) => (StatusCode::CREATED, "Category created.", category),
        Saved::Appended(category) => (StatusCode::OK, "Items added to category.", category),
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "data": category,
        })),
    ))
}

/// DELETE /api/reference/item/{id}
pub async fn delete_item(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<ReferenceItemId>,
) -> Result<Json<Value>> {
    let item = state.reference().soft_delete(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Item deleted.",
        "item": item,
    })))
}
