//! Cart routes.
//!
//! Every handler requires a signed-in user who is either the cart's owner
//! or an admin.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use mercato_core::{ProductId, UserId};

use super::extract::{ApiJson, ApiQuery, missing_fields};
use super::UserQuery;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::cart::{CartView, PriceChange};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartForm {
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
}

/// Remove-from-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartForm {
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    #[serde(flatten)]
    pub cart: CartView,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub changes: Vec<PriceChange>,
}

/// POST /api/cart/add
pub async fn add(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(form): ApiJson<AddToCartForm>,
) -> Result<Json<Value>> {
    let (Some(user_id), Some(product_id), Some(quantity)) =
        (form.user_id, form.product_id, form.quantity)
    else {
        return Err(missing_fields([
            ("userId", form.user_id.is_some()),
            ("productId", form.product_id.is_some()),
            ("quantity", form.quantity.is_some()),
        ]));
    };
    auth.authorize_for(user_id)?;

    let item = state.cart().add(user_id, product_id, quantity).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product added to cart.",
        "item": item,
    })))
}

/// GET /api/cart?userId=
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<CartResponse>> {
    let user_id = query.required()?;
    auth.authorize_for(user_id)?;

    let cart = state.cart().view(user_id).await?;
    Ok(Json(CartResponse {
        success: true,
        cart,
    }))
}

/// POST /api/cart/reconcile
pub async fn reconcile(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(body): ApiJson<UserQuery>,
) -> Result<Json<ReconcileResponse>> {
    let user_id = body.required()?;
    auth.authorize_for(user_id)?;

    let changes = state.cart().reconcile(user_id).await?;
    Ok(Json(ReconcileResponse {
        success: true,
        changes,
    }))
}

/// POST /api/cart/remove
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(form): ApiJson<RemoveFromCartForm>,
) -> Result<Json<Value>> {
    let (Some(user_id), Some(product_id)) = (form.user_id, form.product_id) else {
        return Err(missing_fields([
            ("userId", form.user_id.is_some()),
            ("productId", form.product_id.is_some()),
        ]));
    };
    auth.authorize_for(user_id)?;

    let removed = state.cart().remove(user_id, product_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product removed from cart.",
        "removed": removed,
    })))
}

/// POST /api/cart/clear
pub async fn clear(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(body): ApiJson<UserQuery>,
) -> Result<Json<Value>> {
    let user_id = body.required()?;
    auth.authorize_for(user_id)?;

    let removed = state.cart().clear(user_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cart cleared.",
        "removed": removed,
    })))
}
