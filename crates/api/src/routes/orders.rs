//! Checkout, payment verification, and order history routes.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use mercato_core::Order;

use super::UserQuery;
use super::extract::{ApiJson, ApiQuery};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::checkout::{
    CheckoutForm, CheckoutOutcome, PendingPayment, VerifyPaymentForm,
};
use crate::state::AppState;

/// Response for an online checkout awaiting payment.
#[derive(Debug, Serialize)]
pub struct PendingPaymentResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub payment: PendingPayment,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// POST /api/orders/checkout
///
/// Cash on delivery answers 201 with the order. Online payment answers 200
/// with the processor order the client pays against.
pub async fn checkout(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(form): ApiJson<CheckoutForm>,
) -> Result<Response> {
    let request = form.validate()?;
    auth.authorize_for(request.user_id)?;

    let response = match state.checkout().checkout(request).await? {
        CheckoutOutcome::Placed(order) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Order placed successfully.",
                "order": order,
            })),
        )
            .into_response(),
        CheckoutOutcome::AwaitingPayment(payment) => Json(PendingPaymentResponse {
            success: true,
            message: "Razorpay order created.",
            payment,
        })
        .into_response(),
    };
    Ok(response)
}

/// POST /api/orders/verify-payment
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiJson(form): ApiJson<VerifyPaymentForm>,
) -> Result<(StatusCode, Json<Value>)> {
    let request = form.validate()?;
    auth.authorize_for(request.user_id)?;

    let order = state.checkout().verify_payment(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Payment verified and order placed.",
            "order": order,
        })),
    ))
}

/// GET /api/orders?userId=
pub async fn list(
    State(state): State<AppState>,
    auth: RequireAuth,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<OrdersResponse>> {
    let user_id = query.required()?;
    auth.authorize_for(user_id)?;

    let orders = state.checkout().list_orders(user_id).await?;
    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}
