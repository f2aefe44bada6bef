//! Router-level tests.
//!
//! Requests go through the full axum router with an in-memory session store,
//! so extractors, status codes, and JSON bodies are exercised as a client
//! sees them.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use mercato_integration_tests::TestContext;

const CLIENT_IP: &str = "203.0.113.7";

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_owned);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    Reply {
        status,
        cookie,
        body,
    }
}

/// Register through the API and sign in. Returns the user id and the
/// session cookie.
async fn sign_in(app: &Router, name: &str, role: &str) -> (String, String) {
    let email = format!("{}@example.test", name.to_lowercase());
    let reply = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "correct horse battery",
            "role": role,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let user_id = reply.body["user"]["id"].as_str().unwrap().to_owned();

    let reply = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "correct horse battery", "role": role })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    (user_id, reply.cookie.unwrap())
}

// =============================================================================
// Health and auth
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();
    let app = ctx.app();

    let reply = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);

    // No pool behind the in-memory state, so readiness reports ready.
    let reply = send(&app, Method::GET, "/health/ready", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_reflects_signed_in_user() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (user_id, cookie) = sign_in(&app, "Asha", "customer").await;

    let reply = send(&app, Method::GET, "/api/auth/role", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["userId"], user_id.as_str());
    assert_eq!(reply.body["role"], "customer");

    let reply = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = send(&app, Method::GET, "/api/auth/role", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unsigned_session_cookie_is_not_accepted() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (_, cookie) = sign_in(&app, "Asha", "customer").await;

    let reply = send(&app, Method::GET, "/api/auth/role", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    // name=<44 chars of base64 HMAC><session id>; drop the signature.
    let (name, value) = cookie.split_once('=').unwrap();
    assert!(value.len() > 44);
    let forged = format!("{name}={}", &value[44..]);
    let reply = send(&app, Method::GET, "/api/auth/role", Some(&forged), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_wrong_role_is_forbidden() {
    let ctx = TestContext::new();
    let app = ctx.app();
    sign_in(&app, "Asha", "customer").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({
            "email": "asha@example.test",
            "password": "correct horse battery",
            "role": "admin",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["message"], "Role does not match this account");
    assert!(reply.cookie.is_none());
}

#[tokio::test]
async fn test_user_listing_is_admin_only() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (_, customer) = sign_in(&app, "Asha", "customer").await;
    let (admin_id, admin) = sign_in(&app, "Ravi", "admin").await;

    let reply = send(&app, Method::GET, "/api/auth/users", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let reply = send(&app, Method::GET, "/api/auth/users", Some(&customer), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(&app, Method::GET, "/api/auth/users", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let users = reply.body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    let ravi = users.iter().find(|u| u["id"] == admin_id.as_str()).unwrap();
    assert_eq!(ravi["email"], "ravi@example.test");
    assert_eq!(ravi["role"], "admin");
    assert!(ravi.get("addresses").is_none());
}

#[tokio::test]
async fn test_bad_login_is_unauthorized_then_rate_limited() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let body = json!({
        "email": "nobody@example.test",
        "password": "whatever123",
        "role": "customer",
    });

    for _ in 0..5 {
        let reply = send(&app, Method::POST, "/api/auth/login", None, Some(body.clone())).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["message"], "Invalid credentials");
    }

    let reply = send(&app, Method::POST, "/api/auth/login", None, Some(body)).await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn test_register_missing_fields_returns_each_field() {
    let ctx = TestContext::new();
    let app = ctx.app();

    let reply = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ravi" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Missing required fields");
    assert_eq!(reply.body["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Cart and orders
// =============================================================================

#[tokio::test]
async fn test_cart_requires_sign_in() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let user = ctx.customer("Meera");

    let uri = format!("/api/cart?userId={}", user.id);
    let reply = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn test_customer_shops_and_checks_out() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let shirt = ctx.product("Shirt", 100);
    let socks = ctx.product("Socks", 50);
    let (user_id, cookie) = sign_in(&app, "Kiran", "customer").await;

    for (product, quantity) in [(&shirt, 2), (&socks, 1)] {
        let reply = send(
            &app,
            Method::POST,
            "/api/cart/add",
            Some(&cookie),
            Some(json!({ "userId": user_id, "productId": product.id, "quantity": quantity })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    }

    let uri = format!("/api/cart?userId={user_id}");
    let reply = send(&app, Method::GET, &uri, Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["items"].as_array().unwrap().len(), 2);
    assert_eq!(reply.body["subtotal"], 250.0);
    assert_eq!(reply.body["tax"], 45.0);
    assert_eq!(reply.body["total"], 295.0);

    let reply = send(
        &app,
        Method::POST,
        "/api/orders/checkout",
        Some(&cookie),
        Some(json!({
            "userId": user_id,
            "name": "Kiran",
            "number": "9876543210",
            "address": { "line1": "4 Park St", "city": "Kolkata", "state": "WB", "zip": "700016" },
            "paymentMethod": "COD",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["order"]["total"], 295.0);
    assert_eq!(reply.body["order"]["paymentMethod"], "COD");

    let uri = format!("/api/orders?userId={user_id}");
    let reply = send(&app, Method::GET, &uri, Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["orders"].as_array().unwrap().len(), 1);

    let uri = format!("/api/cart?userId={user_id}");
    let reply = send(&app, Method::GET, &uri, Some(&cookie), None).await;
    assert!(reply.body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_lists_missing_fields() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (user_id, cookie) = sign_in(&app, "Omar", "customer").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/orders/checkout",
        Some(&cookie),
        Some(json!({ "userId": user_id, "paymentMethod": "COD" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let errors: Vec<&str> = reply.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        errors,
        vec!["name is required", "number is required", "address is required"]
    );
}

#[tokio::test]
async fn test_customers_cannot_touch_other_carts() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let other = ctx.customer("Nila");
    let (_, cookie) = sign_in(&app, "Tara", "customer").await;

    let uri = format!("/api/cart?userId={}", other.id);
    let reply = send(&app, Method::GET, &uri, Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_cart_checkout_is_bad_request() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (user_id, cookie) = sign_in(&app, "Zoya", "customer").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/orders/checkout",
        Some(&cookie),
        Some(json!({
            "userId": user_id,
            "name": "Zoya",
            "number": "9876543210",
            "address": { "line1": "1 Beach Rd", "city": "Chennai", "state": "TN", "zip": "600001" },
            "paymentMethod": "Online",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Cart is empty");
    assert!(ctx.gateway.requests().is_empty());
}

// =============================================================================
// Reference data
// =============================================================================

#[tokio::test]
async fn test_reference_writes_need_admin() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let body = json!({ "category": "Project Types", "items": [{ "name": "Villa" }] });

    let (_, customer) = sign_in(&app, "Ira", "customer").await;
    let reply = send(&app, Method::POST, "/api/reference", Some(&customer), Some(body.clone())).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let (_, admin) = sign_in(&app, "Jai", "admin").await;
    let reply = send(&app, Method::POST, "/api/reference", Some(&admin), Some(body)).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let item_id = reply.body["data"]["items"][0]["id"].as_str().unwrap().to_owned();

    // Listing is public.
    let reply = send(&app, Method::GET, "/api/reference", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"][0]["key"], "project_types");

    let uri = format!("/api/reference/item/{item_id}");
    let reply = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = send(&app, Method::GET, "/api/reference", None, None).await;
    assert!(reply.body["data"][0]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reference_delete_rejects_bad_ids() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let (_, admin) = sign_in(&app, "Leela", "admin").await;

    let reply = send(&app, Method::DELETE, "/api/reference/item/not-a-uuid", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/reference/item/{}", uuid::Uuid::new_v4());
    let reply = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
