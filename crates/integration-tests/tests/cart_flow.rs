//! Integration tests for the cart.
//!
//! These run the cart service against in-memory stores and check pricing,
//! merging, and that reads never write.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use mercato_api::services::ServiceError;
use mercato_core::{ProductId, Role};
use mercato_integration_tests::TestContext;

// =============================================================================
// Add and view
// =============================================================================

#[tokio::test]
async fn test_cart_totals_include_tax() {
    let ctx = TestContext::new();
    let user = ctx.customer("Asha");
    let shirt = ctx.product("Shirt", 100);
    let socks = ctx.product("Socks", 50);

    let cart = ctx.state.cart();
    cart.add(user.id, shirt.id, 2).await.unwrap();
    cart.add(user.id, socks.id, 1).await.unwrap();

    let view = cart.view(user.id).await.unwrap();
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.totals.subtotal, Decimal::from(250));
    assert_eq!(view.totals.tax, Decimal::from(45));
    assert_eq!(view.totals.total, Decimal::from(295));
    assert!(view.items.iter().all(|line| !line.price_changed));
    assert_eq!(
        view.items[0].image_url,
        "https://shop.example.test/uploads/products/shirt.jpg"
    );
}

#[tokio::test]
async fn test_adding_same_product_merges_rows() {
    let ctx = TestContext::new();
    let user = ctx.customer("Ravi");
    let mug = ctx.product("Mug", 120);

    let cart = ctx.state.cart();
    cart.add(user.id, mug.id, 2).await.unwrap();
    let merged = cart.add(user.id, mug.id, 3).await.unwrap();

    assert_eq!(merged.quantity, 5);
    let rows = ctx.backend.cart_rows(user.id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 5);
}

#[tokio::test]
async fn test_merge_keeps_original_snapshot_price() {
    let ctx = TestContext::new();
    let user = ctx.customer("Meera");
    let lamp = ctx.product("Lamp", 400);

    let cart = ctx.state.cart();
    cart.add(user.id, lamp.id, 1).await.unwrap();
    ctx.backend.set_price(lamp.id, Decimal::from(450));
    cart.add(user.id, lamp.id, 1).await.unwrap();

    let rows = ctx.backend.cart_rows(user.id);
    assert_eq!(rows[0].price, Decimal::from(400));
    assert_eq!(rows[0].quantity, 2);
}

#[tokio::test]
async fn test_add_rejects_bad_quantities() {
    let ctx = TestContext::new();
    let user = ctx.customer("Kiran");
    let pen = ctx.product("Pen", 10);

    for quantity in [0, -3, 10_001] {
        let err = ctx.state.cart().add(user.id, pen.id, quantity).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::InvalidFields(_)),
            "quantity {quantity}: {err}"
        );
    }
    assert!(ctx.backend.cart_rows(user.id).is_empty());
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let ctx = TestContext::new();
    let user = ctx.customer("Dev");

    let err = ctx
        .state
        .cart()
        .add(user.id, ProductId::new(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("product")));
}

#[tokio::test]
async fn test_only_customers_have_carts() {
    let ctx = TestContext::new();
    let admin = ctx.backend.insert_user("Admin", Role::Admin);
    let pen = ctx.product("Pen", 10);

    let err = ctx.state.cart().add(admin.id, pen.id, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::RoleMismatch));
    let err = ctx.state.cart().view(admin.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::RoleMismatch));
}

// =============================================================================
// Live prices
// =============================================================================

#[tokio::test]
async fn test_view_reports_drift_without_writing() {
    let ctx = TestContext::new();
    let user = ctx.customer("Nila");
    let kettle = ctx.product("Kettle", 1000);

    ctx.state.cart().add(user.id, kettle.id, 1).await.unwrap();
    ctx.backend.set_price(kettle.id, Decimal::from(900));
    let writes_before = ctx.backend.cart_writes();

    let view = ctx.state.cart().view(user.id).await.unwrap();
    assert!(view.items[0].price_changed);
    assert_eq!(view.items[0].line.price, Decimal::from(900));
    assert_eq!(view.items[0].snapshot_price, Decimal::from(1000));
    assert_eq!(view.totals.subtotal, Decimal::from(900));

    assert_eq!(ctx.backend.cart_writes(), writes_before);
    assert_eq!(ctx.backend.cart_rows(user.id)[0].price, Decimal::from(1000));
}

#[tokio::test]
async fn test_view_falls_back_to_snapshot_for_deleted_products() {
    let ctx = TestContext::new();
    let user = ctx.customer("Omar");
    let vase = ctx.product("Vase", 300);

    ctx.state.cart().add(user.id, vase.id, 2).await.unwrap();
    ctx.backend.delete_product(vase.id, chrono::Utc::now());

    let view = ctx.state.cart().view(user.id).await.unwrap();
    assert_eq!(view.items[0].line.price, Decimal::from(300));
    assert!(!view.items[0].price_changed);
    assert_eq!(view.items[0].image_url, "");
    assert_eq!(view.totals.subtotal, Decimal::from(600));
}

#[tokio::test]
async fn test_reconcile_persists_live_prices() {
    let ctx = TestContext::new();
    let user = ctx.customer("Tara");
    let bag = ctx.product("Bag", 700);
    let cap = ctx.product("Cap", 150);

    let cart = ctx.state.cart();
    cart.add(user.id, bag.id, 1).await.unwrap();
    cart.add(user.id, cap.id, 1).await.unwrap();
    ctx.backend.set_price(bag.id, Decimal::from(650));

    let changes = cart.reconcile(user.id).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].product_id, bag.id);
    assert_eq!(changes[0].previous_price, Decimal::from(700));
    assert_eq!(changes[0].current_price, Decimal::from(650));

    let view = cart.view(user.id).await.unwrap();
    assert!(view.items.iter().all(|line| !line.price_changed));

    // Nothing left to change the second time.
    assert!(cart.reconcile(user.id).await.unwrap().is_empty());
}

// =============================================================================
// Remove and clear
// =============================================================================

#[tokio::test]
async fn test_remove_is_idempotent() {
    let ctx = TestContext::new();
    let user = ctx.customer("Zoya");
    let book = ctx.product("Book", 250);

    let cart = ctx.state.cart();
    cart.add(user.id, book.id, 1).await.unwrap();
    assert_eq!(cart.remove(user.id, book.id).await.unwrap(), 1);
    assert_eq!(cart.remove(user.id, book.id).await.unwrap(), 0);
    assert!(ctx.backend.cart_rows(user.id).is_empty());
}

#[tokio::test]
async fn test_clear_only_touches_one_user() {
    let ctx = TestContext::new();
    let first = ctx.customer("Ira");
    let second = ctx.customer("Jai");
    let tea = ctx.product("Tea", 90);

    let cart = ctx.state.cart();
    cart.add(first.id, tea.id, 1).await.unwrap();
    cart.add(second.id, tea.id, 4).await.unwrap();

    assert_eq!(cart.clear(first.id).await.unwrap(), 1);
    assert!(ctx.backend.cart_rows(first.id).is_empty());
    assert_eq!(ctx.backend.cart_rows(second.id)[0].quantity, 4);
}
