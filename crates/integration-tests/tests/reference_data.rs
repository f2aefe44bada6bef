//! Integration tests for the reference registry and the retention sweep.

#![allow(clippy::unwrap_used)]

use chrono::{TimeDelta, Utc};

use mercato_api::db::RetentionTarget;
use mercato_api::services::ServiceError;
use mercato_api::services::reference::{ReferenceForm, ReferenceItemForm, Saved};
use mercato_api::sweeper;
use mercato_core::{ReferenceCategoryKind, ReferenceItemId, Role};
use mercato_integration_tests::TestContext;

fn items(category: &str, names: &[&str]) -> ReferenceForm {
    ReferenceForm {
        category: Some(category.to_owned()),
        items: Some(
            names
                .iter()
                .map(|name| ReferenceItemForm {
                    name: Some((*name).to_owned()),
                    ..ReferenceItemForm::default()
                })
                .collect(),
        ),
        ..ReferenceForm::default()
    }
}

// =============================================================================
// Create and append
// =============================================================================

#[tokio::test]
async fn test_create_then_append() {
    let ctx = TestContext::new();
    let reference = ctx.state.reference();

    let Saved::Created(category) = reference
        .create_or_append(items("Project Types", &["Villa", "Plot"]))
        .await
        .unwrap()
    else {
        panic!("expected a new category");
    };
    assert_eq!(category.key, ReferenceCategoryKind::ProjectTypes);
    assert_eq!(category.category, "Project Types");
    assert_eq!(category.items.len(), 2);

    let Saved::Appended(category) = reference
        .create_or_append(items("project_types", &["Villa", "Farm House"]))
        .await
        .unwrap()
    else {
        panic!("expected an append");
    };
    let keys: Vec<&str> = category.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&"farm_house"));
}

#[tokio::test]
async fn test_appending_only_existing_keys_conflicts() {
    let ctx = TestContext::new();
    let reference = ctx.state.reference();

    reference
        .create_or_append(items("Company Types", &["LLP"]))
        .await
        .unwrap();
    let err = reference
        .create_or_append(items("Company Types", &["llp"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_unknown_category_is_invalid() {
    let ctx = TestContext::new();
    let err = ctx
        .state
        .reference()
        .create_or_append(items("Colours", &["Red"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidFields(_)));
}

// =============================================================================
// Soft delete
// =============================================================================

#[tokio::test]
async fn test_soft_deleted_items_are_hidden_and_keep_their_key() {
    let ctx = TestContext::new();
    let reference = ctx.state.reference();

    let Saved::Created(category) = reference
        .create_or_append(items("Roles", &["Customer", "Admin"]))
        .await
        .unwrap()
    else {
        panic!("expected a new category");
    };
    let admin = category.items.iter().find(|i| i.key == "admin").unwrap();

    let deleted = reference.soft_delete(admin.id).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());

    let listed = reference.list().await.unwrap();
    assert_eq!(listed[0].items.len(), 1);
    assert!(!listed[0].grants_role(Role::Admin));

    // The key is still taken until the row is purged.
    let err = reference
        .create_or_append(items("Roles", &["Admin"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = reference.soft_delete(admin.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_deleting_unknown_item_is_not_found() {
    let ctx = TestContext::new();
    let err = ctx
        .state
        .reference()
        .soft_delete(ReferenceItemId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

// =============================================================================
// Retention
// =============================================================================

#[tokio::test]
async fn test_sweep_purges_only_expired_rows() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let long_ago = now - TimeDelta::days(61);
    let recently = now - TimeDelta::days(59);

    let gone = ctx.customer("Gone");
    let recent = ctx.customer("Recent");
    ctx.backend.delete_user(gone.id, long_ago);
    ctx.backend.delete_user(recent.id, recently);
    ctx.customer("Active");

    let old_product = ctx.product("Old", 10);
    ctx.backend.delete_product(old_product.id, long_ago);

    let reference = ctx.state.reference();
    let Saved::Created(category) = reference
        .create_or_append(items("Project Types", &["Villa", "Plot"]))
        .await
        .unwrap()
    else {
        panic!("expected a new category");
    };
    let villa = category.items[0].id;
    reference.soft_delete(villa).await.unwrap();
    ctx.backend.backdate_item_deletion(villa, long_ago);

    let report = sweeper::sweep(ctx.state.stores().retention.as_ref(), now, 60).await;
    assert!(report.failed.is_empty());
    assert_eq!(
        report.purged,
        vec![
            (RetentionTarget::Users, 1),
            (RetentionTarget::Products, 1),
            (RetentionTarget::ReferenceItems, 1),
        ]
    );

    // Purging frees the key for reuse.
    let saved = reference
        .create_or_append(items("Project Types", &["Villa"]))
        .await
        .unwrap();
    assert!(matches!(saved, Saved::Appended(_)));
}
