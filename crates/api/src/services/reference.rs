//! Reference data maintenance.

use serde::Deserialize;
use tracing::{info, instrument};

use mercato_core::{
    NewReferenceItem, ReferenceCategory, ReferenceCategoryKind, ReferenceItem, ReferenceItemId,
    ReferenceMetadata, Taxonomy, TaxonomyKey,
};

use super::{ServiceError, required};
use crate::db::{ReferenceStore, RepositoryError};

/// Position given to items submitted without one.
pub const DEFAULT_SORT_ORDER: i32 = 1;

/// One item as submitted by a client. The key defaults to the slug of the
/// name. Items are active unless `isActive` is `false`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceItemForm {
    pub key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "order")]
    pub sort_order: Option<i32>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Create-or-append request body: either an `items` list or the fields of a
/// single item inline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceForm {
    pub category: Option<String>,
    pub items: Option<Vec<ReferenceItemForm>>,
    #[serde(flatten)]
    pub item: ReferenceItemForm,
}

/// What [`ReferenceService::create_or_append`] did.
#[derive(Debug, Clone)]
pub enum Saved {
    Created(ReferenceCategory),
    Appended(ReferenceCategory),
}

/// Reference data service.
pub struct ReferenceService<'a> {
    store: &'a dyn ReferenceStore,
}

impl<'a> ReferenceService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ReferenceStore) -> Self {
        Self { store }
    }

    /// Every category with deleted items filtered out.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the database operation fails.
    pub async fn list(&self) -> Result<Vec<ReferenceCategory>, ServiceError> {
        let categories = self.store.list().await?;
        Ok(categories
            .into_iter()
            .map(ReferenceCategory::without_deleted)
            .collect())
    }

    /// Create a category, or append new items to an existing one.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MissingFields` without a category or item name,
    /// `ServiceError::InvalidFields` for an unknown category or an item key
    /// that does not resolve, and `ServiceError::Conflict` when every
    /// submitted key already exists in the category.
    #[instrument(skip(self, form), fields(category = form.category.as_deref().unwrap_or_default()))]
    pub async fn create_or_append(&self, form: ReferenceForm) -> Result<Saved, ServiceError> {
        let mut missing = Vec::new();
        let Some(label) = required("category", form.category.as_deref(), &mut missing) else {
            return Err(ServiceError::MissingFields(missing));
        };
        let kind = ReferenceCategoryKind::from_label(label)
            .map_err(|e| ServiceError::InvalidFields(vec![e.to_string()]))?;

        let items = parse_items(kind, &form)?;

        if let Some(category) = self.store.find(kind).await? {
            let fresh = category.fresh_items(items);
            if fresh.is_empty() {
                return Err(ServiceError::Conflict(
                    "every item key already exists in this category".to_owned(),
                ));
            }
            let added = fresh.len();
            let category = self.store.append(category.id, fresh).await?;
            info!(%kind, added, "Reference items appended");
            return Ok(Saved::Appended(category.without_deleted()));
        }

        let category = self
            .store
            .create(kind, label, dedupe(items))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    ServiceError::Conflict(format!("category {kind} already exists"))
                }
                other => ServiceError::Repository(other),
            })?;
        info!(%kind, items = category.items.len(), "Reference category created");
        Ok(Saved::Created(category))
    }

    /// Soft-delete one item.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the item does not exist and
    /// `ServiceError::Conflict` if it is already deleted.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: ReferenceItemId) -> Result<ReferenceItem, ServiceError> {
        self.store.soft_delete_item(id).await.map_err(|e| match e {
            RepositoryError::NotFound => ServiceError::NotFound("reference item"),
            RepositoryError::Conflict(_) => {
                ServiceError::Conflict("reference item is already deleted".to_owned())
            }
            other => ServiceError::Repository(other),
        })
    }
}

/// Validate submitted items into storable ones.
fn parse_items(
    kind: ReferenceCategoryKind,
    form: &ReferenceForm,
) -> Result<Vec<NewReferenceItem>, ServiceError> {
    let forms: Vec<(String, &ReferenceItemForm)> = match form.items.as_deref() {
        Some(items) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("items[{i}]."), item))
            .collect(),
        _ if form.item.name.is_some() || form.item.key.is_some() => {
            vec![(String::new(), &form.item)]
        }
        _ => Vec::new(),
    };

    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    let mut items = Vec::with_capacity(forms.len());
    for (prefix, item) in forms {
        let Some(name) = required(&format!("{prefix}name"), item.name.as_deref(), &mut missing)
        else {
            continue;
        };
        let raw_key = item.key.as_deref().unwrap_or(name);
        let key = match TaxonomyKey::parse(raw_key)
            .and_then(|key| Taxonomy::resolve(kind, key.as_str()).map(|_| key))
        {
            Ok(key) => key,
            Err(e) => {
                invalid.push(format!("{prefix}key: {e}"));
                continue;
            }
        };

        items.push(NewReferenceItem {
            key,
            name: name.to_owned(),
            description: item.description.as_deref().unwrap_or_default().trim().to_owned(),
            sort_order: item.sort_order.unwrap_or(DEFAULT_SORT_ORDER),
            is_active: item.is_active.unwrap_or(true),
            metadata: ReferenceMetadata {
                color: item.color.clone().unwrap_or_default(),
                icon: item.icon.clone().unwrap_or_default(),
            },
        });
    }

    if !missing.is_empty() {
        return Err(ServiceError::MissingFields(missing));
    }
    if !invalid.is_empty() {
        return Err(ServiceError::InvalidFields(invalid));
    }
    Ok(items)
}

/// Drop repeated keys, keeping the first.
fn dedupe(items: Vec<NewReferenceItem>) -> Vec<NewReferenceItem> {
    let mut unique: Vec<NewReferenceItem> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|u| u.key == item.key) {
            unique.push(item);
        }
    }
    unique
}
