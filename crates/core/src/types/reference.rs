//! Reference data: the taxonomy registry behind roles, project types, and
//! company types.
//!
//! Categories form a closed set. Items are stored with free-form keys, but
//! every key is resolved into a [`Taxonomy`] variant before the rest of the
//! system acts on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ReferenceCategoryId, ReferenceItemId};
use super::role::Role;

/// Errors produced while validating reference data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The category label does not slug to a known category.
    #[error("unknown reference category: {0}")]
    UnknownCategory(String),
    /// An item key is empty after slugging.
    #[error("reference key cannot be empty")]
    EmptyKey,
    /// A `roles` item names a role that does not exist.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Turn a label into a key: lowercase, every run of characters outside
/// `[a-z0-9]` collapsed to `_`, leading and trailing `_` removed.
///
/// ```
/// use mercato_core::slugify;
///
/// assert_eq!(slugify("Project Types!"), "project_types");
/// assert_eq!(slugify("  --Company   Types--"), "company_types");
/// ```
#[must_use]
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// The closed set of reference categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCategoryKind {
    Roles,
    ProjectTypes,
    CompanyTypes,
}

impl ReferenceCategoryKind {
    pub const ALL: [Self; 3] = [Self::Roles, Self::ProjectTypes, Self::CompanyTypes];

    /// Slug stored as the category key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::ProjectTypes => "project_types",
            Self::CompanyTypes => "company_types",
        }
    }

    /// Human-readable label used when seeding.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Roles => "Roles",
            Self::ProjectTypes => "Project Types",
            Self::CompanyTypes => "Company Types",
        }
    }

    /// Resolve a free-form label (for example `"Project Types"`) by slugging it.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::UnknownCategory`] if the slug is not one of
    /// the known category keys.
    pub fn from_label(label: &str) -> Result<Self, ReferenceError> {
        let key = slugify(label);
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| ReferenceError::UnknownCategory(label.trim().to_owned()))
    }
}

impl std::fmt::Display for ReferenceCategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for ReferenceCategoryKind {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

/// Display hints for an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

/// A validated, slugged item key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxonomyKey(String);

impl TaxonomyKey {
    /// Slug `raw` into a key.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::EmptyKey`] if nothing survives slugging.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let key = slugify(raw);
        if key.is_empty() {
            return Err(ReferenceError::EmptyKey);
        }
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaxonomyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaxonomyKey {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaxonomyKey> for String {
    fn from(key: TaxonomyKey) -> Self {
        key.0
    }
}

/// A reference item resolved into its typed meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Role(Role),
    ProjectType(TaxonomyKey),
    CompanyType(TaxonomyKey),
}

impl Taxonomy {
    /// Resolve `key` within `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty keys, and for `roles` keys that are not a
    /// known [`Role`].
    pub fn resolve(kind: ReferenceCategoryKind, key: &str) -> Result<Self, ReferenceError> {
        match kind {
            ReferenceCategoryKind::Roles => key
                .parse::<Role>()
                .map(Self::Role)
                .map_err(|e| ReferenceError::UnknownRole(e.0)),
            ReferenceCategoryKind::ProjectTypes => TaxonomyKey::parse(key).map(Self::ProjectType),
            ReferenceCategoryKind::CompanyTypes => TaxonomyKey::parse(key).map(Self::CompanyType),
        }
    }
}

/// An item ready to be stored in a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReferenceItem {
    pub key: TaxonomyKey,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub metadata: ReferenceMetadata,
}

/// A stored item. Deleted items keep their row until the retention sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceItem {
    pub id: ReferenceItemId,
    pub key: String,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub is_deleted: bool,
    pub metadata: ReferenceMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A category and its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCategory {
    pub id: ReferenceCategoryId,
    pub category: String,
    pub key: ReferenceCategoryKind,
    pub items: Vec<ReferenceItem>,
}

impl ReferenceCategory {
    /// Number of stored items, deleted ones included.
    #[must_use]
    pub fn item_total(&self) -> usize {
        self.items.len()
    }

    /// The same category with deleted items removed.
    #[must_use]
    pub fn without_deleted(mut self) -> Self {
        self.items.retain(|item| !item.is_deleted);
        self
    }

    /// Whether any stored item (deleted or not) already uses `key`.
    #[must_use]
    pub fn has_key(&self, key: &TaxonomyKey) -> bool {
        self.items.iter().any(|item| item.key == key.as_str())
    }

    /// Keep only the candidates whose key is not already taken, dropping
    /// repeats within `candidates` as well.
    #[must_use]
    pub fn fresh_items(&self, candidates: Vec<NewReferenceItem>) -> Vec<NewReferenceItem> {
        let mut fresh: Vec<NewReferenceItem> = Vec::with_capacity(candidates.len());
        for item in candidates {
            if !self.has_key(&item.key) && !fresh.iter().any(|f| f.key == item.key) {
                fresh.push(item);
            }
        }
        fresh
    }

    /// Whether an active item in this category resolves to `role`, under any
    /// of its accepted spellings.
    #[must_use]
    pub fn grants_role(&self, role: Role) -> bool {
        self.items.iter().any(|item| {
            item.is_active && !item.is_deleted && item.key.parse::<Role>().is_ok_and(|r| r == role)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(key: &str, deleted: bool) -> ReferenceItem {
        let now = Utc::now();
        ReferenceItem {
            id: ReferenceItemId::new(),
            key: key.to_owned(),
            name: key.to_owned(),
            description: String::new(),
            sort_order: 1,
            is_active: true,
            is_deleted: deleted,
            metadata: ReferenceMetadata::default(),
            created_at: now,
            updated_at: now,
            deleted_at: deleted.then_some(now),
        }
    }

    fn candidate(key: &str) -> NewReferenceItem {
        NewReferenceItem {
            key: TaxonomyKey::parse(key).expect("key"),
            name: key.to_owned(),
            description: String::new(),
            sort_order: 1,
            is_active: true,
            metadata: ReferenceMetadata::default(),
        }
    }

    fn category(items: Vec<ReferenceItem>) -> ReferenceCategory {
        ReferenceCategory {
            id: ReferenceCategoryId::new(),
            category: "Project Types".to_owned(),
            key: ReferenceCategoryKind::ProjectTypes,
            items,
        }
    }

    #[test]
    fn slugify_collapses_runs() {
        assert_eq!(slugify("Project Types!"), "project_types");
        assert_eq!(slugify("a--b__c"), "a_b_c");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("Company Types 2"), "company_types_2");
    }

    #[test]
    fn category_labels_resolve() {
        assert_eq!(
            ReferenceCategoryKind::from_label("Project Types!"),
            Ok(ReferenceCategoryKind::ProjectTypes)
        );
        assert_eq!(
            ReferenceCategoryKind::from_label("ROLES"),
            Ok(ReferenceCategoryKind::Roles)
        );
        assert!(matches!(
            ReferenceCategoryKind::from_label("Colours"),
            Err(ReferenceError::UnknownCategory(_))
        ));
    }

    #[test]
    fn role_items_resolve_to_roles() {
        assert_eq!(
            Taxonomy::resolve(ReferenceCategoryKind::Roles, "superadmin"),
            Ok(Taxonomy::Role(Role::SuperAdmin))
        );
        assert!(matches!(
            Taxonomy::resolve(ReferenceCategoryKind::Roles, "wizard"),
            Err(ReferenceError::UnknownRole(_))
        ));
        assert!(matches!(
            Taxonomy::resolve(ReferenceCategoryKind::CompanyTypes, "Private Ltd"),
            Ok(Taxonomy::CompanyType(key)) if key.as_str() == "private_ltd"
        ));
    }

    #[test]
    fn fresh_items_skip_existing_and_repeated_keys() {
        let cat = category(vec![stored("villa", false), stored("plot", true)]);
        let fresh = cat.fresh_items(vec![
            candidate("villa"),
            candidate("plot"),
            candidate("office"),
            candidate("office"),
        ]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].key.as_str(), "office");
    }

    #[test]
    fn deleted_items_are_hidden_but_counted() {
        let cat = category(vec![stored("villa", false), stored("plot", true)]);
        assert_eq!(cat.item_total(), 2);
        let visible = cat.without_deleted();
        assert!(!visible.grants_role(Role::Admin));
        assert_eq!(visible.items.len(), 1);
    }

    #[test]
    fn role_items_grant_roles_under_either_spelling() {
        let mut roles = category(vec![stored("superadmin", false), stored("admin", true)]);
        roles.key = ReferenceCategoryKind::Roles;
        assert!(roles.grants_role(Role::SuperAdmin));
        assert!(!roles.grants_role(Role::Admin));
        assert!(!roles.grants_role(Role::Customer));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(TaxonomyKey::parse("  ?? "), Err(ReferenceError::EmptyKey));
    }
}
