//! Reference data repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use mercato_core::{
    NewReferenceItem, ReferenceCategory, ReferenceCategoryId, ReferenceCategoryKind,
    ReferenceItem, ReferenceItemId, ReferenceMetadata,
};

use super::{RepositoryError, ReferenceStore, conflict_on_unique};

const ITEM_COLUMNS: &str = "id, category_id, key, name, description, sort_order, is_active, \
     is_deleted, color, icon, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: ReferenceCategoryId,
    category: String,
    cate_key: String,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: ReferenceItemId,
    category_id: ReferenceCategoryId,
    key: String,
    name: String,
    description: String,
    sort_order: i32,
    is_active: bool,
    is_deleted: bool,
    color: String,
    icon: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ItemRow> for ReferenceItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            name: row.name,
            description: row.description,
            sort_order: row.sort_order,
            is_active: row.is_active,
            is_deleted: row.is_deleted,
            metadata: ReferenceMetadata {
                color: row.color,
                icon: row.icon,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

fn assemble(row: CategoryRow, items: Vec<ReferenceItem>) -> Result<ReferenceCategory, RepositoryError> {
    let key = ReferenceCategoryKind::from_label(&row.cate_key).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid category key in database: {e}"))
    })?;
    Ok(ReferenceCategory {
        id: row.id,
        category: row.category,
        key,
        items,
    })
}

/// `PostgreSQL` taxonomy registry.
#[derive(Clone)]
pub struct ReferenceRepository {
    pool: PgPool,
}

impl ReferenceRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_of(&self, id: ReferenceCategoryId) -> Result<Vec<ReferenceItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM reference_items WHERE category_id = $1 \
             ORDER BY sort_order, created_at"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReferenceItem::from).collect())
    }

    async fn category_by_id(
        &self,
        id: ReferenceCategoryId,
    ) -> Result<ReferenceCategory, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, category, cate_key FROM reference_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = self.items_of(row.id).await?;
        assemble(row, items)
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    category_id: ReferenceCategoryId,
    items: &[NewReferenceItem],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            r"
            INSERT INTO reference_items
                (id, category_id, key, name, description, sort_order, is_active, color, icon)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (category_id, key) DO NOTHING
            ",
        )
        .bind(ReferenceItemId::new())
        .bind(category_id)
        .bind(item.key.as_str())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.sort_order)
        .bind(item.is_active)
        .bind(&item.metadata.color)
        .bind(&item.metadata.icon)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ReferenceStore for ReferenceRepository {
    async fn list(&self) -> Result<Vec<ReferenceCategory>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, category, cate_key FROM reference_categories ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM reference_items ORDER BY sort_order, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut by_category: HashMap<ReferenceCategoryId, Vec<ReferenceItem>> = HashMap::new();
        for row in rows {
            by_category
                .entry(row.category_id)
                .or_default()
                .push(ReferenceItem::from(row));
        }

        categories
            .into_iter()
            .map(|row| {
                let items = by_category.remove(&row.id).unwrap_or_default();
                assemble(row, items)
            })
            .collect()
    }

    async fn find(
        &self,
        kind: ReferenceCategoryKind,
    ) -> Result<Option<ReferenceCategory>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, category, cate_key FROM reference_categories WHERE cate_key = $1",
        )
        .bind(kind.key())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.items_of(row.id).await?;
                assemble(row, items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        kind: ReferenceCategoryKind,
        label: &str,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError> {
        let id = ReferenceCategoryId::new();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reference_categories (id, category, cate_key) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(label)
        .bind(kind.key())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "category"))?;

        insert_items(&mut tx, id, &items).await?;
        tx.commit().await?;

        self.category_by_id(id).await
    }

    async fn append(
        &self,
        id: ReferenceCategoryId,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_items(&mut tx, id, &items).await?;
        sqlx::query("UPDATE reference_categories SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.category_by_id(id).await
    }

    async fn soft_delete_item(
        &self,
        id: ReferenceItemId,
    ) -> Result<ReferenceItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let is_deleted: Option<bool> =
            sqlx::query_scalar("SELECT is_deleted FROM reference_items WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        match is_deleted {
            None => return Err(RepositoryError::NotFound),
            Some(true) => return Err(RepositoryError::Conflict("item already deleted".to_owned())),
            Some(false) => {}
        }

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r"
            UPDATE reference_items
            SET is_deleted = true, deleted_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ReferenceItem::from(row))
    }
}
