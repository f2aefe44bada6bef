//! Hard deletion of soft-deleted rows past the retention window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RepositoryError, RetentionStore};

/// Tables swept by the retention job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTarget {
    Users,
    Products,
    ReferenceItems,
}

impl RetentionTarget {
    pub const ALL: [Self; 3] = [Self::Users, Self::Products, Self::ReferenceItems];

    /// Table name, for logs.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Products => "products",
            Self::ReferenceItems => "reference_items",
        }
    }

    const fn purge_sql(self) -> &'static str {
        match self {
            Self::Users => "DELETE FROM users WHERE deleted_at IS NOT NULL AND deleted_at < $1",
            Self::Products => {
                "DELETE FROM products WHERE deleted_at IS NOT NULL AND deleted_at < $1"
            }
            Self::ReferenceItems => {
                "DELETE FROM reference_items WHERE is_deleted AND deleted_at < $1"
            }
        }
    }
}

impl std::fmt::Display for RetentionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// `PostgreSQL` retention purges.
#[derive(Clone)]
pub struct RetentionRepository {
    pool: PgPool,
}

impl RetentionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetentionStore for RetentionRepository {
    async fn purge(
        &self,
        target: RetentionTarget,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(target.purge_sql())
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
