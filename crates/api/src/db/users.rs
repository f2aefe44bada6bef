//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use mercato_core::{Address, Email, Role, UserId};

use super::{RepositoryError, UserStore};
use crate::models::{LoginKey, NewUser, User};

const USER_COLUMNS: &str = "id, name, email, mobile, role, addresses, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    mobile: Option<String>,
    role: String,
    addresses: Json<Vec<Address>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = row.role.parse::<Role>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            mobile: row.mobile,
            role,
            addresses: row.addresses.0,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// `PostgreSQL` account storage.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_credentials(
        &self,
        key: LoginKey<'_>,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let (email, mobile) = match key {
            LoginKey::Email(email) => (Some(email.as_str()), None),
            LoginKey::Mobile(mobile) => (None, Some(mobile)),
            LoginKey::EmailAndMobile(email, mobile) => (Some(email.as_str()), Some(mobile)),
        };
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            r"
            SELECT {USER_COLUMNS}, password_hash FROM users
            WHERE ($1::text IS NULL OR email = $1)
              AND ($2::text IS NULL OR mobile = $2)
              AND deleted_at IS NULL
            "
        ))
        .bind(email)
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn count_with_role(&self, role: Role) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = $1 AND deleted_at IS NULL",
        )
        .bind(role.key())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (id, name, email, mobile, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::new())
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(user.mobile.as_deref())
        .bind(user.role.key())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("mobile") => "mobile",
                    _ => "email",
                };
                return RepositoryError::Conflict(format!("{field} already exists"));
            }
            RepositoryError::Database(e)
        })?;

        User::try_from(row)
    }

    async fn append_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> Result<bool, RepositoryError> {
        // jsonb containment on a one-element array matches any saved address
        // with the same four fields.
        let result = sqlx::query(
            r"
            UPDATE users
            SET addresses = addresses || $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL AND NOT addresses @> $2
            ",
        )
        .bind(id)
        .bind(Json(std::slice::from_ref(address)))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
