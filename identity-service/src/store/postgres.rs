use admission_core::error::AppError;
use admission_core::identity::AccountType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::instrument;

use super::AccountStore;
use crate::models::{Account, AccountStatus, NewAccount, ProfilePatch};

const ACCOUNT_COLUMNS: &str =
    "id, external_id, link_id, display_name, avatar_url, account_type, status, \
     created_at, updated_at";

/// PostgreSQL-backed account store.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

/// Raw row shape; enums travel as text and are parsed on the way out.
#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    external_id: String,
    link_id: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    account_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let account_type: AccountType = row
            .account_type
            .parse()
            .map_err(|e: String| AppError::StorageError(anyhow::anyhow!(e)))?;
        let status: AccountStatus = row
            .status
            .parse()
            .map_err(|e: String| AppError::StorageError(anyhow::anyhow!(e)))?;

        Ok(Account {
            id: row.id,
            external_id: row.external_id,
            link_id: row.link_id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            account_type,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgAccountStore {
    /// Connect a pool and return the store. Schema migrations are run
    /// separately via [`PgAccountStore::run_migrations`].
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                AppError::StorageError(anyhow::anyhow!("Failed to connect to database: {}", e))
            })?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    /// Upsert with `ON CONFLICT DO NOTHING`; the row either comes back from
    /// `RETURNING` (created) or from the follow-up select (raced or
    /// pre-existing). Either way exactly one row exists afterwards.
    #[instrument(skip(self, new), fields(external_id = %new.external_id))]
    async fn insert_or_fetch(&self, new: NewAccount) -> Result<(Account, bool), AppError> {
        let inserted: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (external_id, link_id, display_name, avatar_url, account_type)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&new.external_id)
        .bind(&new.link_id)
        .bind(&new.display_name)
        .bind(&new.avatar_url)
        .bind(new.account_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(anyhow::anyhow!(e)))?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        let existing = self
            .find_by_external_id(&new.external_id)
            .await?
            .ok_or_else(|| {
                AppError::StorageError(anyhow::anyhow!(
                    "Account for external id vanished between upsert and fetch"
                ))
            })?;

        Ok((existing, false))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(anyhow::anyhow!(e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE external_id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(anyhow::anyhow!(e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn update_profile(
        &self,
        id: i64,
        patch: ProfilePatch,
    ) -> Result<Option<Account>, AppError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE accounts
            SET display_name = COALESCE($2, display_name),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(&patch.display_name)
        .bind(&patch.avatar_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(anyhow::anyhow!(e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn set_status(
        &self,
        id: i64,
        status: AccountStatus,
    ) -> Result<Option<Account>, AppError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE accounts
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(anyhow::anyhow!(e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::StorageError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}
