use std::collections::HashMap;

use admission_core::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::AccountStore;
use crate::models::{Account, AccountStatus, NewAccount, ProfilePatch};

/// Account store backed by process memory. Used in development when no
/// database is configured, and throughout the test suite.
pub struct InMemoryAccountStore {
    inner: Mutex<Inner>,
}

struct Inner {
    next_id: i64,
    accounts: HashMap<i64, Account>,
    by_external: HashMap<String, i64>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                accounts: HashMap::new(),
                by_external: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    /// Lookup and create happen under one lock; concurrent calls with the
    /// same external id serialize, so only the first can create.
    async fn insert_or_fetch(&self, new: NewAccount) -> Result<(Account, bool), AppError> {
        let mut inner = self.inner.lock().await;

        if let Some(id) = inner.by_external.get(&new.external_id).copied() {
            let account = inner.accounts.get(&id).cloned().ok_or_else(|| {
                AppError::StorageError(anyhow::anyhow!("Dangling external id index entry"))
            })?;
            return Ok((account, false));
        }

        let now = Utc::now();
        let id = inner.next_id;
        inner.next_id += 1;

        let account = Account {
            id,
            external_id: new.external_id.clone(),
            link_id: new.link_id,
            display_name: new.display_name,
            avatar_url: new.avatar_url,
            account_type: new.account_type,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };

        inner.by_external.insert(new.external_id, id);
        inner.accounts.insert(id, account.clone());

        Ok((account, true))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError> {
        let inner = self.inner.lock().await;
        let account = inner
            .by_external
            .get(external_id)
            .and_then(|id| inner.accounts.get(id))
            .cloned();
        Ok(account)
    }

    async fn update_profile(
        &self,
        id: i64,
        patch: ProfilePatch,
    ) -> Result<Option<Account>, AppError> {
        let mut inner = self.inner.lock().await;
        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(display_name) = patch.display_name {
            account.display_name = Some(display_name);
        }
        if let Some(avatar_url) = patch.avatar_url {
            account.avatar_url = Some(avatar_url);
        }
        account.updated_at = Utc::now();

        Ok(Some(account.clone()))
    }

    async fn set_status(
        &self,
        id: i64,
        status: AccountStatus,
    ) -> Result<Option<Account>, AppError> {
        let mut inner = self.inner.lock().await;
        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(None);
        };

        account.status = status;
        account.updated_at = Utc::now();

        Ok(Some(account.clone()))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
