pub mod memory;
pub mod postgres;

use admission_core::error::AppError;
use async_trait::async_trait;

use crate::models::{Account, AccountStatus, NewAccount, ProfilePatch};

pub use memory::InMemoryAccountStore;
pub use postgres::PgAccountStore;

/// Account persistence. Every method maps storage failures to
/// [`AppError::StorageError`]; callers never see driver errors.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Finds the account for `new.external_id`, creating it when absent.
    /// Returns the account plus `true` when this call created it. Concurrent
    /// calls with the same external id must yield one account, with exactly
    /// one caller seeing `true`.
    async fn insert_or_fetch(&self, new: NewAccount) -> Result<(Account, bool), AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AppError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError>;

    /// Applies the non-`None` fields of `patch`. Returns the updated account,
    /// or `None` when no such account exists.
    async fn update_profile(&self, id: i64, patch: ProfilePatch)
        -> Result<Option<Account>, AppError>;

    async fn set_status(&self, id: i64, status: AccountStatus)
        -> Result<Option<Account>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
