pub mod exchange;

use admission_core::error::AppError;
use anyhow::anyhow;
use async_trait::async_trait;
use thiserror::Error;

pub use exchange::{CodeExchangeClient, StaticProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the login code itself. Not retriable; the
    /// client must obtain a fresh code.
    #[error("Invalid login code: {0}")]
    InvalidCode(String),

    /// The provider could not be reached or answered with a non-code
    /// failure. Retrying with the same code may succeed.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCode(msg) => AppError::InvalidCode(msg),
            ProviderError::Unavailable(msg) => {
                AppError::IdentityProviderUnavailable(anyhow!(msg))
            }
        }
    }
}

/// Identity resolved by the external provider for a one-time login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Provider-scoped stable id; unique per account.
    pub external_id: String,
    /// Cross-app id some providers return alongside the primary id.
    pub link_id: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a one-time login code to a stable external identity. Codes
    /// are single-use; a second exchange of the same code fails.
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}
