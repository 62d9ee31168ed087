use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use admission_core::error::AppError;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{ExternalIdentity, IdentityProvider, ProviderError};
use crate::config::ProviderConfig;

/// Provider error codes that mean the code itself was bad (expired, already
/// used, or never issued). Everything else is treated as a provider outage.
const CODE_REJECTED: &[i64] = &[40029, 40163];

/// Exchanges one-time login codes against the provider's session endpoint.
pub struct CodeExchangeClient {
    config: ProviderConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    unionid: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

impl CodeExchangeClient {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

/// Maps a session endpoint payload to an identity. The endpoint reports
/// failures in-band with HTTP 200, so only the body matters.
fn identity_from_session(session: SessionResponse) -> Result<ExternalIdentity, ProviderError> {
    if let Some(errcode) = session.errcode.filter(|code| *code != 0) {
        let errmsg = session.errmsg.unwrap_or_else(|| "unknown error".to_string());
        if CODE_REJECTED.contains(&errcode) {
            return Err(ProviderError::InvalidCode(errmsg));
        }
        return Err(ProviderError::Unavailable(format!(
            "Provider error {}: {}",
            errcode, errmsg
        )));
    }

    match session.openid {
        Some(external_id) if !external_id.is_empty() => Ok(ExternalIdentity {
            external_id,
            link_id: session.unionid,
        }),
        _ => Err(ProviderError::Unavailable(
            "Provider response carried neither an id nor an error code".to_string(),
        )),
    }
}

#[async_trait]
impl IdentityProvider for CodeExchangeClient {
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("appid", self.config.app_id.as_str()),
                ("secret", self.config.app_secret.expose_secret().as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                ProviderError::Unavailable(format!("Failed to reach identity provider: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "Identity provider returned status {}",
                response.status()
            )));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            ProviderError::Unavailable(format!("Failed to parse provider response: {}", e))
        })?;

        let identity = identity_from_session(session)?;

        tracing::debug!(external_id = %identity.external_id, "Login code exchanged");

        Ok(identity)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // The session endpoint has no probe; reaching this far means the
        // client was built with a valid configuration.
        Ok(())
    }
}

/// In-process provider for development and tests. Resolves registered codes
/// to fixed identities; in passthrough mode any code resolves to itself.
pub struct StaticProvider {
    codes: RwLock<HashMap<String, ExternalIdentity>>,
    unavailable: AtomicBool,
    passthrough: bool,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            passthrough: false,
        }
    }

    /// A provider that echoes every code back as the external id. Useful
    /// when running locally without provider credentials.
    pub fn passthrough() -> Self {
        Self {
            passthrough: true,
            ..Self::new()
        }
    }

    pub fn register(&self, code: &str, identity: ExternalIdentity) {
        let mut codes = self
            .codes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        codes.insert(code.to_string(), identity);
    }

    /// Simulates a provider outage for tests.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(
                "Static provider marked unavailable".to_string(),
            ));
        }

        let registered = {
            let codes = self
                .codes
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            codes.get(code).cloned()
        };

        match registered {
            Some(identity) => Ok(identity),
            None if self.passthrough => Ok(ExternalIdentity {
                external_id: code.to_string(),
                link_id: None,
            }),
            None => Err(ProviderError::InvalidCode(format!(
                "Unknown login code: {}",
                code
            ))),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(
                "Static provider marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}
