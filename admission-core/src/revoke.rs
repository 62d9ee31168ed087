use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use redis::{Client, aio::ConnectionManager};

/// Per-account revocation watermark.
///
/// `mark` records the instant an account's credentials were revoked; any
/// token whose issue time is at or before the mark is dead. Entries only
/// need to outlive the longest credential lifetime, so stores take a TTL.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revocation at `mark_time` (unix seconds), kept for
    /// `ttl_seconds`. A later mark replaces an earlier one.
    async fn mark(
        &self,
        account_id: &str,
        mark_time: i64,
        ttl_seconds: i64,
    ) -> Result<(), anyhow::Error>;

    /// The account's current watermark, if any.
    async fn mark_time(&self, account_id: &str) -> Result<Option<i64>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;

    /// Whether a credential issued at `issued_at` is revoked. Same-second
    /// ties go to the revocation: mark time at or after issue time rejects.
    async fn is_revoked(&self, account_id: &str, issued_at: i64) -> Result<bool, anyhow::Error> {
        Ok(self
            .mark_time(account_id)
            .await?
            .is_some_and(|mark| mark >= issued_at))
    }
}

/// Process-local watermark store. The default for single-instance
/// deployments and the fake used by tests.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    marks: DashMap<String, MarkEntry>,
}

struct MarkEntry {
    mark_time: i64,
    expires_at: i64,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn mark(
        &self,
        account_id: &str,
        mark_time: i64,
        ttl_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        self.marks.insert(
            account_id.to_string(),
            MarkEntry {
                mark_time,
                expires_at: Utc::now().timestamp() + ttl_seconds,
            },
        );
        Ok(())
    }

    async fn mark_time(&self, account_id: &str) -> Result<Option<i64>, anyhow::Error> {
        // Lazy expiry, matching what a TTL'd key store would do.
        if let Some(entry) = self.marks.get(account_id) {
            if entry.expires_at > Utc::now().timestamp() {
                return Ok(Some(entry.mark_time));
            }
        }
        self.marks
            .remove_if(account_id, |_, entry| entry.expires_at <= Utc::now().timestamp());
        Ok(None)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Redis-backed watermark store for multi-instance deployments, so a
/// logout on one instance is seen by all of them.
#[derive(Clone)]
pub struct RedisRevocationStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis for revocation marks");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Redis revocation store ready");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    fn key(account_id: &str) -> String {
        format!("revoked:{}", account_id)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn mark(
        &self,
        account_id: &str,
        mark_time: i64,
        ttl_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(account_id))
            .arg(mark_time)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write revocation mark: {}", e))
    }

    async fn mark_time(&self, account_id: &str) -> Result<Option<i64>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let mark: Option<i64> = redis::cmd("GET")
            .arg(Self::key(account_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read revocation mark: {}", e))?;
        Ok(mark)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}
