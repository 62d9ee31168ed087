use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitConfigResponse {
    pub enabled: bool,
    #[schema(example = 60)]
    pub window_seconds: u64,
    #[schema(example = 100)]
    pub max_requests: u32,
    pub whitelist: Vec<String>,
}

/// Point-in-time view of one address's quota. Reading it does not consume
/// a request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuotaResponse {
    #[schema(example = "ip:203.0.113.7")]
    pub key: String,
    pub limit: u32,
    pub remaining: u32,
    pub used: u32,
    /// Seconds until the oldest counted request leaves the window. Absent
    /// when nothing is counted.
    pub resets_in_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetResponse {
    #[schema(example = "ip:203.0.113.7")]
    pub key: String,
    /// True when a tracked counter existed and was dropped.
    pub cleared: bool,
}
