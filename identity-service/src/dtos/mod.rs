pub mod accounts;
pub mod admin;
pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mirror of the error body produced by the shared error type, kept here so
/// the OpenAPI document can reference it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Invalid login code")]
    pub error: String,
    pub retriable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}
