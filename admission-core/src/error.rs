use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every stage of request admission.
///
/// Variants map one-to-one onto HTTP statuses in [`IntoResponse`]; callers
/// never need to pick a status themselves. `RateLimited` carries the
/// retry-after hint in whole seconds.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Invalid login code: {0}")]
    InvalidCode(String),

    #[error("Identity provider unavailable: {0}")]
    IdentityProviderUnavailable(anyhow::Error),

    #[error("Malformed credential")]
    Malformed,

    #[error("Expired credential")]
    Expired,

    #[error("Revoked credential")]
    Revoked,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests: {0}")]
    RateLimited(String, Option<u64>),

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Storage error: {0}")]
    StorageError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Whether a client may retry the same request unchanged and expect it
    /// to eventually succeed. Surfaced in every error body so callers do
    /// not have to guess from the status code.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            AppError::IdentityProviderUnavailable(_) | AppError::RateLimited(_, _)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::InvalidCode(_) => StatusCode::BAD_REQUEST,
            AppError::IdentityProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Malformed
            | AppError::Expired
            | AppError::Revoked
            | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::RateLimited(_, _) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageError(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StorageError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            retriable: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            retry_after_seconds: Option<u64>,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let status = self.status();
        let retriable = self.retriable();

        let (error_message, details, retry_after) = match self {
            AppError::ValidationError(err) => {
                ("Validation error".to_string(), Some(err.to_string()), None)
            }
            AppError::BadRequest(err) => (err.to_string(), None, None),
            AppError::InvalidCode(msg) => (format!("Invalid login code: {}", msg), None, None),
            AppError::IdentityProviderUnavailable(err) => (
                "Identity provider unavailable".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::Malformed => ("Malformed credential".to_string(), None, None),
            AppError::Expired => ("Expired credential".to_string(), None, None),
            AppError::Revoked => ("Revoked credential".to_string(), None, None),
            AppError::Unauthenticated(msg) => (msg, None, None),
            AppError::Forbidden(msg) => (msg, None, None),
            AppError::RateLimited(msg, retry) => (msg, None, retry),
            AppError::AccountDisabled => ("Account disabled".to_string(), None, None),
            AppError::NotFound(err) => (err.to_string(), None, None),
            AppError::StorageError(err) => (
                "Storage error".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::InternalError(err) => (
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
                None,
            ),
            AppError::ConfigError(err) => (
                "Configuration error".to_string(),
                Some(err.to_string()),
                None,
            ),
        };

        let mut res = (
            status,
            Json(ErrorBody {
                error: error_message,
                retriable,
                retry_after_seconds: retry_after,
                details,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            AppError::InvalidCode("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::IdentityProviderUnavailable(anyhow::anyhow!("timeout")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::Malformed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Revoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Unauthenticated("login required".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("wrong account type".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::AccountDisabled.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimited("slow down".into(), Some(3)).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn only_transient_failures_are_retriable() {
        assert!(AppError::IdentityProviderUnavailable(anyhow::anyhow!("down")).retriable());
        assert!(AppError::RateLimited("later".into(), Some(1)).retriable());
        assert!(!AppError::InvalidCode("used".into()).retriable());
        assert!(!AppError::Revoked.retriable());
        assert!(!AppError::AccountDisabled.retriable());
    }

    #[test]
    fn rate_limited_response_carries_retry_after_header() {
        let res = AppError::RateLimited("too many requests".into(), Some(42)).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers()
                .get(axum::http::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[test]
    fn rate_limited_without_hint_omits_the_header() {
        let res = AppError::RateLimited("too many requests".into(), None).into_response();
        assert!(res.headers().get(axum::http::header::RETRY_AFTER).is_none());
    }
}
