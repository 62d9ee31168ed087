//! admission-core: shared identity and admission-control plumbing for
//! marketplace services.
//!
//! Every service that sits behind the platform edge uses the same pieces:
//! the [`error::AppError`] taxonomy, the sliding-window [`limit`]er, the
//! [`token`] verifier with its [`revoke`] watermark store, and the
//! [`gate`]keeper middleware that evaluates them in a fixed order per
//! request.
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod limit;
pub mod middleware;
pub mod observability;
pub mod revoke;
pub mod token;

pub use async_trait;
pub use axum;
pub use serde;
pub use tokio;
pub use tracing;
pub use validator;
