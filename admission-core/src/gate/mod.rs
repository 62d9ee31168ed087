//! Request gatekeeper.
//!
//! Every request passes a fixed sequence of stages before its handler
//! runs: edge admission (per-address quota), credential parse, login
//! enforcement, then route admission (per-route quota). The first stage
//! to refuse ends the request; later stages never see it. Handlers never
//! re-check any of this, they read the [`Identity`] the gate leaves in
//! request extensions.

mod client_ip;
mod table;

pub use client_ip::client_ip;
pub use table::{route_name, AuthPolicy, RoutePolicy, RouteTable};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;

use crate::error::AppError;
use crate::identity::Identity;
use crate::limit::{Decision, LimiterKey, RateLimitPolicy, SlidingWindowLimiter};
use crate::revoke::RevocationStore;
use crate::token::{TokenService, TokenUse};

/// Everything the gate needs to decide one request. Cheap to clone;
/// attach with `middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct Gatekeeper {
    tokens: Arc<TokenService>,
    revocations: Arc<dyn RevocationStore>,
    limiter: Arc<SlidingWindowLimiter>,
    routes: Arc<RouteTable>,
    edge: Option<RateLimitPolicy>,
    skip_paths: HashSet<String>,
}

impl Gatekeeper {
    pub fn new(
        tokens: Arc<TokenService>,
        revocations: Arc<dyn RevocationStore>,
        limiter: Arc<SlidingWindowLimiter>,
        routes: RouteTable,
    ) -> Self {
        Self {
            tokens,
            revocations,
            limiter,
            routes: Arc::new(routes),
            edge: None,
            skip_paths: HashSet::new(),
        }
    }

    /// Cap requests per client address, ahead of every other stage.
    pub fn with_edge_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.edge = Some(policy);
        self
    }

    /// Paths the gate waves through untouched, e.g. health and metrics.
    pub fn with_skip_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.skip_paths = paths.into_iter().collect();
        self
    }
}

/// The gate itself. Stages run in a fixed order and the first refusal
/// wins, so a caller who is both over quota and unauthenticated sees the
/// quota error.
pub async fn gatekeeper_middleware(
    State(gate): State<Gatekeeper>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if gate.skip_paths.contains(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request);

    // Edge admission.
    let mut edge_decision = None;
    if let Some(policy) = gate.edge {
        match ip {
            Some(ip) => {
                let decision = gate.limiter.check(&LimiterKey::Ip(ip), policy);
                if !decision.allowed {
                    counter!("gate_rejections_total", "stage" => "edge_admission").increment(1);
                    let mut response = AppError::RateLimited(
                        "too many requests from this address".to_string(),
                        decision.retry_after_seconds(),
                    )
                    .into_response();
                    apply_quota_headers(&mut response, &decision, policy.window);
                    return Ok(response);
                }
                edge_decision = Some((decision, policy.window));
            }
            None => {
                tracing::warn!("Could not determine client address, skipping edge admission");
            }
        }
    }

    // Credential parse. A presented credential must be valid even when
    // the route turns out to be public; there is no anonymous fallback
    // for a bad token.
    let identity = match establish_identity(&gate, request.headers()).await {
        Ok(identity) => identity,
        Err(e) => {
            counter!("gate_rejections_total", "stage" => "credential_parse").increment(1);
            return Err(e);
        }
    };

    // Login enforcement and route admission read the policy registered
    // for the matched route. Unregistered routes are public and
    // unlimited.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| route_name(request.method(), m.as_str()));
    if let Some(route) = route.as_deref() {
        if let Some(policy) = gate.routes.lookup(route) {
            if let Err(e) = policy.auth.check(&identity) {
                counter!("gate_rejections_total", "stage" => "login_enforcement").increment(1);
                return Err(e);
            }

            if let Some(limit) = policy.limit {
                // Authenticated callers are counted by account so the
                // quota follows them across addresses; anonymous callers
                // are counted by address.
                let key = match &identity {
                    Identity::Account(claims) => Some(LimiterKey::RouteAccount {
                        route: route.to_string(),
                        account_id: claims.sub.clone(),
                    }),
                    Identity::Anonymous => ip.map(|ip| LimiterKey::RouteIp {
                        route: route.to_string(),
                        ip,
                    }),
                };
                match key {
                    Some(key) => {
                        let decision = gate.limiter.check(&key, limit);
                        if !decision.allowed {
                            counter!("gate_rejections_total", "stage" => "route_admission")
                                .increment(1);
                            return Err(AppError::RateLimited(
                                format!("rate limit exceeded for {}", route),
                                decision.retry_after_seconds(),
                            ));
                        }
                    }
                    None => {
                        tracing::warn!(
                            route,
                            "Could not determine client address, skipping route admission"
                        );
                    }
                }
            }
        }
    }

    // Dispatch. Handlers and extractors read the identity from here on.
    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;
    if let Some((decision, window)) = edge_decision {
        apply_quota_headers(&mut response, &decision, window);
    }
    Ok(response)
}

async fn establish_identity(gate: &Gatekeeper, headers: &HeaderMap) -> Result<Identity, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Malformed)?;

    let claims = gate.tokens.decode(token, TokenUse::Access)?;

    // Fail closed: if the revocation store cannot answer, the credential
    // is not accepted.
    let revoked = gate
        .revocations
        .is_revoked(&claims.sub, claims.iat)
        .await
        .map_err(AppError::StorageError)?;
    if revoked {
        return Err(AppError::Revoked);
    }

    Ok(Identity::Account(claims))
}

fn apply_quota_headers(response: &mut Response, decision: &Decision, window: Duration) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&window.as_secs().to_string()) {
        headers.insert("x-ratelimit-window", value);
    }
}
