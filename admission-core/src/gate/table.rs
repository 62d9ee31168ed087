use std::collections::HashMap;

use axum::http::Method;

use crate::error::AppError;
use crate::identity::{AccountType, Identity};
use crate::limit::RateLimitPolicy;

/// Who may pass a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Anyone, with or without a credential.
    Public,
    /// Any account with a live credential.
    Authenticated,
    /// Only accounts of the listed types.
    Restricted(Vec<AccountType>),
}

impl AuthPolicy {
    /// Enforce this policy against the identity the credential stage
    /// established. Anonymous callers on protected routes are asked to
    /// log in; wrong account types are refused outright.
    pub fn check(&self, identity: &Identity) -> Result<(), AppError> {
        match self {
            AuthPolicy::Public => Ok(()),
            AuthPolicy::Authenticated => match identity {
                Identity::Account(_) => Ok(()),
                Identity::Anonymous => {
                    Err(AppError::Unauthenticated("login required".to_string()))
                }
            },
            AuthPolicy::Restricted(types) => match identity {
                Identity::Account(claims) if types.contains(&claims.account_type) => Ok(()),
                Identity::Account(claims) => Err(AppError::Forbidden(format!(
                    "route not available to {} accounts",
                    claims.account_type
                ))),
                Identity::Anonymous => {
                    Err(AppError::Unauthenticated("login required".to_string()))
                }
            },
        }
    }
}

/// Admission rules for one route: who may call it and how often.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub auth: AuthPolicy,
    pub limit: Option<RateLimitPolicy>,
}

impl RoutePolicy {
    pub fn public() -> Self {
        Self {
            auth: AuthPolicy::Public,
            limit: None,
        }
    }

    pub fn authenticated() -> Self {
        Self {
            auth: AuthPolicy::Authenticated,
            limit: None,
        }
    }

    pub fn restricted(types: impl IntoIterator<Item = AccountType>) -> Self {
        Self {
            auth: AuthPolicy::Restricted(types.into_iter().collect()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: RateLimitPolicy) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The canonical name a route is registered and counted under.
pub fn route_name(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

/// Route policies, registered once at startup and read-only afterwards.
/// Routes not registered here are treated as public and unlimited.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, RoutePolicy>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for `method path`. Registering the same route
    /// again replaces the earlier policy.
    pub fn register(mut self, method: Method, path: &str, policy: RoutePolicy) -> Self {
        self.routes.insert(route_name(&method, path), policy);
        self
    }

    pub fn lookup(&self, route: &str) -> Option<&RoutePolicy> {
        self.routes.get(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AccountType;
    use crate::token::{Claims, TokenUse};

    fn account(account_type: AccountType) -> Identity {
        Identity::Account(Claims {
            sub: "42".to_string(),
            account_type,
            token_use: TokenUse::Access,
            jti: "test-jti".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        })
    }

    #[test]
    fn registration_and_lookup_round_trip() {
        let table = RouteTable::new()
            .register(Method::POST, "/auth/login", RoutePolicy::public())
            .register(Method::GET, "/accounts/me", RoutePolicy::authenticated());

        assert_eq!(table.len(), 2);
        assert!(table.lookup("POST /auth/login").is_some());
        assert!(table.lookup("GET /accounts/me").is_some());
        assert!(table.lookup("DELETE /accounts/me").is_none());
    }

    #[test]
    fn re_registering_replaces_the_policy() {
        let table = RouteTable::new()
            .register(Method::GET, "/x", RoutePolicy::public())
            .register(Method::GET, "/x", RoutePolicy::authenticated());

        assert_eq!(table.len(), 1);
        let policy = table.lookup("GET /x").expect("registered");
        assert_eq!(policy.auth, AuthPolicy::Authenticated);
    }

    #[test]
    fn public_routes_admit_everyone() {
        let policy = AuthPolicy::Public;
        assert!(policy.check(&Identity::Anonymous).is_ok());
        assert!(policy.check(&account(AccountType::Farmer)).is_ok());
    }

    #[test]
    fn authenticated_routes_turn_away_anonymous_callers() {
        let policy = AuthPolicy::Authenticated;
        assert!(matches!(
            policy.check(&Identity::Anonymous),
            Err(AppError::Unauthenticated(_))
        ));
        assert!(policy.check(&account(AccountType::Supplier)).is_ok());
    }

    #[test]
    fn restricted_routes_check_the_account_type() {
        let policy = AuthPolicy::Restricted(vec![AccountType::Admin]);

        assert!(policy.check(&account(AccountType::Admin)).is_ok());
        assert!(matches!(
            policy.check(&account(AccountType::Farmer)),
            Err(AppError::Forbidden(_))
        ));
        // Anonymous callers get the login prompt, not a type refusal.
        assert!(matches!(
            policy.check(&Identity::Anonymous),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn limits_attach_to_any_auth_policy() {
        let limit = RateLimitPolicy::per_window_seconds(50, 60);
        let policy = RoutePolicy::authenticated().with_limit(limit);
        assert_eq!(policy.limit, Some(limit));
        assert!(RoutePolicy::public().limit.is_none());
    }
}
