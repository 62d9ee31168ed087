use std::env;
use std::net::IpAddr;

use admission_core::config::{get_env, get_env_parse, Environment};
use admission_core::error::AppError;
use dotenvy::dotenv;
use secrecy::Secret;

/// Full service configuration, loaded once at startup. Dev gets workable
/// defaults; prod requires everything to be set explicitly.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub tokens: TokenConfig,
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    pub edge: EdgeConfig,
    pub route_limits: RouteLimitConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub signing_secret: Secret<String>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Real code exchange against the configured provider endpoint.
    Http,
    /// Fixed code book, for dev mode and tests.
    Static,
}

impl std::str::FromStr for ProviderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProviderMode::Http),
            "static" => Ok(ProviderMode::Static),
            _ => Err(format!("Invalid provider mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub mode: ProviderMode,
    pub base_url: String,
    pub app_id: String,
    pub app_secret: Secret<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Postgres for accounts; unset selects the in-memory store.
    pub database_url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Redis for revocation marks; unset keeps them in process memory.
    pub redis_url: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub max_requests: u32,
    pub whitelist: Vec<IpAddr>,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RouteLimitConfig {
    pub login_max: u32,
    pub login_window_seconds: u64,
    pub refresh_max: u32,
    pub refresh_window_seconds: u64,
    pub profile_max: u32,
    pub profile_window_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let config = IdentityConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env_parse("PORT", Some("8080"), is_prod)?,
            tokens: TokenConfig {
                signing_secret: Secret::new(get_env(
                    "TOKEN_SIGNING_SECRET",
                    Some("dev-signing-secret-0123456789abcdef"),
                    is_prod,
                )?),
                access_ttl_seconds: get_env_parse(
                    "TOKEN_ACCESS_TTL_SECONDS",
                    Some("900"),
                    is_prod,
                )?,
                refresh_ttl_seconds: get_env_parse(
                    "TOKEN_REFRESH_TTL_SECONDS",
                    Some("604800"),
                    is_prod,
                )?,
            },
            provider: ProviderConfig {
                mode: get_env("PROVIDER_MODE", Some("static"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                base_url: get_env(
                    "PROVIDER_BASE_URL",
                    Some("http://localhost:9009/session"),
                    is_prod,
                )?,
                app_id: get_env("PROVIDER_APP_ID", Some("dev-app-id"), is_prod)?,
                app_secret: Secret::new(get_env(
                    "PROVIDER_APP_SECRET",
                    Some("dev-app-secret"),
                    is_prod,
                )?),
                timeout_seconds: get_env_parse("PROVIDER_TIMEOUT_SECONDS", Some("5"), is_prod)?,
            },
            store: StoreConfig {
                database_url: env::var("DATABASE_URL").ok().map(Secret::new),
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", Some("5"), is_prod)?,
                min_connections: get_env_parse("DB_MIN_CONNECTIONS", Some("1"), is_prod)?,
                redis_url: env::var("REDIS_URL").ok().map(Secret::new),
            },
            edge: EdgeConfig {
                enabled: get_env_parse("EDGE_RATE_LIMIT_ENABLED", Some("true"), is_prod)?,
                window_seconds: get_env_parse(
                    "EDGE_RATE_LIMIT_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                max_requests: get_env_parse("EDGE_RATE_LIMIT_MAX_REQUESTS", Some("100"), is_prod)?,
                whitelist: parse_whitelist(&get_env(
                    "EDGE_RATE_LIMIT_WHITELIST",
                    Some("127.0.0.1,::1"),
                    is_prod,
                )?)?,
                sweep_interval_seconds: get_env_parse(
                    "LIMITER_SWEEP_INTERVAL_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
            route_limits: RouteLimitConfig {
                login_max: get_env_parse("RATE_LIMIT_LOGIN_MAX", Some("10"), is_prod)?,
                login_window_seconds: get_env_parse(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                refresh_max: get_env_parse("RATE_LIMIT_REFRESH_MAX", Some("30"), is_prod)?,
                refresh_window_seconds: get_env_parse(
                    "RATE_LIMIT_REFRESH_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                profile_max: get_env_parse("RATE_LIMIT_PROFILE_MAX", Some("20"), is_prod)?,
                profile_window_seconds: get_env_parse(
                    "RATE_LIMIT_PROFILE_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.tokens.access_ttl_seconds <= 0 || self.tokens.refresh_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "token lifetimes must be positive"
            )));
        }

        if self.edge.enabled && self.edge.window_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "EDGE_RATE_LIMIT_WINDOW_SECONDS must be greater than 0"
            )));
        }

        if self.environment.is_prod() {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.provider.mode == ProviderMode::Static {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Static identity provider not allowed in production"
                )));
            }

            if self.store.database_url.is_none() {
                tracing::warn!(
                    "DATABASE_URL not set in production, accounts will not survive restarts"
                );
            }
        }

        Ok(())
    }
}

fn parse_whitelist(raw: &str) -> Result<Vec<IpAddr>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("invalid whitelist address: {}", s))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IdentityConfig {
        IdentityConfig {
            environment: Environment::Dev,
            service_name: "identity-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            port: 8080,
            tokens: TokenConfig {
                signing_secret: Secret::new("dev-signing-secret-0123456789abcdef".to_string()),
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 604_800,
            },
            provider: ProviderConfig {
                mode: ProviderMode::Static,
                base_url: "http://localhost:9009/session".to_string(),
                app_id: "dev-app-id".to_string(),
                app_secret: Secret::new("dev-app-secret".to_string()),
                timeout_seconds: 5,
            },
            store: StoreConfig {
                database_url: None,
                max_connections: 5,
                min_connections: 1,
                redis_url: None,
            },
            edge: EdgeConfig {
                enabled: true,
                window_seconds: 60,
                max_requests: 100,
                whitelist: vec!["127.0.0.1".parse().expect("ip")],
                sweep_interval_seconds: 60,
            },
            route_limits: RouteLimitConfig {
                login_max: 10,
                login_window_seconds: 60,
                refresh_max: 30,
                refresh_window_seconds: 60,
                profile_max: 20,
                profile_window_seconds: 60,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
        }
    }

    #[test]
    fn whitelist_parses_mixed_families() {
        let list = parse_whitelist("127.0.0.1, ::1").expect("parse");
        assert_eq!(list.len(), 2);
        assert!(parse_whitelist("127.0.0.1, office-gateway").is_err());
        assert!(parse_whitelist("").expect("empty ok").is_empty());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = test_config();
        config.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_edge_window() {
        let mut config = test_config();
        config.edge.window_seconds = 0;
        assert!(config.validate().is_err());

        config.edge.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_rejects_wildcard_origins_and_static_provider() {
        let mut config = test_config();
        config.environment = Environment::Prod;
        config.provider.mode = ProviderMode::Http;
        assert!(config.validate().is_ok());

        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());

        config.security.allowed_origins = vec!["https://app.example.com".to_string()];
        config.provider.mode = ProviderMode::Static;
        assert!(config.validate().is_err());
    }
}
