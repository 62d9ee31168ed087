use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::AccountType;

/// Marks which half of the credential pair a token is. A refresh token
/// presented where an access token is expected is a malformed credential,
/// never a valid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims carried by every signed credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account id).
    pub sub: String,
    /// Tenant role baked in at issue time.
    pub account_type: AccountType,
    /// Access or refresh.
    pub token_use: TokenUse,
    /// Token id, for log correlation.
    pub jti: String,
    /// Issued at (unix seconds). Compared against the revocation watermark.
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
}

/// A freshly signed token together with the claims that went into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    /// Seconds of validity remaining at issue time.
    pub fn expires_in(&self) -> i64 {
        self.claims.exp - self.claims.iat
    }
}

/// Issues and verifies signed credentials with a process-wide HMAC secret.
///
/// Verification is exact: zero leeway, and a token is rejected from its
/// expiry instant onwards. Revocation is not checked here; callers pair
/// [`TokenService::decode`] with a [`crate::revoke::RevocationStore`] lookup.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

const MIN_SECRET_BYTES: usize = 32;

impl TokenService {
    pub fn new(
        signing_secret: &Secret<String>,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Result<Self, AppError> {
        let secret = signing_secret.expose_secret();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "signing secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }
        if access_ttl_seconds <= 0 || refresh_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "token lifetimes must be positive"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// Sign a credential for an account.
    pub fn issue(
        &self,
        account_id: &str,
        account_type: AccountType,
        token_use: TokenUse,
    ) -> Result<IssuedToken, AppError> {
        let ttl = match token_use {
            TokenUse::Access => self.access_ttl_seconds,
            TokenUse::Refresh => self.refresh_ttl_seconds,
        };
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl);

        let claims = Claims {
            sub: account_id.to_string(),
            account_type,
            token_use,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }

    /// Sign an access/refresh pair for an account.
    pub fn issue_pair(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> Result<(IssuedToken, IssuedToken), AppError> {
        let access = self.issue(account_id, account_type, TokenUse::Access)?;
        let refresh = self.issue(account_id, account_type, TokenUse::Refresh)?;
        Ok((access, refresh))
    }

    /// Verify signature, shape, use and lifetime of a credential.
    ///
    /// Lifetime is half-open: valid strictly before `exp`, rejected at and
    /// after it.
    pub fn decode(&self, token: &str, expected_use: TokenUse) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Expired,
                _ => AppError::Malformed,
            }
        })?;

        let claims = data.claims;
        if Utc::now().timestamp() >= claims.exp {
            return Err(AppError::Expired);
        }
        if claims.token_use != expected_use {
            return Err(AppError::Malformed);
        }

        Ok(claims)
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
}
