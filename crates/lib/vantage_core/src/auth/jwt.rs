//! JWT token issuance, verification and rotation.
//!
//! Access and refresh tokens are signed with separate HS256 secrets and carry
//! a `typ` discriminator. Nothing about either token is persisted server-side:
//! validity is signature + expiry only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::CredentialStore;
use super::{AuthError, TokenError};
use crate::models::auth::{TokenClaims, TokenKind, TokenPair};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_SECS: i64 = 7 * 24 * 60 * 60;

/// Secrets and lifetimes for the token service.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Config with the default lifetimes (15 min / 7 days).
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_EXPIRY_SECS),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Issues and verifies access/refresh token pairs.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    /// Build a token service. The two secrets must be non-empty and distinct.
    pub fn new(config: TokenConfig) -> Result<Self, AuthError> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if config.access_secret == config.refresh_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: SigningKeys::from_secret(config.access_secret.as_bytes()),
            refresh: SigningKeys::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            validation,
        })
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    /// Issue a new access/refresh pair for `subject`.
    pub fn issue_pair(&self, subject: Uuid) -> Result<TokenPair, AuthError> {
        self.issue_pair_at(subject, Utc::now())
    }

    /// Issue a pair as if it were `now`.
    pub fn issue_pair_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<TokenPair, AuthError> {
        let access_token = self.sign(subject, TokenKind::Access, now)?;
        let refresh_token = self.sign(subject, TokenKind::Refresh, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_in: self.access_ttl_secs(),
            refresh_expires_in: self.refresh_ttl_secs(),
        })
    }

    /// Verify an access token, returning its subject.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, AuthError> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token, returning its subject.
    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, AuthError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Exchange a refresh token for a brand-new pair.
    ///
    /// The presented token is not revoked; there is no store to revoke it in.
    /// The caller is expected to overwrite it with the rotated one.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        store: &dyn CredentialStore,
    ) -> Result<TokenPair, AuthError> {
        let subject = self.verify_refresh(refresh_token)?;
        let user = store
            .find_by_id(subject)
            .await?
            .ok_or(AuthError::SubjectNotFound)?;
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        self.issue_pair(subject)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn sign(&self, subject: Uuid, kind: TokenKind, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl(kind)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Uuid, AuthError> {
        let result = self.decode_claims(token, expected);
        if let Err(kind) = &result {
            debug!(expected = ?expected, reason = %kind, "token rejected");
        }
        result.map_err(AuthError::from)
    }

    fn decode_claims(&self, token: &str, expected: TokenKind) -> Result<Uuid, TokenError> {
        let data = decode::<TokenClaims>(token, &self.keys(expected).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?;
        if data.claims.typ != expected {
            return Err(TokenError::WrongKind);
        }
        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Resolve a signing secret: env var `primary` → `fallback` → persisted file.
///
/// When neither variable is set, a 64-character secret is generated and
/// persisted under the platform data dir so restarts keep issued tokens valid.
pub fn resolve_secret(primary: &str, fallback: &str, file_name: &str) -> String {
    for var in [primary, fallback] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    resolve_secret_file(&secret_dir().join(file_name))
}

/// Read the secret at `path`, generating and persisting one if absent.
pub fn resolve_secret_file(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    info!(path = %path.display(), "generated new signing secret");
    secret
}

fn secret_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vantage")
}
