//! API server configuration.

use std::str::FromStr;

use tracing::warn;
use vantage_core::auth::jwt::resolve_secret;

/// Deployment environment. Controls cookie `Secure` and error detail exposure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }

    /// Resolve `APP_ENV`. Unset means development; an unrecognised value is
    /// treated as production.
    pub fn from_env_value(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
            return AppEnv::Development;
        };
        raw.parse().unwrap_or_else(|e| {
            warn!("{e}, falling back to production");
            AppEnv::Production
        })
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(format!("unknown APP_ENV: {other}")),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Deployment environment.
    pub env: AppEnv,
    /// Origin allowed to make credentialed cross-origin calls (the SPA).
    pub cors_origin: String,
    /// Access token signing secret.
    pub access_secret: String,
    /// Refresh token signing secret. Must differ from `access_secret`.
    pub refresh_secret: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable             | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `BIND_ADDR`          | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`       | `postgres://localhost:5432/vantage`      |
    /// | `APP_ENV`            | `development`                            |
    /// | `CORS_ORIGIN`        | `http://localhost:5173`                  |
    /// | `JWT_ACCESS_SECRET` / `JWT_SECRET`      | generated & persisted |
    /// | `JWT_REFRESH_SECRET` / `REFRESH_SECRET` | generated & persisted |
    pub fn from_env() -> Self {
        let env = AppEnv::from_env_value(std::env::var("APP_ENV").ok().as_deref());
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/vantage".into()),
            env,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            access_secret: resolve_secret("JWT_ACCESS_SECRET", "JWT_SECRET", "jwt-access-secret"),
            refresh_secret: resolve_secret(
                "JWT_REFRESH_SECRET",
                "REFRESH_SECRET",
                "jwt-refresh-secret",
            ),
        }
    }

    /// Configuration for tests and local demos with fixed secrets.
    pub fn for_testing() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            env: AppEnv::Development,
            cors_origin: "http://localhost:5173".into(),
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("env", &self.env)
            .field("cors_origin", &self.cors_origin)
            .finish_non_exhaustive()
    }
}
