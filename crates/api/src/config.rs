//! Startup configuration, read once from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use shopkeep_auth::{CategoryWritePolicy, UnknownCategoryWritePolicy};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_JWT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BIND_ADDR '{0}' is not a socket address")]
    BindAddr(String),

    #[error("JWT_TTL_SECS '{0}' must be a positive number of seconds")]
    JwtTtl(String),

    #[error("CATEGORY_WRITES: {0}")]
    CategoryWrites(#[from] UnknownCategoryWritePolicy),

    #[error("ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together")]
    PartialAdminSeed,
}

/// Account created at startup when none with that username exists.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub category_writes: CategoryWritePolicy,
    pub admin: Option<AdminSeed>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("category_writes", &self.category_writes)
            .field("admin", &self.admin)
            .finish()
    }
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            jwt_ttl: Duration::seconds(DEFAULT_JWT_TTL_SECS),
            category_writes: CategoryWritePolicy::default(),
            admin: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::BindAddr(bind_raw.clone()))?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let jwt_ttl = match var("JWT_TTL_SECS") {
            None => Duration::seconds(DEFAULT_JWT_TTL_SECS),
            Some(raw) => match raw.parse::<i64>() {
                Ok(secs) if secs > 0 => Duration::seconds(secs),
                _ => return Err(ConfigError::JwtTtl(raw)),
            },
        };

        let category_writes = match var("CATEGORY_WRITES") {
            Some(raw) => raw.parse()?,
            None => CategoryWritePolicy::default(),
        };

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(email), Some(password)) => Some(AdminSeed {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::PartialAdminSeed),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_ttl,
            category_writes,
            admin,
        })
    }
}
