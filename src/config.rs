use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub password_reset_ttl_minutes: i64,
    pub require_email_verification: bool,
    /// Base URL the mailer uses for verification and reset links.
    pub app_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "keystone".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "keystone-clients".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 120)?,
        };
        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            jwt,
            password_reset_ttl_minutes: env_or("PASSWORD_RESET_TTL_MINUTES", 60)?,
            require_email_verification: env_or("REQUIRE_EMAIL_VERIFICATION", true)?,
            app_url: std::env::var("APP_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        })
    }
}

/// Reads `key`, falling back to `default` when unset. A value that is set
/// but does not parse is an error rather than a silent default.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}
