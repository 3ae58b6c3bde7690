use anyhow::{ensure, Context};
use serde::Deserialize;

/// Upper bounds for lifetimes read from the environment.
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 30;
pub const MAX_RESET_TTL_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_hours: i64,
    /// Apply the registration password rules when a reset token is redeemed.
    pub enforce_password_rules: bool,
    /// Return the reset link in the forgot-password response (no mail delivery).
    pub expose_links: bool,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub reset: ResetConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://storefront.db?mode=rwc".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "storefront".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "storefront-users".into()),
            ttl_minutes: env_ttl("SESSION_TTL_MINUTES", 60, MAX_SESSION_TTL_MINUTES)?,
        };
        let reset = ResetConfig {
            ttl_hours: env_ttl("RESET_TOKEN_TTL_HOURS", 24, MAX_RESET_TTL_HOURS)?,
            enforce_password_rules: env_parse("RESET_ENFORCE_PASSWORD_RULES").unwrap_or(true),
            expose_links: env_parse("EXPOSE_RESET_LINKS").unwrap_or(false),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:10000".into()),
        };
        Ok(Self {
            database_url,
            session,
            reset,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_ttl(key: &str, default: i64, max: i64) -> anyhow::Result<i64> {
    parse_ttl(key, std::env::var(key).ok().as_deref(), default, max)
}

/// Lifetimes must be positive and bounded; unset falls back to `default`.
fn parse_ttl(key: &str, raw: Option<&str>, default: i64, max: i64) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number, got {raw:?}"))?;
    ensure!(
        (1..=max).contains(&value),
        "{key} must be between 1 and {max}, got {value}"
    );
    Ok(value)
}
