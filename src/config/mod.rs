use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub outbox_poll_interval_ms: u64,
    pub outbox_batch_size: i64,
    pub outbox_max_attempts: i32,
    pub resolver_timeout_ms: u64,
    pub dispatch_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            paseto_refresh_key: env_key_32("PASETO_REFRESH_KEY")?,
            access_ttl_minutes: env_or_parse("ACCESS_TTL_MINUTES", "15")?,
            refresh_ttl_days: env_or_parse("REFRESH_TTL_DAYS", "30")?,
            outbox_poll_interval_ms: env_or_parse("OUTBOX_POLL_INTERVAL_MS", "200")?,
            outbox_batch_size: env_or_parse("OUTBOX_BATCH_SIZE", "50")?,
            outbox_max_attempts: env_or_parse("OUTBOX_MAX_ATTEMPTS", "10")?,
            resolver_timeout_ms: env_or_parse("RESOLVER_TIMEOUT_MS", "2000")?,
            dispatch_timeout_ms: env_or_parse("DISPATCH_TIMEOUT_MS", "1000")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
