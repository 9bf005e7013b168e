use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::app::auth::MAX_ACCESS_TTL_MINUTES;
use crate::app::pagination::DEFAULT_POSTS_PER_PAGE;
use crate::infra::cache::{CacheBackendKind, DEFAULT_LISTING_CACHE_CAPACITY};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub cache_backend: CacheBackendKind,
    pub redis_url: String,
    pub listing_cache_capacity: usize,
    pub posts_per_page: usize,
    pub index_cache_ttl_seconds: u64,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub admin_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let http_addr = env.or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let cache_backend = CacheBackendKind::parse(&env.or("CACHE_BACKEND", "memory"))
            .map_err(|err| anyhow!("invalid CACHE_BACKEND: {}", err))?;

        let posts_per_page: usize =
            env.or_parse("POSTS_PER_PAGE", &DEFAULT_POSTS_PER_PAGE.to_string())?;
        if posts_per_page == 0 {
            return Err(anyhow!("invalid POSTS_PER_PAGE: must be greater than 0"));
        }

        let listing_cache_capacity: usize = env.or_parse(
            "LISTING_CACHE_CAPACITY",
            &DEFAULT_LISTING_CACHE_CAPACITY.to_string(),
        )?;
        if listing_cache_capacity == 0 {
            return Err(anyhow!("invalid LISTING_CACHE_CAPACITY: must be greater than 0"));
        }

        let access_ttl_minutes: u64 = env.or_parse("ACCESS_TTL_MINUTES", "720")?;
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&access_ttl_minutes) {
            return Err(anyhow!(
                "invalid ACCESS_TTL_MINUTES: must be between 1 and {}",
                MAX_ACCESS_TTL_MINUTES
            ));
        }

        Ok(Self {
            http_addr,
            database_url: env.required("DATABASE_URL")?,
            db_max_connections: env.or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env.or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env.or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env.or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            cache_backend,
            redis_url: env.or("REDIS_URL", "redis://127.0.0.1/"),
            listing_cache_capacity,
            posts_per_page,
            index_cache_ttl_seconds: env.or_parse("INDEX_CACHE_TTL_SECONDS", "20")?,
            paseto_access_key: env.key_32("PASETO_ACCESS_KEY")?,
            access_ttl_minutes,
            admin_token: env.get("ADMIN_TOKEN").filter(|token| !token.is_empty()),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow!("missing required env var: {}", key))
    }

    fn or_parse<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.or(key, default)
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {}: {}", key, err))
    }

    fn key_32(&self, key: &str) -> Result<[u8; 32]> {
        let value = self.required(key)?;
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
}
