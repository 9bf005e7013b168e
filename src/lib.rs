pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::time::Duration;

use anyhow::Result;

use crate::app::pagination::Paginator;
use crate::config::AppConfig;
use crate::infra::{cache::ListingCache, db::Db};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: ListingCache,
    pub paginator: Paginator,
    pub index_cache_ttl: Duration,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, cache: ListingCache) -> Result<Self> {
        Ok(Self {
            db,
            cache,
            paginator: Paginator::new(config.posts_per_page)?,
            index_cache_ttl: Duration::from_secs(config.index_cache_ttl_seconds),
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            access_ttl_minutes: config.access_ttl_minutes,
        })
    }
}
