//! Short-lived cache for rendered listing responses.
//!
//! Writes to the entity store never touch this cache. An entry disappears only
//! when its TTL runs out, when [`ListingCache::clear`] is called, or when the
//! memory backend evicts it to stay within capacity. Cached listings may lag
//! behind the store for up to one TTL.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use lru::LruCache;
use redis::{AsyncCommands, Client};
use tracing::warn;

const REDIS_KEY_PREFIX: &str = "listing:";

pub const DEFAULT_LISTING_CACHE_CAPACITY: usize = 200;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl CacheBackendKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(anyhow!("unknown cache backend: {}", other)),
        }
    }
}

struct CachedEntry {
    body: Bytes,
    expires_at: Instant,
}

type MemoryEntries = Arc<Mutex<LruCache<String, CachedEntry>>>;

#[derive(Clone)]
enum Backend {
    Memory(MemoryEntries),
    Redis(RedisCache),
}

#[derive(Clone)]
pub struct ListingCache {
    backend: Backend,
}

impl ListingCache {
    /// Least recently used entries are evicted once `capacity` is reached.
    pub fn in_memory(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(LruCache::new(capacity)))),
        }
    }

    pub async fn redis(redis_url: &str) -> Result<Self> {
        let cache = RedisCache::connect(redis_url).await?;
        Ok(Self {
            backend: Backend::Redis(cache),
        })
    }

    pub async fn connect(kind: CacheBackendKind, redis_url: &str, capacity: usize) -> Result<Self> {
        match kind {
            CacheBackendKind::Memory => Ok(Self::in_memory(capacity)),
            CacheBackendKind::Redis => Self::redis(redis_url).await,
        }
    }

    pub fn kind(&self) -> CacheBackendKind {
        match self.backend {
            Backend::Memory(_) => CacheBackendKind::Memory,
            Backend::Redis(_) => CacheBackendKind::Redis,
        }
    }

    /// Backend errors are logged and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        match &self.backend {
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
                let fresh = entries
                    .get(key)
                    .map(|entry| entry.expires_at > Instant::now())?;
                if !fresh {
                    entries.pop(key);
                    return None;
                }
                entries.get(key).map(|entry| entry.body.clone())
            }
            Backend::Redis(cache) => {
                let mut conn = match cache.client().get_multiplexed_async_connection().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = ?err, "failed to connect to listing cache");
                        return None;
                    }
                };
                match conn
                    .get::<_, Option<Vec<u8>>>(redis_key(key))
                    .await
                {
                    Ok(payload) => payload.map(Bytes::from),
                    Err(err) => {
                        warn!(error = ?err, key, "failed to read listing cache");
                        None
                    }
                }
            }
        }
    }

    /// Backend errors are logged and otherwise ignored.
    pub async fn set(&self, key: &str, body: Bytes, ttl: Duration) {
        match &self.backend {
            Backend::Memory(entries) => {
                let entry = CachedEntry {
                    body,
                    expires_at: Instant::now() + ttl,
                };
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .put(key.to_string(), entry);
            }
            Backend::Redis(cache) => {
                // Redis expiry has whole-second granularity and rejects 0.
                let seconds = ttl.as_secs().max(1);
                let result = match cache.client().get_multiplexed_async_connection().await {
                    Ok(mut conn) => {
                        conn.set_ex::<_, _, ()>(redis_key(key), body.as_ref(), seconds)
                            .await
                    }
                    Err(err) => Err(err),
                };
                if let Err(err) = result {
                    warn!(error = ?err, key, "failed to write listing cache");
                }
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        match &self.backend {
            Backend::Memory(entries) => {
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
            }
            Backend::Redis(cache) => {
                let mut conn = cache.client().get_multiplexed_async_connection().await?;
                let pattern = format!("{}*", REDIS_KEY_PREFIX);
                let keys: Vec<String> = {
                    let mut iter = conn.scan_match::<_, String>(pattern).await?;
                    let mut keys = Vec::new();
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                    keys
                };
                if !keys.is_empty() {
                    conn.del::<_, ()>(keys).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        match &self.backend {
            Backend::Memory(_) => Ok(()),
            Backend::Redis(cache) => cache.ping().await,
        }
    }
}

fn redis_key(key: &str) -> String {
    format!("{}{}", REDIS_KEY_PREFIX, key)
}
