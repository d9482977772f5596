//! Expiring caches for provider responses
//!
//! The cache manager is created once by the entry point and handed to the
//! components that need it. Entries are stored as JSON so cached and fresh
//! responses deserialize through the same path.

use crate::config::AgentConfig;
use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const PREFIX_STOCK_DATA: &str = "stock_data";
pub const PREFIX_STATEMENT: &str = "income_statement";
pub const PREFIX_COMPANY_INFO: &str = "company_info";
pub const PREFIX_SECTOR: &str = "sector_data";
pub const PREFIX_DOCUMENT: &str = "pdf_text";

/// Cache key built from a prefix and a short hash of the identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Kind of data, e.g. `stock_data`
    pub prefix: String,
    /// First 8 hex chars of the SHA-256 of the identifier
    pub id_hash: String,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>, identifier: &str) -> Self {
        let digest = Sha256::digest(identifier.as_bytes());
        let mut id_hash = hex::encode(digest);
        id_hash.truncate(8);
        Self {
            prefix: prefix.into(),
            id_hash,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix, self.id_hash)
    }
}

/// Thread-safe cache with a fixed time-to-live
pub struct ExpiringCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl ExpiringCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a live value; expired entries are evicted on access
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetcher` and cache its result.
    ///
    /// Errors from the fetcher are passed through and never cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: CacheKey,
        fetcher: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key = %key, "Cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Number of stored entries, including ones not yet evicted
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for ExpiringCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Entry counts per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub quotes: usize,
    pub company: usize,
    pub sector: usize,
    pub documents: usize,
    pub total_items: usize,
}

/// One cache per kind of data, each with its own TTL
#[derive(Clone)]
pub struct CacheManager {
    /// Price snapshots and quarterly statements
    pub quotes: ExpiringCache,
    pub company: ExpiringCache,
    /// Peer quotes and sector lookups
    pub sector: ExpiringCache,
    /// Extracted document text and metrics
    pub documents: ExpiringCache,
}

impl CacheManager {
    pub fn new(
        quotes_ttl: Duration,
        company_ttl: Duration,
        sector_ttl: Duration,
        documents_ttl: Duration,
    ) -> Self {
        Self {
            quotes: ExpiringCache::new(quotes_ttl),
            company: ExpiringCache::new(company_ttl),
            sector: ExpiringCache::new(sector_ttl),
            documents: ExpiringCache::new(documents_ttl),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.cache_ttl_quotes,
            config.cache_ttl_company,
            config.cache_ttl_sector,
            config.cache_ttl_documents,
        )
    }

    pub async fn stats(&self) -> CacheStats {
        let quotes = self.quotes.len().await;
        let company = self.company.len().await;
        let sector = self.sector.len().await;
        let documents = self.documents.len().await;
        CacheStats {
            quotes,
            company,
            sector,
            documents,
            total_items: quotes + company + sector + documents,
        }
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.quotes.clear().await;
        self.company.clear().await;
        self.sector.clear().await;
        self.documents.clear().await;
    }
}
