//! Shared manufacturer rate cache
//!
//! Records are cached per make for one hour. Reads go through an `RwLock`
//! snapshot; refreshes are serialized behind a single fetch gate, so callers
//! that arrive while a fetch is in flight wait for it and reuse its result.
//! A feed error or timeout never reaches the caller: stale records are served
//! when present, else the built-in sample offers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::records::{sample_records, ManufacturerRateRecord};

const CACHE_TTL_SECS: u64 = 3600;
const FETCH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Feed timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of already-normalized manufacturer records.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch(&self, make: &str) -> Result<Vec<ManufacturerRateRecord>, FeedError>;
}

fn for_make(records: impl IntoIterator<Item = ManufacturerRateRecord>, make: &str) -> Vec<ManufacturerRateRecord> {
    records
        .into_iter()
        .filter(|r| r.make.eq_ignore_ascii_case(make))
        .collect()
}

/// In-memory feed over a fixed record list.
#[derive(Debug, Clone, Default)]
pub struct StaticRateFeed {
    records: Vec<ManufacturerRateRecord>,
}

impl StaticRateFeed {
    pub fn new(records: Vec<ManufacturerRateRecord>) -> Self {
        Self { records }
    }

    pub fn sample() -> Self {
        Self::new(sample_records())
    }
}

#[async_trait]
impl RateFeed for StaticRateFeed {
    async fn fetch(&self, make: &str) -> Result<Vec<ManufacturerRateRecord>, FeedError> {
        Ok(for_make(self.records.iter().cloned(), make))
    }
}

/// Feed backed by a JSON array of records on disk. Re-read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileRateFeed {
    path: PathBuf,
}

impl JsonFileRateFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RateFeed for JsonFileRateFeed {
    async fn fetch(&self, make: &str) -> Result<Vec<ManufacturerRateRecord>, FeedError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<ManufacturerRateRecord> = serde_json::from_str(&raw)?;
        Ok(for_make(records, make))
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RateCacheConfig {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }
}

struct CacheEntry {
    records: Arc<Vec<ManufacturerRateRecord>>,
    fetched_at: Instant,
}

pub struct RateCache {
    feed: Arc<dyn RateFeed>,
    config: RateCacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    fetch_gate: Mutex<()>,
}

impl RateCache {
    pub fn new(feed: Arc<dyn RateFeed>) -> Self {
        Self::with_config(feed, RateCacheConfig::default())
    }

    pub fn with_config(feed: Arc<dyn RateFeed>, config: RateCacheConfig) -> Self {
        Self {
            feed,
            config,
            entries: RwLock::new(HashMap::new()),
            fetch_gate: Mutex::new(()),
        }
    }

    /// Current records for a make, refreshing through the feed when expired.
    pub async fn rates(&self, make: &str) -> Arc<Vec<ManufacturerRateRecord>> {
        let key = make.trim().to_lowercase();
        if let Some(records) = self.fresh(&key).await {
            return records;
        }

        let _gate = self.fetch_gate.lock().await;
        // another caller may have refreshed while we waited
        if let Some(records) = self.fresh(&key).await {
            return records;
        }

        let fetched = tokio::time::timeout(self.config.fetch_timeout, self.feed.fetch(make))
            .await
            .unwrap_or(Err(FeedError::Timeout(self.config.fetch_timeout)));

        let records = match fetched {
            Ok(records) => {
                tracing::debug!(make = %make, count = records.len(), "Manufacturer rates refreshed");
                Arc::new(records)
            }
            Err(e) => {
                let fallback = self.fallback(&key, make).await;
                tracing::warn!(
                    make = %make,
                    error = %e,
                    served = fallback.len(),
                    "Manufacturer rate fetch failed, serving fallback records"
                );
                fallback
            }
        };

        // failures are stamped too, so a dead feed is retried once per TTL
        self.entries.write().await.insert(
            key,
            CacheEntry {
                records: Arc::clone(&records),
                fetched_at: Instant::now(),
            },
        );
        records
    }

    /// Records for several makes, concatenated in the order given.
    pub async fn rates_for_makes<I, S>(&self, makes: I) -> Vec<ManufacturerRateRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all = Vec::new();
        for make in makes {
            all.extend(self.rates(make.as_ref()).await.iter().cloned());
        }
        all
    }

    /// Drop every cached entry; the next read refetches.
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }

    async fn fresh(&self, key: &str) -> Option<Arc<Vec<ManufacturerRateRecord>>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.fetched_at.elapsed() < self.config.ttl)
            .map(|e| Arc::clone(&e.records))
    }

    async fn fallback(&self, key: &str, make: &str) -> Arc<Vec<ManufacturerRateRecord>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(stale) => Arc::clone(&stale.records),
            None => Arc::new(for_make(sample_records(), make)),
        }
    }
}

impl std::fmt::Debug for RateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateCache").field("config", &self.config).finish_non_exhaustive()
    }
}
