//! Two-tier timetable cache.
//!
//! Memory first, then disk, then upstream. The in-memory map is guarded by a
//! single read/write lock that is never held across a fetch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Timetable, TimetableKey};
use crate::services::{TimetableFetcher, TimetableParser};
use crate::storage::TimetableStorage;

/// Where a looked-up timetable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Memory,
    Disk,
    Upstream,
}

/// Result of [`TimetableStore::get`].
#[derive(Debug, Clone)]
pub struct Lookup {
    pub timetable: Arc<Timetable>,
    pub source: Source,
}

impl Lookup {
    /// Served from a stored snapshot rather than a fresh fetch.
    pub fn from_cache(&self) -> bool {
        self.source != Source::Upstream
    }
}

/// Timetable cache in front of persistent storage and the upstream site.
pub struct TimetableStore {
    cache: RwLock<HashMap<TimetableKey, Arc<Timetable>>>,
    storage: Arc<dyn TimetableStorage>,
    fetcher: Arc<dyn TimetableFetcher>,
    parser: TimetableParser,
}

impl TimetableStore {
    pub fn new(
        storage: Arc<dyn TimetableStorage>,
        fetcher: Arc<dyn TimetableFetcher>,
    ) -> Result<Self> {
        Ok(Self {
            cache: RwLock::new(HashMap::new()),
            storage,
            fetcher,
            parser: TimetableParser::new()?,
        })
    }

    /// Look up a timetable.
    ///
    /// Without `force`, the memory entry wins, then the persisted file; only
    /// when both are missing is upstream fetched. With `force`, upstream is
    /// always fetched and both tiers are replaced.
    pub async fn get(&self, key: TimetableKey, force: bool) -> Result<Lookup> {
        if !force {
            let cached = self.cache.read().await.get(&key).cloned();
            if let Some(timetable) = cached {
                return Ok(Lookup {
                    timetable,
                    source: Source::Memory,
                });
            }

            if let Some(timetable) = self.storage.load_timetable(key).await? {
                let timetable = Arc::new(timetable);
                self.cache.write().await.insert(key, Arc::clone(&timetable));
                log::debug!("Timetable {} loaded from disk", key);
                return Ok(Lookup {
                    timetable,
                    source: Source::Disk,
                });
            }

            log::debug!("Timetable {} not stored yet, fetching", key);
        }

        let timetable = self.fetch(key).await?;
        let timetable = self.put(timetable, key.period).await?;
        Ok(Lookup {
            timetable,
            source: Source::Upstream,
        })
    }

    /// Persist a timetable and make it the cached value for its key.
    pub async fn put(&self, timetable: Timetable, period: u32) -> Result<Arc<Timetable>> {
        let key = TimetableKey::new(timetable.group_id, period);
        self.storage.save_timetable(key, &timetable).await?;

        let timetable = Arc::new(timetable);
        self.cache.write().await.insert(key, Arc::clone(&timetable));
        Ok(timetable)
    }

    /// Drop the in-memory entry; the persisted file is kept.
    pub async fn invalidate(&self, key: TimetableKey) -> bool {
        self.cache.write().await.remove(&key).is_some()
    }

    /// Keys currently held in memory, sorted.
    pub async fn cached_keys(&self) -> Vec<TimetableKey> {
        let mut keys: Vec<_> = self.cache.read().await.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Fetch and parse without touching any lock.
    async fn fetch(&self, key: TimetableKey) -> Result<Timetable> {
        let body = self.fetcher.fetch_raw(key).await?;
        let parsed = self.parser.parse(&body, key.group)?;

        if let Some(errors) = &parsed.row_errors {
            log::warn!(
                "Timetable {}: skipped {} malformed rows: {}",
                key,
                errors.0.len(),
                errors
            );
        }
        log::debug!(
            "Timetable {} fetched: {} classes",
            key,
            parsed.timetable.len()
        );
        Ok(parsed.timetable)
    }
}
