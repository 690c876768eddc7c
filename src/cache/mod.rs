//! Content-addressed result cache
//!
//! Deduplicates diarization work across identical uploads within a TTL
//! window. Entries are keyed by a fingerprint of the raw input bytes: the
//! first 16 hex characters of their SHA-256. Eviction is by insertion age
//! (oldest first), not LRU; the cache is tuned for "retry within minutes"
//! rather than a hot set. Negative results are never cached.

use crate::diarize::types::DiarizationResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Number of hex characters of the SHA-256 digest used as the cache key.
/// Collisions within the TTL window are accepted as negligible.
const FINGERPRINT_LEN: usize = 16;

/// Cache configuration
///
/// Captured when the global cache is first constructed; later changes have
/// no effect on the running instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_size: usize,

    /// Entry lifetime from insertion
    pub ttl: Duration,

    /// Interval between background sweeps
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(600),
        }
    }
}

struct CacheEntry {
    data: DiarizationResult,
    inserted_at: Instant,
}

/// Size- and age-bounded result cache keyed by input fingerprint
pub struct ResultCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

/// Compute the cache fingerprint for a byte buffer.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = format!("{:x}", digest);
    hex[..FINGERPRINT_LEN].to_string()
}

impl ResultCache {
    /// Create a cache and start its background sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: CacheConfig) -> Arc<Self> {
        let cache = Arc::new(Self {
            config: config.clone(),
            entries: Mutex::new(HashMap::new()),
        });

        let sweeper = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                sweeper.sweep_expired();
            }
        });

        info!(
            max_size = config.max_size,
            ttl_s = config.ttl.as_secs(),
            "Result cache started"
        );

        cache
    }

    /// Look up the result for a byte buffer.
    ///
    /// Returns the stored value iff a non-expired entry exists; an expired
    /// entry encountered here is deleted in passing. Reads never refresh
    /// `inserted_at`.
    pub fn get(&self, bytes: &[u8]) -> Option<DiarizationResult> {
        let key = fingerprint(bytes);
        let mut entries = self.entries.lock().unwrap();

        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.config.ttl => {
                debug!(fingerprint = %key, "Cache hit");
                Some(entry.data.clone())
            }
            Some(_) => {
                debug!(fingerprint = %key, "Cache entry expired, removing");
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite the result for a byte buffer.
    ///
    /// At capacity the entry with the smallest `inserted_at` is evicted
    /// before insertion.
    pub fn set(&self, bytes: &[u8], data: DiarizationResult) {
        let key = fingerprint(bytes);
        let mut entries = self.entries.lock().unwrap();

        if !entries.contains_key(&key) && entries.len() >= self.config.max_size {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone())
            {
                debug!(fingerprint = %oldest, "Evicting oldest cache entry");
                entries.remove(&oldest);
            }
        }

        debug!(fingerprint = %key, "Cache store");
        entries.insert(
            key,
            CacheEntry {
                data,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries currently stored (expired entries not yet pruned
    /// are counted).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry older than the TTL.
    fn sweep_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.config.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Cache sweep");
        }
    }
}

static CACHE: OnceLock<Arc<ResultCache>> = OnceLock::new();

/// Process-wide result cache accessor.
///
/// The default configuration is applied on first call; subsequent calls
/// return the same instance regardless of configuration changes.
pub fn result_cache() -> &'static Arc<ResultCache> {
    CACHE.get_or_init(|| ResultCache::start(CacheConfig::default()))
}
