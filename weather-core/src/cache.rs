//! In-memory cache with per-entry expiry.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};

struct StoredEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Keyed cache whose entries expire after a time-to-live.
///
/// Values are cloned out on read, so cache `Arc`s for anything large.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, StoredEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.read().len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the value if it exists and has not expired.
    /// Expired entries are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => {
                    tracing::debug!(key, "cache miss");
                    return None;
                }
                Some(entry) if now < entry.expires_at => {
                    tracing::debug!(key, "cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        tracing::debug!(key, "cache entry expired");
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| now >= e.expires_at) {
            entries.remove(key);
        }
        None
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries
            .write()
            .insert(key.to_owned(), StoredEntry { value, expires_at });
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.write().remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
