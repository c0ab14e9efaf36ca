use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;
use url::Url;

use fedbox_vocab::{iri, Item};

use crate::config::CacheConfig;
use crate::key::CacheKey;

/// Fingerprint-to-document memo behind a single reader/writer lock.
///
/// Operations never fail: a poisoned lock is recovered.
#[derive(Debug)]
pub struct Cache {
    enabled: bool,
    entries: RwLock<HashMap<CacheKey, Item>>,
}

impl Cache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A pass-through cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(&CacheConfig { enabled: false })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &CacheKey) -> Option<Item> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Store or overwrite the entry for `key`.
    pub fn set(&self, key: CacheKey, item: Item) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, item);
    }

    /// Drop every entry whose resource is one of `iris` or lies below one of
    /// them. Returns true if anything was dropped.
    pub fn remove(&self, iris: &[&str]) -> bool {
        if !self.enabled {
            return false;
        }
        let targets: Vec<Url> = iris.iter().filter_map(|raw| iri::parse(raw)).collect();
        if targets.is_empty() {
            return false;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !targets.iter().any(|t| key.covers(t)));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "cache entries invalidated");
        }
        removed > 0
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
