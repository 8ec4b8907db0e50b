//! In-memory cache of parsed GET responses.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Parsed response bodies keyed by method, path and query string.
///
/// Entries live until [`ResponseCache::clear`]; there is no TTL and no
/// eviction. The lock is only held for the duration of a single map
/// operation, never across an await point.
#[derive(Debug, Default)]
pub(crate) struct ResponseCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl ResponseCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `value`, replacing any earlier entry (last write wins).
    pub(crate) fn insert(&self, key: String, value: serde_json::Value) {
        self.entries.lock().insert(key, value);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}
