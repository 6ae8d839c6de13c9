//! Persistent registry of URLs the router must not handle.
//!
//! When a fetch proves that a URL cannot be served as fragments (the
//! response is not HTML, or the server answered with the unroutable
//! sentinel) its cache key is recorded here. Later navigations to it go
//! straight to a full browser navigation without a fetch.
//!
//! The registry is persisted through [`Storage`] as a JSON array of cache
//! keys under [`RouterConfig::storage_key`](crate::config::RouterConfig),
//! so it outlives the page session. Only the navigator writes to it.

use crate::platform::Storage;
use crate::{debug_log, warn_log};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Set of cache keys known to be unroutable.
pub struct UnroutableRegistry {
    storage: Rc<dyn Storage>,
    key: String,
    entries: RefCell<BTreeSet<String>>,
}

impl std::fmt::Debug for UnroutableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnroutableRegistry")
            .field("key", &self.key)
            .field("entries", &*self.entries.borrow())
            .finish()
    }
}

impl UnroutableRegistry {
    /// Load the registry stored under `key`.
    pub fn load(storage: Rc<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let entries = read(storage.as_ref(), &key);
        debug_log!("Loaded {} unroutable entries from '{}'", entries.len(), key);
        Self {
            storage,
            key,
            entries: RefCell::new(entries),
        }
    }

    pub fn contains(&self, cache_key: &str) -> bool {
        self.entries.borrow().contains(cache_key)
    }

    /// Record `cache_key` and persist.
    ///
    /// Entries written by other tabs since load are merged in first.
    pub fn add(&self, cache_key: &str) {
        let mut entries = self.entries.borrow_mut();
        entries.extend(read(self.storage.as_ref(), &self.key));
        if entries.insert(cache_key.to_string()) {
            warn_log!("Marking '{}' as unroutable", cache_key);
        }
        self.persist(&entries);
    }

    /// Forget every entry, in memory and in storage.
    pub fn clear(&self) {
        let mut entries = self.entries.borrow_mut();
        entries.clear();
        self.persist(&entries);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn persist(&self, entries: &BTreeSet<String>) {
        match serde_json::to_string(entries) {
            Ok(json) => self.storage.set_item(&self.key, &json),
            Err(err) => {
                warn_log!("Could not serialize unroutable registry: {}", err);
            }
        }
    }
}

fn read(storage: &dyn Storage, key: &str) -> BTreeSet<String> {
    let Some(raw) = storage.get_item(key) else {
        return BTreeSet::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn_log!("Ignoring malformed unroutable registry '{}': {}", key, err);
        BTreeSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    const KEY: &str = "fragment_navigator.unroutable";

    #[test]
    fn test_add_persists_json_array() {
        let storage = Rc::new(MemoryStorage::new());
        let registry = UnroutableRegistry::load(storage.clone(), KEY);
        assert!(registry.is_empty());

        registry.add("/report");
        registry.add("/report");
        assert!(registry.contains("/report"));
        assert_eq!(registry.len(), 1);
        assert_eq!(storage.get_item(KEY).as_deref(), Some(r#"["/report"]"#));
    }

    #[test]
    fn test_survives_reload() {
        let storage = Rc::new(MemoryStorage::new());
        UnroutableRegistry::load(storage.clone(), KEY).add("/a");
        let reloaded = UnroutableRegistry::load(storage, KEY);
        assert!(reloaded.contains("/a"));
    }

    #[test]
    fn test_add_merges_entries_from_storage() {
        let storage = Rc::new(MemoryStorage::new());
        let registry = UnroutableRegistry::load(storage.clone(), KEY);
        storage.set_item(KEY, r#"["/other-tab"]"#);
        registry.add("/mine");
        assert!(registry.contains("/other-tab"));
        assert_eq!(
            storage.get_item(KEY).as_deref(),
            Some(r#"["/mine","/other-tab"]"#)
        );
    }

    #[test]
    fn test_malformed_storage_is_ignored() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set_item(KEY, "{not json");
        let registry = UnroutableRegistry::load(storage, KEY);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear() {
        let storage = Rc::new(MemoryStorage::new());
        let registry = UnroutableRegistry::load(storage.clone(), KEY);
        registry.add("/a");
        registry.clear();
        assert!(!registry.contains("/a"));
        assert_eq!(storage.get_item(KEY).as_deref(), Some("[]"));
    }
}
