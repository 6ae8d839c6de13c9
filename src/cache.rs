//! Route cache with read-through coalescing.
//!
//! This module provides [`RouteCache`], the page-session map from cache key
//! (path plus query, see [`cache_key`](crate::target::cache_key)) to a
//! [`Route`]. An entry is either a ready route or a pending fetch:
//!
//! - While a fetch is pending, every other request for the same key awaits
//!   the *same* shared future, so a key never has two fetches in flight.
//! - When the fetch settles the entry converges on its own: success replaces
//!   the pending entry with the route, failure removes it so the next
//!   request retries immediately. Errors are never cached.
//! - Entries are never evicted.
//!
//! [`CacheStats`] tracks hits, misses, coalesced waits and failed fetches.
//!
//! # Examples
//!
//! ```
//! use fragment_navigator::cache::RouteCache;
//! use std::rc::Rc;
//!
//! let cache = Rc::new(RouteCache::new());
//! assert!(cache.get("/news").is_none());
//! assert_eq!(cache.stats().misses, 1);
//! ```

use crate::error::RouteError;
use crate::route::Route;
use crate::{debug_log, trace_log};
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

/// A fetch that every interested party can await.
pub type SharedRoute = Shared<LocalBoxFuture<'static, Result<Rc<Route>, RouteError>>>;

enum CacheEntry {
    Ready(Rc<Route>),
    Pending { generation: u64, fetch: SharedRoute },
}

/// Result of a cache lookup.
#[derive(Clone)]
pub enum CacheLookup {
    /// The route is available.
    Ready(Rc<Route>),
    /// A fetch is in flight; await it to get the route.
    Pending(SharedRoute),
}

impl std::fmt::Debug for CacheLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheLookup::Ready(route) => f.debug_tuple("Ready").field(&route.key()).finish(),
            CacheLookup::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by a ready route.
    pub hits: usize,
    /// Lookups that found nothing.
    pub misses: usize,
    /// Lookups that joined a fetch already in flight.
    pub coalesced: usize,
    /// Fetches that failed and were dropped from the cache.
    pub failures: usize,
}

impl CacheStats {
    /// Return the hit rate (ready hits plus coalesced waits) as a value in `0.0..=1.0`.
    ///
    /// Returns `0.0` if no lookups have been performed.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

/// In-memory route cache for one page session.
///
/// Always used behind an `Rc`: pending entries hold a weak reference back
/// to the cache so they can settle themselves.
#[derive(Default)]
pub struct RouteCache {
    entries: RefCell<HashMap<String, CacheEntry>>,
    stats: RefCell<CacheStats>,
    generation: Cell<u64>,
}

impl std::fmt::Debug for RouteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteCache")
            .field("len", &self.len())
            .field("stats", &*self.stats.borrow())
            .finish()
    }
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`. Updates hit/miss stats.
    pub fn get(&self, key: &str) -> Option<CacheLookup> {
        let entries = self.entries.borrow();
        let mut stats = self.stats.borrow_mut();
        match entries.get(key) {
            Some(CacheEntry::Ready(route)) => {
                stats.hits += 1;
                trace_log!("Route cache hit for '{}'", key);
                Some(CacheLookup::Ready(Rc::clone(route)))
            }
            Some(CacheEntry::Pending { fetch, .. }) => {
                stats.coalesced += 1;
                trace_log!("Joining in-flight fetch for '{}'", key);
                Some(CacheLookup::Pending(fetch.clone()))
            }
            None => {
                stats.misses += 1;
                trace_log!("Route cache miss for '{}'", key);
                None
            }
        }
    }

    /// Whether `key` has an entry, ready or pending. Does not touch stats.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Store a ready route.
    pub fn insert(&self, key: impl Into<String>, route: Rc<Route>) {
        self.entries
            .borrow_mut()
            .insert(key.into(), CacheEntry::Ready(route));
    }

    /// Store a pending fetch and return the shared handle to await.
    ///
    /// The entry settles itself when the fetch completes, whoever drives it.
    pub fn insert_pending<F>(self: &Rc<Self>, key: impl Into<String>, fetch: F) -> SharedRoute
    where
        F: Future<Output = Result<Route, RouteError>> + 'static,
    {
        let key = key.into();
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let cache = Rc::downgrade(self);
        let settle_key = key.clone();
        let shared = async move {
            let result = fetch.await.map(Rc::new);
            if let Some(cache) = cache.upgrade() {
                cache.settle(&settle_key, generation, &result);
            }
            result
        }
        .boxed_local()
        .shared();

        self.entries.borrow_mut().insert(
            key,
            CacheEntry::Pending {
                generation,
                fetch: shared.clone(),
            },
        );
        shared
    }

    /// Return the cached route for `key`, joining an in-flight fetch or
    /// starting one with `fetch` on a miss.
    pub async fn get_or_fetch<F, Fut>(self: &Rc<Self>, key: &str, fetch: F) -> Result<Rc<Route>, RouteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Route, RouteError>> + 'static,
    {
        let pending = match self.get(key) {
            Some(CacheLookup::Ready(route)) => return Ok(route),
            Some(CacheLookup::Pending(pending)) => pending,
            None => self.insert_pending(key, fetch()),
        };
        pending.await
    }

    fn settle(&self, key: &str, generation: u64, result: &Result<Rc<Route>, RouteError>) {
        let mut entries = self.entries.borrow_mut();
        let is_ours = matches!(
            entries.get(key),
            Some(CacheEntry::Pending { generation: g, .. }) if *g == generation
        );
        if !is_ours {
            return;
        }
        match result {
            Ok(route) => {
                entries.insert(key.to_string(), CacheEntry::Ready(Rc::clone(route)));
            }
            Err(err) => {
                entries.remove(key);
                self.stats.borrow_mut().failures += 1;
                debug_log!("Dropping failed fetch for '{}': {}", key, err);
            }
        }
    }

    /// Remove one entry.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key).is_some()
    }

    /// Remove every entry. Pending fetches still resolve for their awaiters
    /// but no longer settle into the cache.
    pub fn clear(&self) {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let len = entries.len();
            entries.clear();
            len
        };
        debug_log!("Route cache cleared: {} entries removed", removed);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.borrow().clone()
    }

    /// Reset all counters to zero.
    pub fn reset_stats(&self) {
        *self.stats.borrow_mut() = CacheStats::default();
    }
}
