//! Navigation state: the single current intent and its phase.
//!
//! Every navigation starts by taking a fresh id from [`NavigationState::start`],
//! which supersedes whatever navigation was in flight. After each suspension
//! point the navigator asks [`is_current`](NavigationState::is_current); a
//! navigation that is no longer current must not touch content or history.
//!
//! Navigations are totally ordered by start, not by completion.

use crate::debug_log;
use std::cell::{Cell, RefCell};
use url::Url;

/// Phase of the current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationPhase {
    #[default]
    Idle,
    /// Waiting for the route (fetch or cached).
    Fetching,
    /// Route available; assets loading and exit transition running.
    LoadingAssets,
    /// Past the cancellation check, replacing content.
    Entering,
}

/// The navigation currently allowed to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    pub id: u64,
    pub url: Url,
}

/// Intent token plus phase.
#[derive(Debug, Default)]
pub struct NavigationState {
    counter: Cell<u64>,
    intent: RefCell<Option<NavigationIntent>>,
    phase: Cell<NavigationPhase>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a navigation to `url` and return its id.
    ///
    /// Any earlier navigation is superseded from this point on.
    pub fn start(&self, url: &Url) -> u64 {
        let id = self.counter.get() + 1;
        self.counter.set(id);
        if let Some(previous) = self.intent.replace(Some(NavigationIntent {
            id,
            url: url.clone(),
        })) {
            debug_log!(
                "Navigation #{} to '{}' superseded by #{}",
                previous.id,
                previous.url,
                id
            );
        }
        self.phase.set(NavigationPhase::Fetching);
        id
    }

    /// Whether navigation `id` is still the current intent.
    pub fn is_current(&self, id: u64) -> bool {
        self.intent
            .borrow()
            .as_ref()
            .is_some_and(|intent| intent.id == id)
    }

    /// Target of the in-flight navigation.
    pub fn navigating_to(&self) -> Option<Url> {
        self.intent.borrow().as_ref().map(|intent| intent.url.clone())
    }

    pub fn is_navigating(&self) -> bool {
        self.intent.borrow().is_some()
    }

    /// Advance the phase, if `id` is still current.
    pub fn set_phase(&self, id: u64, phase: NavigationPhase) {
        if self.is_current(id) {
            debug_log!("Navigation #{}: {:?} -> {:?}", id, self.phase.get(), phase);
            self.phase.set(phase);
        }
    }

    pub fn phase(&self) -> NavigationPhase {
        self.phase.get()
    }

    /// Clear the intent, if `id` is still current.
    pub fn finish(&self, id: u64) {
        if self.is_current(id) {
            self.intent.replace(None);
            self.phase.set(NavigationPhase::Idle);
        }
    }

    /// Drop any intent unconditionally.
    pub fn reset(&self) {
        self.intent.replace(None);
        self.phase.set(NavigationPhase::Idle);
    }
}
