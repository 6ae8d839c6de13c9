//! Link and history interception.
//!
//! The interceptor turns raw browser events into navigator calls:
//!
//! - **click**: plain primary-button activations of routable anchors are
//!   taken over; everything else is left to the browser;
//! - **hover/focus**: routable targets not yet cached are prefetched, one
//!   at a time, with failures swallowed;
//! - **popstate**: entries written by the router are replayed without
//!   pushing; foreign entries are left to the browser.

use crate::error::NavigationResult;
use crate::navigator::{NavigateOptions, Navigator};
use crate::platform::HistoryEntry;
use crate::target::{NavigationTarget, TargetClassifier, TargetKind};
use crate::{debug_log, trace_log, warn_log};
use futures::future::{ready, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use std::cell::Cell;
use std::rc::Rc;
use url::Url;

/// A navigation the caller should drive to completion.
pub type NavigationFuture = LocalBoxFuture<'static, NavigationResult>;

/// The parts of a click event the router looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    /// Raw `href` attribute of the anchor.
    pub href: String,
    /// Mouse button; `0` is the primary button.
    pub button: i16,
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    /// Another handler already called `preventDefault`.
    pub default_prevented: bool,
    /// The anchor's `target` attribute.
    pub target: Option<String>,
    /// The anchor carries a `download` attribute.
    pub download: bool,
}

impl ClickEvent {
    /// Unmodified primary click on an anchor pointing at `href`.
    pub fn primary(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            button: 0,
            ctrl_key: false,
            meta_key: false,
            shift_key: false,
            alt_key: false,
            default_prevented: false,
            target: None,
            download: false,
        }
    }

    /// Whether this is a plain activation the router may take over.
    pub fn is_plain_activation(&self) -> bool {
        let same_frame = self
            .target
            .as_deref()
            .map_or(true, |target| target.is_empty() || target.eq_ignore_ascii_case("_self"));
        self.button == 0
            && !(self.ctrl_key || self.meta_key || self.shift_key || self.alt_key)
            && !self.default_prevented
            && !self.download
            && same_frame
    }
}

/// What to do with an intercepted event.
pub enum InterceptDecision {
    /// Let the browser handle it.
    Ignore,
    /// Prevent the default action; the router handles it.
    Handled(NavigationFuture),
}

impl InterceptDecision {
    pub fn is_handled(&self) -> bool {
        matches!(self, InterceptDecision::Handled(_))
    }
}

impl std::fmt::Debug for InterceptDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptDecision::Ignore => f.write_str("Ignore"),
            InterceptDecision::Handled(_) => f.write_str("Handled"),
        }
    }
}

/// Dispatches browser events to a [`Navigator`].
pub struct Interceptor {
    navigator: Rc<Navigator>,
    classifier: TargetClassifier,
    prefetching: Rc<Cell<bool>>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("classifier", &self.classifier)
            .field("prefetching", &self.prefetching.get())
            .finish()
    }
}

impl Interceptor {
    pub fn new(navigator: Rc<Navigator>, classifier: TargetClassifier) -> Self {
        Self {
            navigator,
            classifier,
            prefetching: Rc::new(Cell::new(false)),
        }
    }

    pub fn classifier(&self) -> &TargetClassifier {
        &self.classifier
    }

    /// Whether a prefetch is in flight.
    pub fn is_prefetching(&self) -> bool {
        self.prefetching.get()
    }

    /// Resolve `href` against the current document URL and classify it.
    pub fn target(&self, href: &str) -> Option<NavigationTarget> {
        let current = self.navigator.platform().history.current_url();
        self.classifier.target(href, &current)
    }

    /// Decide what to do with a click.
    pub fn on_click(&self, event: &ClickEvent) -> InterceptDecision {
        if !event.is_plain_activation() {
            trace_log!("Ignoring modified or non-primary click on '{}'", event.href);
            return InterceptDecision::Ignore;
        }
        let Some(target) = self.target(&event.href) else {
            return InterceptDecision::Ignore;
        };
        if !target.is_routable() {
            trace_log!("Leaving {:?} target '{}' to the browser", target.kind, target.url);
            return InterceptDecision::Ignore;
        }
        InterceptDecision::Handled(self.dispatch(target.url, NavigateOptions::new_entry()))
    }

    /// Start a navigation to an already resolved URL.
    ///
    /// The current URL scrolls in place; non-routable targets get a full
    /// browser load.
    pub fn dispatch(&self, url: Url, options: NavigateOptions) -> NavigationFuture {
        let navigator = Rc::clone(&self.navigator);
        let current = navigator.platform().history.current_url();
        if options.is_new_entry && url == current {
            return ready(navigator.stay(&url)).boxed_local();
        }
        match self.classifier.classify(&url, &current) {
            TargetKind::Routable => {}
            TargetKind::SamePageHash if !options.is_new_entry => {}
            TargetKind::SamePageHash => return ready(navigator.stay(&url)).boxed_local(),
            kind => {
                debug_log!("'{}' is {:?}, not routing it", url, kind);
                let id = navigator.state().start(&url);
                return ready(navigator.full_reload(id, &url, None)).boxed_local();
            }
        }
        async move { navigator.navigate(&url, options).await }.boxed_local()
    }

    /// Prefetch the target of a hovered or focused anchor.
    ///
    /// Returns `true` when a prefetch was started.
    pub fn on_hover(&self, href: &str) -> bool {
        if self.prefetching.get() || self.navigator.state().is_navigating() {
            return false;
        }
        let Some(target) = self.target(href) else {
            return false;
        };
        let key = target.cache_key();
        if !target.is_routable()
            || self.navigator.cache().contains(&key)
            || self.navigator.unroutable().contains(&key)
        {
            return false;
        }

        debug_log!("Prefetching '{}'", key);
        let pending = self
            .navigator
            .cache()
            .insert_pending(key, self.navigator.fetch_route(&target.url));
        let flag = Rc::clone(&self.prefetching);
        flag.set(true);
        let task = async move {
            if let Err(err) = pending.await {
                trace_log!("Prefetch failed: {}", err);
            }
            flag.set(false);
        };
        if let Err(err) = self.navigator.platform().spawner.spawn_local(task) {
            warn_log!("Could not spawn prefetch: {}", err);
            self.prefetching.set(false);
            return false;
        }
        true
    }

    /// Handle a popstate event carrying `state`.
    pub fn on_popstate(&self, state: Option<HistoryEntry>) -> InterceptDecision {
        let Some(entry) = state else {
            trace_log!("History entry without router state, leaving it to the browser");
            return InterceptDecision::Ignore;
        };
        let current = self.navigator.platform().history.current_url();
        let Ok(url) = current.join(&entry.route_url) else {
            warn_log!("History entry has an invalid URL '{}'", entry.route_url);
            return InterceptDecision::Ignore;
        };
        InterceptDecision::Handled(
            self.dispatch(url, NavigateOptions::replay(entry.scroll_position)),
        )
    }
}
