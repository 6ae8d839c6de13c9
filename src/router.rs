//! The router: composition root and public entry point.
//!
//! [`Router`] wires a [`Platform`] to the navigator, the interceptor and
//! the shared registries, captures the current page as the first cached
//! route, and keeps the document's active links in sync after every
//! navigation.
//!
//! # Example
//!
//! ```
//! use fragment_navigator::memory::MemoryPlatform;
//! use fragment_navigator::{ClickEvent, Router};
//! use futures::executor::LocalPool;
//! use std::rc::Rc;
//! use url::Url;
//!
//! let page = r#"<html><head><title>Home</title></head><body>
//!   <main data-router-region="main"><p>Home</p></main></body></html>"#;
//! let memory = MemoryPlatform::new(Url::parse("https://example.com/").unwrap(), page);
//! memory.fetcher.respond_html(
//!     "/about",
//!     r#"<html><head><title>About</title></head><body>
//!       <main data-router-region="main"><p>About</p></main></body></html>"#,
//! );
//!
//! let pool = LocalPool::new();
//! let router = Router::builder(memory.platform(Rc::new(pool.spawner())))
//!     .build()
//!     .unwrap();
//! router.init();
//!
//! let decision = router.click(&ClickEvent::primary("/about"));
//! assert!(decision.is_handled());
//! ```

use crate::active_link::ActiveLinkWriter;
use crate::cache::{CacheStats, RouteCache};
use crate::config::RouterConfig;
use crate::dom;
use crate::error::{ConfigError, NavigationResult};
use crate::events::{RouterEvents, Subscription};
use crate::interceptor::{ClickEvent, InterceptDecision, Interceptor, NavigationFuture};
use crate::lifecycle::{NoBehaviors, PageBehaviors};
use crate::navigator::{NavigateOptions, Navigator, NavigatorParts};
use crate::platform::{HistoryEntry, Platform};
use crate::route::AssetRegistry;
use crate::state::{NavigationPhase, NavigationState};
use crate::target::{cache_key, NavigationTarget, TargetClassifier};
use crate::transition::{NoTransition, PageTransition};
use crate::unroutable::UnroutableRegistry;
use crate::{debug_log, info_log, warn_log};
use futures::future::{ready, FutureExt};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Builder for [`Router`].
pub struct RouterBuilder {
    platform: Platform,
    config: Option<RouterConfig>,
    behaviors: Rc<dyn PageBehaviors>,
    transition: Rc<dyn PageTransition>,
}

impl RouterBuilder {
    /// Use `config` instead of reading it from the live settings.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Hooks around content replacement.
    pub fn behaviors(mut self, behaviors: impl PageBehaviors + 'static) -> Self {
        self.behaviors = Rc::new(behaviors);
        self
    }

    /// Exit/enter transition.
    pub fn transition(mut self, transition: impl PageTransition + 'static) -> Self {
        self.transition = Rc::new(transition);
        self
    }

    /// Build the router. Without an explicit config the `router` key of the
    /// live settings is used, falling back to defaults.
    pub fn build(self) -> Result<Router, ConfigError> {
        let config = match self.config {
            Some(config) => config,
            None => RouterConfig::from_settings(&self.platform.document.settings())?,
        };
        let config = Rc::new(config);
        let classifier = TargetClassifier::new(&config)?;

        let events = RouterEvents::new();
        let unroutable = Rc::new(UnroutableRegistry::load(
            Rc::clone(&self.platform.storage),
            config.storage_key.clone(),
        ));
        let navigator = Rc::new(Navigator::new(NavigatorParts {
            platform: self.platform.clone(),
            config: Rc::clone(&config),
            cache: Rc::new(RouteCache::new()),
            unroutable,
            assets: Rc::new(AssetRegistry::new()),
            state: Rc::new(NavigationState::new()),
            events: Rc::clone(&events),
            behaviors: self.behaviors,
            transition: self.transition,
        }));
        let interceptor = Interceptor::new(Rc::clone(&navigator), classifier);

        Ok(Router {
            inner: Rc::new(RouterInner {
                platform: self.platform,
                config,
                events,
                navigator,
                interceptor,
                subscriptions: RefCell::new(Vec::new()),
                initialized: Cell::new(false),
            }),
        })
    }
}

struct RouterInner {
    platform: Platform,
    config: Rc<RouterConfig>,
    events: Rc<RouterEvents>,
    navigator: Rc<Navigator>,
    interceptor: Interceptor,
    subscriptions: RefCell<Vec<Subscription>>,
    initialized: Cell<bool>,
}

/// Client-side fragment router for one document.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("platform", &self.inner.platform)
            .field("navigator", &self.inner.navigator)
            .field("initialized", &self.inner.initialized.get())
            .finish()
    }
}

impl Router {
    pub fn builder(platform: Platform) -> RouterBuilder {
        RouterBuilder {
            platform,
            config: None,
            behaviors: Rc::new(NoBehaviors),
            transition: Rc::new(NoTransition),
        }
    }

    /// Capture the current page and start keeping active links in sync.
    ///
    /// Calling it again is a no-op.
    pub fn init(&self) {
        let inner = &self.inner;
        if inner.initialized.replace(true) {
            warn_log!("Router already initialized");
            return;
        }
        let document = &inner.platform.document;
        let navigator = &inner.navigator;

        navigator.assets().seed(document.script_sources());

        let url = inner.platform.history.current_url();
        let key = cache_key(&url);
        let snapshot = dom::parse_document(&document.snapshot());
        if navigator.parser().has_deferred_placeholders(&snapshot) {
            debug_log!("'{}' is still streaming deferred content, not caching it", key);
        } else {
            match navigator
                .parser()
                .parse(key.clone(), snapshot, &document.settings(), true)
            {
                Ok(route) => navigator.cache().insert(key.as_str(), Rc::new(route)),
                Err(reason) => {
                    warn_log!("Could not capture '{}' as a route: {}", key, reason);
                }
            }
        }

        let writer = ActiveLinkWriter::new(&inner.config);
        let live = Rc::clone(document);
        let subscription = inner.events.on_routed(move |path| {
            live.for_each_link(&mut |link| {
                writer.apply(link, path);
            });
        });
        inner.subscriptions.borrow_mut().push(subscription);

        info_log!("Router initialized on '{}'", url);
    }

    /// Tear down subscriptions and drop in-memory state. The unroutable
    /// registry is persisted and survives.
    pub fn dispose(&self) {
        let inner = &self.inner;
        for subscription in inner.subscriptions.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
        inner.navigator.cache().clear();
        inner.navigator.assets().clear();
        inner.navigator.state().reset();
        inner.initialized.set(false);
        info_log!("Router disposed");
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Event hub for `routed` and error subscriptions.
    pub fn events(&self) -> &Rc<RouterEvents> {
        &self.inner.events
    }

    pub fn navigator(&self) -> &Rc<Navigator> {
        &self.inner.navigator
    }

    /// Phase of the navigation in flight.
    pub fn phase(&self) -> NavigationPhase {
        self.inner.navigator.state().phase()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.navigator.cache().stats()
    }

    /// Whether a route for `href` is cached or being fetched.
    pub fn is_cached(&self, href: &str) -> bool {
        self.classify(href)
            .is_some_and(|target| self.inner.navigator.cache().contains(&target.cache_key()))
    }

    /// Resolve and classify `href` against the current URL.
    pub fn classify(&self, href: &str) -> Option<NavigationTarget> {
        self.inner.interceptor.target(href)
    }

    /// Navigate to `href` and push a history entry.
    pub fn navigate(&self, href: &str) -> NavigationFuture {
        self.navigate_with(href, NavigateOptions::new_entry())
    }

    /// Navigate to `href` with explicit options.
    pub fn navigate_with(&self, href: &str, options: NavigateOptions) -> NavigationFuture {
        let current = self.inner.platform.history.current_url();
        match current.join(href) {
            Ok(url) => self.inner.interceptor.dispatch(url, options),
            Err(err) => {
                warn_log!("Cannot navigate to '{}': {}", href, err);
                let url = current.to_string();
                ready(NavigationResult::Cancelled { url }).boxed_local()
            }
        }
    }

    /// Decide about a click without running the navigation.
    pub fn click(&self, event: &ClickEvent) -> InterceptDecision {
        self.inner.interceptor.on_click(event)
    }

    /// Handle a click, spawning the navigation. Returns `true` when the
    /// browser's default action must be prevented.
    pub fn handle_click(&self, event: &ClickEvent) -> bool {
        self.spawn(self.click(event))
    }

    /// Prefetch on hover or focus. Returns `true` when a prefetch started.
    pub fn handle_hover(&self, href: &str) -> bool {
        self.inner.interceptor.on_hover(href)
    }

    /// Decide about a popstate event without running the navigation.
    pub fn popstate(&self, state: Option<HistoryEntry>) -> InterceptDecision {
        self.inner.interceptor.on_popstate(state)
    }

    /// Handle a popstate event, spawning the replay. Returns `true` when the
    /// router took over.
    pub fn handle_popstate(&self, state: Option<HistoryEntry>) -> bool {
        self.spawn(self.popstate(state))
    }

    /// Drop the cached route for `href`.
    pub fn forget(&self, href: &str) -> bool {
        self.classify(href)
            .is_some_and(|target| self.inner.navigator.cache().remove(&target.cache_key()))
    }

    /// Drop every cached route.
    pub fn clear_cache(&self) {
        self.inner.navigator.cache().clear();
    }

    fn spawn(&self, decision: InterceptDecision) -> bool {
        let InterceptDecision::Handled(navigation) = decision else {
            return false;
        };
        let task = async move {
            let result = navigation.await;
            debug_log!("Navigation finished: {:?}", result);
        };
        if let Err(err) = self.inner.platform.spawner.spawn_local(task) {
            warn_log!("Could not spawn navigation, leaving the click to the browser: {}", err);
            return false;
        }
        true
    }
}
