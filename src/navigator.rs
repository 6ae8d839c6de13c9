//! The navigation state machine.
//!
//! One call to [`Navigator::navigate`] runs a navigation through
//! `Idle → Fetching → LoadingAssets → Entering → Idle`:
//!
//! 1. take the intent token, superseding any navigation in flight;
//! 2. for a new history entry, save the current scroll position into the
//!    entry being left;
//! 3. URLs in the unroutable registry go straight to a full browser load;
//! 4. detach page behaviors;
//! 5. get the route from the cache or fetch it (failures degrade to a full
//!    browser load, unroutable ones are recorded first);
//! 6. load assets while the exit transition plays (asset failures are
//!    reported, not fatal);
//! 7. **cancellation check**: a superseded navigation stops here untouched
//!    (it is also checked once the route resolves, before any asset work);
//! 8. pick the scroll target (URL hash wins on fresh navigations);
//! 9. swap changed regions, set the title, attach behaviors once;
//! 10. scroll and focus;
//! 11. push a history entry for fresh navigations;
//! 12. clear the token, emit `routed`, start the enter transition.

use crate::active_link::PathSettings;
use crate::cache::RouteCache;
use crate::config::RouterConfig;
use crate::error::{NavigationResult, RouteError};
use crate::events::RouterEvents;
use crate::lifecycle::PageBehaviors;
use crate::platform::{HistoryEntry, Platform, ScrollTarget};
use crate::route::{AssetRegistry, Route, RouteParser};
use crate::state::{NavigationPhase, NavigationState};
use crate::target::cache_key;
use crate::transition::PageTransition;
use crate::unroutable::UnroutableRegistry;
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use futures::future::{join, FutureExt, LocalBoxFuture};
use std::rc::Rc;
use url::Url;

/// Options for a single navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigateOptions {
    /// `true` for link clicks and programmatic navigation (a history entry
    /// is pushed), `false` when replaying an existing entry.
    pub is_new_entry: bool,
    /// Where to scroll when the URL has no usable hash.
    pub scroll: ScrollTarget,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            is_new_entry: true,
            scroll: ScrollTarget::default(),
        }
    }
}

impl NavigateOptions {
    /// A fresh navigation that pushes a history entry.
    pub fn new_entry() -> Self {
        Self::default()
    }

    /// Replay of a history entry, restoring `scroll_position`.
    pub fn replay(scroll_position: f64) -> Self {
        Self {
            is_new_entry: false,
            scroll: ScrollTarget::Position(scroll_position),
        }
    }
}

/// Runs navigations against a [`Platform`].
///
/// Holds every collaborator explicitly; the router creates one per page
/// session and shares it with the interceptor.
pub struct Navigator {
    platform: Platform,
    config: Rc<RouterConfig>,
    parser: RouteParser,
    cache: Rc<RouteCache>,
    unroutable: Rc<UnroutableRegistry>,
    assets: Rc<AssetRegistry>,
    state: Rc<NavigationState>,
    events: Rc<RouterEvents>,
    behaviors: Rc<dyn PageBehaviors>,
    transition: Rc<dyn PageTransition>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &self.state)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Collaborators a [`Navigator`] is built from.
pub struct NavigatorParts {
    pub platform: Platform,
    pub config: Rc<RouterConfig>,
    pub cache: Rc<RouteCache>,
    pub unroutable: Rc<UnroutableRegistry>,
    pub assets: Rc<AssetRegistry>,
    pub state: Rc<NavigationState>,
    pub events: Rc<RouterEvents>,
    pub behaviors: Rc<dyn PageBehaviors>,
    pub transition: Rc<dyn PageTransition>,
}

impl Navigator {
    pub fn new(parts: NavigatorParts) -> Self {
        Self {
            parser: RouteParser::new(Rc::clone(&parts.config)),
            platform: parts.platform,
            config: parts.config,
            cache: parts.cache,
            unroutable: parts.unroutable,
            assets: parts.assets,
            state: parts.state,
            events: parts.events,
            behaviors: parts.behaviors,
            transition: parts.transition,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn parser(&self) -> &RouteParser {
        &self.parser
    }

    pub fn cache(&self) -> &Rc<RouteCache> {
        &self.cache
    }

    pub fn unroutable(&self) -> &UnroutableRegistry {
        &self.unroutable
    }

    /// Scripts already inserted into the document.
    pub fn assets(&self) -> &Rc<AssetRegistry> {
        &self.assets
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Build the fetch for `url`. The future owns everything it needs so
    /// the cache can share it.
    pub fn fetch_route(&self, url: &Url) -> LocalBoxFuture<'static, Result<Route, RouteError>> {
        let url = url.clone();
        let fetcher = Rc::clone(&self.platform.fetcher);
        let parser = self.parser.clone();
        let fallback = self.platform.document.settings();
        async move { Route::fetch(&url, fetcher.as_ref(), &parser, &fallback).await }.boxed_local()
    }

    /// Navigate to `url`.
    pub async fn navigate(&self, url: &Url, options: NavigateOptions) -> NavigationResult {
        let document = self.platform.document.as_ref();
        let history = self.platform.history.as_ref();
        let key = cache_key(url);

        let id = self.state.start(url);
        info_log!("Navigation #{} to '{}' started", id, url);

        if options.is_new_entry {
            history.replace(HistoryEntry {
                route_url: history.current_url().to_string(),
                title: document.title(),
                scroll_position: document.scroll_y(),
            });
        }

        if self.unroutable.contains(&key) {
            warn_log!("'{}' is known to be unroutable, loading it directly", key);
            return self.full_reload(id, url, None);
        }

        let regions = document.region_keys();
        self.behaviors.detach(&regions, &document.settings());

        let route = match self
            .cache
            .get_or_fetch(&key, || self.fetch_route(url))
            .await
        {
            Ok(route) => route,
            Err(err) => {
                if !self.state.is_current(id) {
                    debug_log!("Navigation #{} to '{}' superseded while fetching: {}", id, url, err);
                    return NavigationResult::Cancelled {
                        url: url.to_string(),
                    };
                }
                if err.is_unroutable() {
                    self.unroutable.add(&key);
                }
                return self.full_reload(id, url, Some(err));
            }
        };

        // A superseded route must not merge settings or append assets.
        if !self.state.is_current(id) {
            debug_log!("Navigation #{} to '{}' superseded before loading assets", id, url);
            return NavigationResult::Cancelled {
                url: url.to_string(),
            };
        }

        self.state.set_phase(id, NavigationPhase::LoadingAssets);
        let (assets, ()) = join(
            route.load_assets(&self.platform.document, &self.assets),
            self.transition.exit(),
        )
        .await;
        if let Err(err) = assets {
            error_log!("Continuing navigation to '{}' without all assets: {}", url, err);
            self.events.emit_error(&err);
        }

        if !self.state.is_current(id) {
            debug_log!("Navigation #{} to '{}' superseded, dropping it", id, url);
            return NavigationResult::Cancelled {
                url: url.to_string(),
            };
        }
        self.state.set_phase(id, NavigationPhase::Entering);

        let scroll = match url.fragment().filter(|hash| !hash.is_empty()) {
            Some(hash) if options.is_new_entry => ScrollTarget::Element(hash.to_string()),
            _ => options.scroll,
        };

        self.enter(&route);
        self.scroll(&scroll);

        if options.is_new_entry {
            history.push(
                url,
                HistoryEntry {
                    route_url: url.to_string(),
                    title: route.title().to_string(),
                    scroll_position: 0.0,
                },
            );
        }

        self.state.finish(id);
        info_log!("Navigation #{} to '{}' completed", id, url);
        self.events
            .emit_routed(&PathSettings::from_settings(&document.settings()));
        self.transition.enter();

        NavigationResult::Completed {
            url: url.to_string(),
        }
    }

    /// Scroll within the current page without navigating.
    pub fn stay(&self, url: &Url) -> NavigationResult {
        let scroll = url
            .fragment()
            .filter(|hash| !hash.is_empty())
            .map(|hash| ScrollTarget::Element(hash.to_string()))
            .unwrap_or_default();
        self.scroll(&scroll);
        NavigationResult::InPage {
            url: url.to_string(),
        }
    }

    /// Hand `url` to the browser.
    pub fn full_reload(&self, id: u64, url: &Url, reason: Option<RouteError>) -> NavigationResult {
        match &reason {
            Some(err) => {
                warn_log!("Falling back to a full page load of '{}': {}", url, err);
            }
            None => {
                info_log!("Full page load of '{}'", url);
            }
        }
        self.state.finish(id);
        self.platform.history.assign(url);
        NavigationResult::FullReload {
            url: url.to_string(),
            reason,
        }
    }

    fn enter(&self, route: &Route) {
        let document = self.platform.document.as_ref();

        // The live settings must describe the page being shown, even if an
        // older route's assets merged their settings after this one's.
        document.merge_settings(route.settings());

        let regions = document.region_keys();
        for region in &regions {
            let Some(markup) = route.region(region) else {
                trace_log!("Route '{}' has no markup for region '{}'", route.key(), region);
                continue;
            };
            if document.region_html(region).as_deref() == Some(markup) {
                trace_log!("Region '{}' unchanged", region);
                continue;
            }
            trace_log!("Replacing region '{}'", region);
            document.replace_region(region, markup);
        }

        if !route.title().is_empty() {
            document.set_title(route.title());
        }

        self.behaviors.attach(&regions, &document.settings());
    }

    fn scroll(&self, target: &ScrollTarget) {
        let document = self.platform.document.as_ref();
        let main = self.config.main_content_id.as_str();
        match target {
            ScrollTarget::Element(id) if document.scroll_into_view(id) => {
                document.focus(id);
            }
            ScrollTarget::Element(id) => {
                debug_log!("No element '#{}' to scroll to", id);
                document.scroll_to_y(0.0);
                document.focus(main);
            }
            ScrollTarget::Position(y) => {
                document.scroll_to_y(*y);
                document.focus(main);
            }
        }
    }
}
