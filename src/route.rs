//! Routes: immutable snapshots of rendered pages.
//!
//! A [`Route`] is built once per successful fetch (or once at start-up from
//! the live document) and never changes afterwards, except for the
//! `assets_loaded` flag which flips to `true` after the first successful
//! [`load_assets`](Route::load_assets).
//!
//! Assembly ([`RouteParser::parse`]) works on the parsed document:
//!
//! 1. the embedded settings element is removed and decoded (falling back to
//!    the live settings when absent);
//! 2. every content region is collected, with active links already
//!    rewritten for the fetched page's path settings;
//! 3. `<head>` children and the assets container are split into script and
//!    other assets, `<title>` excluded.
//!
//! Script deduplication across routes goes through the shared
//! [`AssetRegistry`].

use crate::active_link::{ActiveLinkWriter, PathSettings};
use crate::config::RouterConfig;
use crate::dom::{self, Element, Node};
use crate::error::RouteError;
use crate::platform::{Document, FetchResponse, Fetcher};
use crate::{debug_log, error_log, trace_log};
use futures::future::{join_all, FutureExt, LocalBoxFuture, Shared};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use url::Url;

/// An asset managed by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetDescriptor {
    /// External script, identified by its source URL.
    Script { src: String },
    /// Any other element (stylesheets, inline styles, meta...), as markup.
    Other { markup: String },
}

/// Snapshot of a rendered page.
#[derive(Debug)]
pub struct Route {
    key: String,
    title: String,
    content: BTreeMap<String, String>,
    settings: Map<String, Value>,
    assets: Vec<AssetDescriptor>,
    assets_loaded: Cell<bool>,
}

impl Route {
    /// Fetch `url` and assemble a route from the response.
    ///
    /// `fallback_settings` is used when the response carries no settings
    /// element of its own.
    pub async fn fetch(
        url: &Url,
        fetcher: &dyn Fetcher,
        parser: &RouteParser,
        fallback_settings: &Map<String, Value>,
    ) -> Result<Route, RouteError> {
        debug_log!("Fetching route '{}'", url);
        let response = fetcher.fetch(url).await?;
        parser.parse_response(url, response, fallback_settings)
    }

    /// Cache key this route was built for.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Region markup keyed by region name.
    pub fn content(&self) -> &BTreeMap<String, String> {
        &self.content
    }

    /// Markup of a single region.
    pub fn region(&self, key: &str) -> Option<&str> {
        self.content.get(key).map(String::as_str)
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Path settings of the page this route was rendered for.
    pub fn path_settings(&self) -> PathSettings {
        PathSettings::from_settings(&self.settings)
    }

    pub fn assets(&self) -> &[AssetDescriptor] {
        &self.assets
    }

    /// Source URLs of the script assets, in order.
    pub fn scripts(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().filter_map(|asset| match asset {
            AssetDescriptor::Script { src } => Some(src.as_str()),
            AssetDescriptor::Other { .. } => None,
        })
    }

    pub fn assets_loaded(&self) -> bool {
        self.assets_loaded.get()
    }

    /// Install this route's assets into `document`, once.
    ///
    /// Merges the route settings into the live settings first, then appends
    /// every "other" asset not already present verbatim, then inserts all
    /// new scripts in parallel and waits for each to load. A script another
    /// route is still inserting is awaited, not inserted twice. A failing
    /// script rejects the whole call with [`RouteError::AssetLoad`] and
    /// leaves the route marked as not loaded, so a later visit retries.
    pub async fn load_assets(
        &self,
        document: &Rc<dyn Document>,
        registry: &Rc<AssetRegistry>,
    ) -> Result<(), RouteError> {
        if self.assets_loaded.get() {
            return Ok(());
        }

        document.merge_settings(&self.settings);

        for asset in &self.assets {
            if let AssetDescriptor::Other { markup } = asset {
                if document.contains_markup(markup) {
                    trace_log!("Asset already present: {}", markup);
                } else {
                    document.append_to_body(markup);
                }
            }
        }

        let pending: Vec<SharedScript> = self
            .scripts()
            .filter_map(|src| registry.load(src, document))
            .collect();

        let failure = join_all(pending)
            .await
            .into_iter()
            .find_map(Result::err);
        if let Some(err) = failure {
            error_log!("Asset loading for '{}' failed: {}", self.key, err);
            return Err(err);
        }

        self.assets_loaded.set(true);
        Ok(())
    }
}

/// A script insertion that every route listing the script can await.
pub type SharedScript = Shared<LocalBoxFuture<'static, Result<(), RouteError>>>;

enum ScriptEntry {
    Loaded,
    Loading { generation: u64, load: SharedScript },
}

/// Global record of script sources inserted into the document.
///
/// A source is either loaded or loading. While it loads, every route that
/// lists it awaits the same insertion; when the insertion settles the entry
/// becomes loaded, or is dropped on failure so the next visit retries.
/// Always used behind an `Rc`, like [`RouteCache`](crate::cache::RouteCache).
#[derive(Default)]
pub struct AssetRegistry {
    scripts: RefCell<HashMap<String, ScriptEntry>>,
    generation: Cell<u64>,
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scripts = self.scripts.borrow();
        let loading = scripts
            .values()
            .filter(|entry| matches!(entry, ScriptEntry::Loading { .. }))
            .count();
        f.debug_struct("AssetRegistry")
            .field("scripts", &scripts.len())
            .field("loading", &loading)
            .finish()
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record scripts that are already present (e.g. from the initial page).
    pub fn seed<I, S>(&self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.borrow_mut().extend(
            sources
                .into_iter()
                .map(|src| (src.into(), ScriptEntry::Loaded)),
        );
    }

    /// The insertion of `src` to await, starting it if nobody has.
    ///
    /// Returns `None` when the script is already loaded.
    pub fn load(self: &Rc<Self>, src: &str, document: &Rc<dyn Document>) -> Option<SharedScript> {
        match self.scripts.borrow().get(src) {
            Some(ScriptEntry::Loaded) => return None,
            Some(ScriptEntry::Loading { load, .. }) => {
                trace_log!("Joining in-flight load of script '{}'", src);
                return Some(load.clone());
            }
            None => {}
        }

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let registry = Rc::downgrade(self);
        let document = Rc::clone(document);
        let owned_src = src.to_string();
        let load = async move {
            let result = document.insert_script(&owned_src).await;
            if let Some(registry) = registry.upgrade() {
                registry.settle(&owned_src, generation, &result);
            }
            result
        }
        .boxed_local()
        .shared();

        self.scripts.borrow_mut().insert(
            src.to_string(),
            ScriptEntry::Loading {
                generation,
                load: load.clone(),
            },
        );
        Some(load)
    }

    fn settle(&self, src: &str, generation: u64, result: &Result<(), RouteError>) {
        let mut scripts = self.scripts.borrow_mut();
        let is_ours = matches!(
            scripts.get(src),
            Some(ScriptEntry::Loading { generation: g, .. }) if *g == generation
        );
        if !is_ours {
            return;
        }
        match result {
            Ok(()) => {
                scripts.insert(src.to_string(), ScriptEntry::Loaded);
            }
            Err(err) => {
                scripts.remove(src);
                debug_log!("Forgetting failed script '{}': {}", src, err);
            }
        }
    }

    /// Whether `src` finished loading.
    pub fn is_loaded(&self, src: &str) -> bool {
        matches!(self.scripts.borrow().get(src), Some(ScriptEntry::Loaded))
    }

    /// Whether `src` is being inserted right now.
    pub fn is_loading(&self, src: &str) -> bool {
        matches!(
            self.scripts.borrow().get(src),
            Some(ScriptEntry::Loading { .. })
        )
    }

    /// Forget every script. Insertions in flight still resolve for their
    /// awaiters but no longer settle here.
    pub fn clear(&self) {
        self.scripts.borrow_mut().clear();
    }
}

/// Assembles [`Route`]s from server responses and documents.
#[derive(Debug, Clone)]
pub struct RouteParser {
    config: Rc<RouterConfig>,
    writer: ActiveLinkWriter,
}

impl RouteParser {
    pub fn new(config: Rc<RouterConfig>) -> Self {
        let writer = ActiveLinkWriter::new(&config);
        Self { config, writer }
    }

    /// Validate a response and assemble the route it carries.
    pub fn parse_response(
        &self,
        url: &Url,
        response: FetchResponse,
        fallback_settings: &Map<String, Value>,
    ) -> Result<Route, RouteError> {
        let key = crate::target::cache_key(url);
        if !response.is_success() {
            return Err(RouteError::status(url.as_str(), response.status));
        }
        if response.body.trim() == self.config.unroutable_sentinel {
            return Err(RouteError::UnroutableMarker {
                url: url.to_string(),
            });
        }
        let content_type = response.content_type.unwrap_or_default();
        if !is_html(&content_type) {
            return Err(RouteError::NotHtml {
                url: url.to_string(),
                content_type,
            });
        }
        let document = dom::parse_document(&response.body);
        self.parse(key, document, fallback_settings, false)
            .map_err(|reason| RouteError::MalformedResponse {
                url: url.to_string(),
                reason,
            })
    }

    /// Whether a parsed document still contains deferred placeholders.
    pub fn has_deferred_placeholders(&self, document: &Element) -> bool {
        let attribute = self.config.deferred_placeholder_attribute.as_str();
        document.find(&|el| el.has_attr(attribute)).is_some()
    }

    /// Assemble a route from a parsed document.
    ///
    /// `assets_loaded` is `true` only for the document that is already live.
    /// The error string describes why the document is unusable.
    pub fn parse(
        &self,
        key: String,
        mut document: Element,
        fallback_settings: &Map<String, Value>,
        assets_loaded: bool,
    ) -> Result<Route, String> {
        let config = &self.config;

        let settings_attribute = config.settings_attribute.as_str();
        let settings = match document.remove_first(&|el| el.has_attr(settings_attribute)) {
            Some(element) => match serde_json::from_str::<Value>(&element.text_content()) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("settings element is not a JSON object".to_string()),
                Err(err) => return Err(format!("settings element is not valid JSON: {err}")),
            },
            None => fallback_settings.clone(),
        };
        let path = PathSettings::from_settings(&settings);

        let region_attribute = config.region_attribute.as_str();
        let region_keys: Vec<String> = document
            .find_all(&|el| el.has_attr(region_attribute))
            .into_iter()
            .filter_map(|el| el.attr(region_attribute).map(str::to_string))
            .collect();
        if region_keys.is_empty() {
            return Err(format!("no element carries '{region_attribute}'"));
        }

        let mut content = BTreeMap::new();
        for region_key in region_keys {
            let is_region = |el: &Element| el.attr(region_attribute) == Some(region_key.as_str());
            if let Some(region) = document.find_mut(&is_region) {
                self.writer.apply_to_tree(region, &path);
                content.insert(region_key.clone(), region.inner_html());
            }
        }

        let title = document
            .find(&|el| el.name == "title")
            .map(Element::text_content)
            .unwrap_or_default();

        let assets_attribute = config.assets_attribute.as_str();
        let mut assets = Vec::new();
        if let Some(head) = document.find(&|el| el.name == "head") {
            collect_assets(head, &mut assets);
        }
        if let Some(container) = document.find(&|el| el.has_attr(assets_attribute)) {
            collect_assets(container, &mut assets);
        }

        trace_log!(
            "Assembled route '{}': {} regions, {} assets",
            key,
            content.len(),
            assets.len()
        );

        Ok(Route {
            key,
            title: title.trim().to_string(),
            content,
            settings,
            assets,
            assets_loaded: Cell::new(assets_loaded),
        })
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn collect_assets(container: &Element, out: &mut Vec<AssetDescriptor>) {
    for child in &container.children {
        let Node::Element(el) = child else {
            continue;
        };
        if el.name == "title" {
            continue;
        }
        match (el.name.as_str(), el.attr("src")) {
            ("script", Some(src)) => out.push(AssetDescriptor::Script {
                src: src.to_string(),
            }),
            _ => out.push(AssetDescriptor::Other {
                markup: el.outer_html(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use futures::executor::block_on;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Hello page</title>
<link rel="stylesheet" href="/a.css">
<script src="/head.js"></script>
</head>
<body>
<nav data-router-region="menu"><a data-link-system-path="page" href="/page">Page</a></nav>
<main data-router-region="main"><p>Hello</p></main>
<div data-router-assets=""><script src="/s.js"></script><style>p{}</style></div>
<script type="application/json" data-router-settings="">{"path":{"currentPath":"page"},"x":1}</script>
</body>
</html>"#;

    fn parser() -> RouteParser {
        RouteParser::new(Rc::new(RouterConfig::default()))
    }

    fn url(path: &str) -> Url {
        Url::parse("https://example.com").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_assembles_regions_title_settings_and_assets() {
        let route = parser()
            .parse_response(&url("/page"), FetchResponse::html(PAGE), &Map::new())
            .unwrap();

        assert_eq!(route.key(), "/page");
        assert_eq!(route.title(), "Hello page");
        assert_eq!(route.region("main"), Some("<p>Hello</p>"));
        assert_eq!(route.settings()["x"], 1);
        assert_eq!(route.path_settings().current_path, "page");
        assert!(!route.assets_loaded());

        assert_eq!(route.scripts().collect::<Vec<_>>(), vec!["/head.js", "/s.js"]);
        assert!(route.assets().contains(&AssetDescriptor::Other {
            markup: r#"<link rel="stylesheet" href="/a.css">"#.to_string()
        }));
        assert!(route.assets().contains(&AssetDescriptor::Other {
            markup: "<style>p{}</style>".to_string()
        }));
        assert!(!route
            .assets()
            .iter()
            .any(|a| matches!(a, AssetDescriptor::Other { markup } if markup.contains("title"))));
    }

    #[test]
    fn test_region_links_marked_for_fetched_page() {
        let route = parser()
            .parse_response(&url("/page"), FetchResponse::html(PAGE), &Map::new())
            .unwrap();
        let menu = route.region("menu").unwrap();
        assert!(menu.contains(r#"class="is-active""#), "{menu}");
    }

    #[test]
    fn test_settings_fall_back_to_live_settings() {
        let html = r#"<html><body><div data-router-region="main">x</div></body></html>"#;
        let mut live = Map::new();
        live.insert("live".to_string(), Value::Bool(true));
        let route = parser()
            .parse_response(&url("/p"), FetchResponse::html(html), &live)
            .unwrap();
        assert_eq!(route.settings(), &live);
    }

    #[test]
    fn test_error_classification() {
        let p = parser();
        let fallback = Map::new();

        let err = p
            .parse_response(&url("/gone"), FetchResponse::new(404, "text/html", ""), &fallback)
            .unwrap_err();
        assert!(matches!(err, RouteError::Network { status: Some(404), .. }));

        let err = p
            .parse_response(&url("/doc"), FetchResponse::new(200, "application/pdf", "%PDF"), &fallback)
            .unwrap_err();
        assert!(matches!(err, RouteError::NotHtml { .. }));

        let sentinel = RouterConfig::default().unroutable_sentinel;
        let err = p
            .parse_response(&url("/x"), FetchResponse::html(format!("{sentinel}\n")), &fallback)
            .unwrap_err();
        assert!(matches!(err, RouteError::UnroutableMarker { .. }));

        let err = p
            .parse_response(&url("/empty"), FetchResponse::html("<p>no regions</p>"), &fallback)
            .unwrap_err();
        assert!(matches!(err, RouteError::MalformedResponse { .. }));
    }

    #[test]
    fn test_xhtml_content_type_is_html() {
        assert!(is_html("application/xhtml+xml"));
        assert!(is_html("Text/HTML; charset=utf-8"));
        assert!(!is_html("application/json"));
        assert!(!is_html(""));
    }

    #[test]
    fn test_deferred_placeholder_detection() {
        let p = parser();
        let streamed = dom::parse_document(
            r#"<body><span data-big-pipe-placeholder-id="abc"></span></body>"#,
        );
        assert!(p.has_deferred_placeholders(&streamed));
        assert!(!p.has_deferred_placeholders(&dom::parse_document("<body></body>")));
    }

    fn blank_document() -> (Rc<MemoryDocument>, Rc<dyn Document>) {
        let memory = Rc::new(MemoryDocument::new("<html><body></body></html>"));
        let document: Rc<dyn Document> = memory.clone();
        (memory, document)
    }

    #[test]
    fn test_asset_registry_skips_seeded_scripts() {
        let (memory, document) = blank_document();
        let registry = Rc::new(AssetRegistry::new());
        registry.seed(["/jquery.js"]);

        assert!(registry.load("/jquery.js", &document).is_none());
        let load = registry.load("/new.js", &document).unwrap();
        assert!(block_on(load).is_ok());
        assert!(registry.is_loaded("/new.js"));
        assert!(registry.load("/new.js", &document).is_none());
        assert_eq!(memory.inserted_scripts(), vec!["/new.js"]);
    }

    #[test]
    fn test_asset_registry_shares_an_insertion_in_flight() {
        let (memory, document) = blank_document();
        memory.hold_script("/shared.js");
        let registry = Rc::new(AssetRegistry::new());

        let first = registry.load("/shared.js", &document).unwrap();
        let second = registry.load("/shared.js", &document).unwrap();
        assert!(first.ptr_eq(&second));
        assert!(second.clone().now_or_never().is_none());
        assert!(registry.is_loading("/shared.js"));

        memory.release_script("/shared.js");
        assert!(block_on(first).is_ok());
        assert!(block_on(second).is_ok());
        assert!(registry.is_loaded("/shared.js"));
        assert_eq!(memory.inserted_scripts(), vec!["/shared.js"]);
    }

    #[test]
    fn test_asset_registry_failure_reaches_every_waiter() {
        let (memory, document) = blank_document();
        memory.hold_script("/flaky.js");
        let registry = Rc::new(AssetRegistry::new());

        let first = registry.load("/flaky.js", &document).unwrap();
        let second = registry.load("/flaky.js", &document).unwrap();
        memory.fail_script("/flaky.js");
        memory.release_script("/flaky.js");

        assert!(matches!(block_on(first), Err(RouteError::AssetLoad { .. })));
        assert!(matches!(block_on(second), Err(RouteError::AssetLoad { .. })));
        assert!(!registry.is_loaded("/flaky.js"));
        assert!(!registry.is_loading("/flaky.js"));

        memory.heal_script("/flaky.js");
        let retry = registry.load("/flaky.js", &document).unwrap();
        assert!(block_on(retry).is_ok());
    }
}
