//! In-memory platform.
//!
//! A headless implementation of every browser seam in
//! [`platform`](crate::platform): the document is an owned
//! [`dom`](crate::dom) tree, history is a vector of entries, storage is a
//! map and the fetcher serves canned responses. It is what the test suite
//! runs on, and it is usable for server-side or CLI driving of a router.
//!
//! Beyond the trait surface each type exposes inspection helpers (region
//! replacement counts, full navigations, fetch counts) and a few knobs
//! (failing or held scripts, held responses) for exercising timing-dependent
//! behavior.

use crate::active_link::LinkElement;
use crate::config::RouterConfig;
use crate::dom::{self, Element, Node};
use crate::error::RouteError;
use crate::platform::{Document, FetchResponse, Fetcher, History, HistoryEntry, Platform, Storage};
use crate::target::cache_key;
use crate::trace_log;
use async_trait::async_trait;
use futures::channel::oneshot;
use futures::task::LocalSpawn;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use url::Url;

// ============================================================================
// Document
// ============================================================================

/// Document backed by an owned node tree.
pub struct MemoryDocument {
    tree: RefCell<Element>,
    region_attribute: String,
    settings: RefCell<Map<String, Value>>,
    scroll_y: Cell<f64>,
    focused: RefCell<Option<String>>,
    scrolled_into_view: RefCell<Option<String>>,
    failing_scripts: RefCell<HashSet<String>>,
    held_scripts: RefCell<HashSet<String>>,
    parked_scripts: RefCell<HashMap<String, Vec<oneshot::Sender<()>>>>,
    inserted_scripts: RefCell<Vec<String>>,
    replacements: RefCell<HashMap<String, usize>>,
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("title", &self.title())
            .field("regions", &self.region_keys())
            .field("scroll_y", &self.scroll_y.get())
            .finish_non_exhaustive()
    }
}

impl MemoryDocument {
    /// Parse `markup` with the default attribute names.
    pub fn new(markup: &str) -> Self {
        Self::with_config(markup, &RouterConfig::default())
    }

    /// Parse `markup`. The live settings are seeded from the embedded
    /// settings element when there is one, as the page's own bootstrap
    /// script would do.
    pub fn with_config(markup: &str, config: &RouterConfig) -> Self {
        let tree = dom::parse_document(markup);
        let settings_attribute = config.settings_attribute.as_str();
        let settings = tree
            .find(&|el| el.has_attr(settings_attribute))
            .and_then(|el| serde_json::from_str::<Map<String, Value>>(&el.text_content()).ok())
            .unwrap_or_default();
        Self {
            tree: RefCell::new(tree),
            region_attribute: config.region_attribute.clone(),
            settings: RefCell::new(settings),
            scroll_y: Cell::new(0.0),
            focused: RefCell::new(None),
            scrolled_into_view: RefCell::new(None),
            failing_scripts: RefCell::new(HashSet::new()),
            held_scripts: RefCell::new(HashSet::new()),
            parked_scripts: RefCell::new(HashMap::new()),
            inserted_scripts: RefCell::new(Vec::new()),
            replacements: RefCell::new(HashMap::new()),
        }
    }

    /// Make every later insertion of `src` fail to load.
    pub fn fail_script(&self, src: impl Into<String>) {
        self.failing_scripts.borrow_mut().insert(src.into());
    }

    /// Let `src` load again.
    pub fn heal_script(&self, src: &str) {
        self.failing_scripts.borrow_mut().remove(src);
    }

    /// Keep insertions of `src` loading until [`release_script`](Self::release_script).
    pub fn hold_script(&self, src: impl Into<String>) {
        self.held_scripts.borrow_mut().insert(src.into());
    }

    /// Let held insertions of `src` finish. Whether they fail is decided
    /// now, so [`fail_script`](Self::fail_script) may be called while held.
    pub fn release_script(&self, src: &str) {
        self.held_scripts.borrow_mut().remove(src);
        let parked = self.parked_scripts.borrow_mut().remove(src).unwrap_or_default();
        for sender in parked {
            let _ = sender.send(());
        }
    }

    /// Scripts inserted through [`Document::insert_script`], in order.
    pub fn inserted_scripts(&self) -> Vec<String> {
        self.inserted_scripts.borrow().clone()
    }

    /// How many times a region's contents were replaced. A region whose
    /// count did not change still holds the same nodes.
    pub fn replacements(&self, region: &str) -> usize {
        self.replacements.borrow().get(region).copied().unwrap_or(0)
    }

    /// Id of the focused element.
    pub fn focused(&self) -> Option<String> {
        self.focused.borrow().clone()
    }

    /// Id of the last element scrolled into view.
    pub fn scrolled_into_view(&self) -> Option<String> {
        self.scrolled_into_view.borrow().clone()
    }

    /// Number of elements matching `pred`.
    pub fn count(&self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let mut count = 0;
        self.tree.borrow_mut().walk_mut(&mut |el| {
            if pred(el) {
                count += 1;
            }
        });
        count
    }

    /// Clone of the element with `id`.
    pub fn element_by_id(&self, id: &str) -> Option<Element> {
        self.tree.borrow().find(&|el| el.attr("id") == Some(id)).cloned()
    }

    /// Simulate the user scrolling.
    pub fn set_scroll_y(&self, y: f64) {
        self.scroll_y.set(y);
    }

    fn is_region<'a>(&'a self, key: &'a str) -> impl Fn(&Element) -> bool + 'a {
        move |el: &Element| el.attr(&self.region_attribute) == Some(key)
    }

    fn append_nodes(&self, nodes: Vec<Node>) {
        let mut tree = self.tree.borrow_mut();
        if let Some(body) = tree.find_mut(&|el| el.name == "body") {
            body.children.extend(nodes);
        } else {
            tree.children.extend(nodes);
        }
    }
}

#[async_trait(?Send)]
impl Document for MemoryDocument {
    fn snapshot(&self) -> String {
        dom::serialize_nodes(&self.tree.borrow().children)
    }

    fn region_keys(&self) -> Vec<String> {
        let attribute = self.region_attribute.as_str();
        self.tree
            .borrow()
            .find_all(&|el| el.has_attr(attribute))
            .into_iter()
            .filter_map(|el| el.attr(attribute).map(str::to_string))
            .collect()
    }

    fn region_html(&self, region: &str) -> Option<String> {
        self.tree
            .borrow()
            .find(&self.is_region(region))
            .map(Element::inner_html)
    }

    fn replace_region(&self, region: &str, markup: &str) {
        let replaced = match self.tree.borrow_mut().find_mut(&self.is_region(region)) {
            Some(el) => {
                el.set_inner_html(markup);
                true
            }
            None => false,
        };
        if replaced {
            *self
                .replacements
                .borrow_mut()
                .entry(region.to_string())
                .or_default() += 1;
        }
    }

    fn title(&self) -> String {
        self.tree
            .borrow()
            .find(&|el| el.name == "title")
            .map(|el| el.text_content().trim().to_string())
            .unwrap_or_default()
    }

    fn set_title(&self, title: &str) {
        let mut tree = self.tree.borrow_mut();
        if let Some(el) = tree.find_mut(&|el| el.name == "title") {
            el.children = vec![Node::Text(title.to_string())];
            return;
        }
        let mut element = Element::new("title");
        element.children.push(Node::Text(title.to_string()));
        if let Some(head) = tree.find_mut(&|el| el.name == "head") {
            head.children.push(Node::Element(element));
        }
    }

    fn contains_markup(&self, markup: &str) -> bool {
        self.tree.borrow().find(&|el| el.outer_html() == markup).is_some()
    }

    fn append_to_body(&self, markup: &str) {
        self.append_nodes(dom::parse_fragment(markup));
    }

    fn script_sources(&self) -> Vec<String> {
        self.tree
            .borrow()
            .find_all(&|el| el.name == "script" && el.has_attr("src"))
            .into_iter()
            .filter_map(|el| el.attr("src").map(str::to_string))
            .collect()
    }

    async fn insert_script(&self, src: &str) -> Result<(), RouteError> {
        let parked = if self.held_scripts.borrow().contains(src) {
            let (sender, receiver) = oneshot::channel();
            self.parked_scripts
                .borrow_mut()
                .entry(src.to_string())
                .or_default()
                .push(sender);
            Some(receiver)
        } else {
            None
        };
        if let Some(receiver) = parked {
            trace_log!("Script '{}' held", src);
            let _ = receiver.await;
        }

        if self.failing_scripts.borrow().contains(src) {
            return Err(RouteError::AssetLoad {
                src: src.to_string(),
                message: "script failed to load".to_string(),
            });
        }
        trace_log!("Inserting script '{}'", src);
        self.append_nodes(vec![Node::Element(Element::new("script").with_attr("src", src))]);
        self.inserted_scripts.borrow_mut().push(src.to_string());
        Ok(())
    }

    fn settings(&self) -> Map<String, Value> {
        self.settings.borrow().clone()
    }

    fn merge_settings(&self, settings: &Map<String, Value>) {
        let mut live = self.settings.borrow_mut();
        for (key, value) in settings {
            live.insert(key.clone(), value.clone());
        }
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    fn scroll_to_y(&self, y: f64) {
        self.scroll_y.set(y);
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        let found = self
            .tree
            .borrow()
            .find(&|el| el.attr("id") == Some(id))
            .is_some();
        if found {
            *self.scrolled_into_view.borrow_mut() = Some(id.to_string());
        }
        found
    }

    fn focus(&self, id: &str) -> bool {
        let found = self
            .tree
            .borrow()
            .find(&|el| el.attr("id") == Some(id))
            .is_some();
        if found {
            *self.focused.borrow_mut() = Some(id.to_string());
        }
        found
    }

    fn for_each_link(&self, visit: &mut dyn FnMut(&mut dyn LinkElement)) {
        self.tree.borrow_mut().walk_mut(&mut |el| {
            if el.name == "a" {
                visit(el);
            }
        });
    }
}

// ============================================================================
// History
// ============================================================================

/// Session history as a vector of entries with a cursor.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: RefCell<Vec<(Url, Option<HistoryEntry>)>>,
    index: Cell<usize>,
    assigned: RefCell<Vec<Url>>,
}

impl MemoryHistory {
    /// History holding a single entry for `url`.
    pub fn new(url: Url) -> Self {
        Self {
            entries: RefCell::new(vec![(url, None)]),
            index: Cell::new(0),
            assigned: RefCell::new(Vec::new()),
        }
    }

    /// Move one entry back and return its router metadata, as a popstate
    /// event would carry it. Returns `None` at the start of history.
    pub fn back(&self) -> Option<Option<HistoryEntry>> {
        let index = self.index.get();
        if index == 0 {
            return None;
        }
        self.index.set(index - 1);
        Some(self.state())
    }

    /// Move one entry forward; see [`back`](Self::back).
    pub fn forward(&self) -> Option<Option<HistoryEntry>> {
        let index = self.index.get();
        if index + 1 >= self.entries.borrow().len() {
            return None;
        }
        self.index.set(index + 1);
        Some(self.state())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Position of the current entry.
    pub fn index(&self) -> usize {
        self.index.get()
    }

    /// Metadata of the entry at `index`.
    pub fn entry(&self, index: usize) -> Option<HistoryEntry> {
        self.entries
            .borrow()
            .get(index)
            .and_then(|(_, entry)| entry.clone())
    }

    /// URLs handed to [`History::assign`], in order.
    pub fn full_navigations(&self) -> Vec<Url> {
        self.assigned.borrow().clone()
    }
}

impl History for MemoryHistory {
    fn current_url(&self) -> Url {
        self.entries.borrow()[self.index.get()].0.clone()
    }

    fn state(&self) -> Option<HistoryEntry> {
        self.entries.borrow()[self.index.get()].1.clone()
    }

    fn push(&self, url: &Url, entry: HistoryEntry) {
        let mut entries = self.entries.borrow_mut();
        let index = self.index.get();
        entries.truncate(index + 1);
        entries.push((url.clone(), Some(entry)));
        self.index.set(index + 1);
    }

    fn replace(&self, entry: HistoryEntry) {
        let index = self.index.get();
        if let Some(slot) = self.entries.borrow_mut().get_mut(index) {
            slot.1 = Some(entry);
        }
    }

    fn assign(&self, url: &Url) {
        self.assigned.borrow_mut().push(url.clone());
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Map-backed storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Fetcher serving canned responses keyed by cache key.
///
/// Unknown keys answer `404`. A held key parks every request until
/// [`release`](Self::release); the response is looked up when the request
/// resumes, so it can be changed while held.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: RefCell<HashMap<String, Result<FetchResponse, RouteError>>>,
    requests: RefCell<Vec<String>>,
    held: RefCell<HashSet<String>>,
    waiting: RefCell<HashMap<String, Vec<oneshot::Sender<()>>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `key` (path plus query).
    pub fn respond(&self, key: impl Into<String>, response: FetchResponse) {
        self.responses.borrow_mut().insert(key.into(), Ok(response));
    }

    /// Serve `body` as `200 text/html` for `key`.
    pub fn respond_html(&self, key: impl Into<String>, body: impl Into<String>) {
        self.respond(key, FetchResponse::html(body));
    }

    /// Fail requests for `key` at the transport level.
    pub fn fail(&self, key: impl Into<String>, error: RouteError) {
        self.responses.borrow_mut().insert(key.into(), Err(error));
    }

    /// Park requests for `key` until released.
    pub fn hold(&self, key: impl Into<String>) {
        self.held.borrow_mut().insert(key.into());
    }

    /// Resume every parked request for `key` and stop holding it.
    pub fn release(&self, key: &str) {
        self.held.borrow_mut().remove(key);
        let waiting = self.waiting.borrow_mut().remove(key).unwrap_or_default();
        for sender in waiting {
            let _ = sender.send(());
        }
    }

    /// Number of requests made for `key`.
    pub fn request_count(&self, key: &str) -> usize {
        self.requests.borrow().iter().filter(|k| *k == key).count()
    }

    /// Keys of every request, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, RouteError> {
        let key = cache_key(url);
        self.requests.borrow_mut().push(key.clone());

        let parked = if self.held.borrow().contains(&key) {
            let (sender, receiver) = oneshot::channel();
            self.waiting
                .borrow_mut()
                .entry(key.clone())
                .or_default()
                .push(sender);
            Some(receiver)
        } else {
            None
        };
        if let Some(receiver) = parked {
            trace_log!("Request for '{}' parked", key);
            let _ = receiver.await;
        }

        self.responses
            .borrow()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok(FetchResponse::new(404, "text/html", "Not found")))
    }
}

// ============================================================================
// Platform bundle
// ============================================================================

/// The four in-memory seams, kept concrete for inspection.
#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    pub document: Rc<MemoryDocument>,
    pub history: Rc<MemoryHistory>,
    pub storage: Rc<MemoryStorage>,
    pub fetcher: Rc<MemoryFetcher>,
}

impl MemoryPlatform {
    /// A page at `url` rendered as `markup`.
    pub fn new(url: Url, markup: &str) -> Self {
        Self::with_config(url, markup, &RouterConfig::default())
    }

    pub fn with_config(url: Url, markup: &str, config: &RouterConfig) -> Self {
        Self {
            document: Rc::new(MemoryDocument::with_config(markup, config)),
            history: Rc::new(MemoryHistory::new(url)),
            storage: Rc::new(MemoryStorage::new()),
            fetcher: Rc::new(MemoryFetcher::new()),
        }
    }

    /// Share `storage` with another platform, as two tabs of one browser would.
    pub fn with_storage(mut self, storage: Rc<MemoryStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Type-erased platform driving background work on `spawner`.
    pub fn platform(&self, spawner: Rc<dyn LocalSpawn>) -> Platform {
        Platform {
            document: self.document.clone(),
            history: self.history.clone(),
            storage: self.storage.clone(),
            fetcher: self.fetcher.clone(),
            spawner,
        }
    }
}
