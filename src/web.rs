//! Browser backend built on web-sys.
//!
//! Implements every seam of [`platform`](crate::platform) against the real
//! DOM, `history`, `localStorage` and `fetch`, and wires the router to the
//! page's events:
//!
//! ```ignore
//! let (router, _listeners) = fragment_navigator::web::start("drupalSettings")?;
//! // keep `_listeners` alive for as long as the router should intercept
//! ```
//!
//! The live settings object is a global on `window` whose name is given at
//! start-up; it is read and merged through JSON.

use crate::active_link::LinkElement;
use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::interceptor::ClickEvent;
use crate::platform::{Document, FetchResponse, Fetcher, History, HistoryEntry, Platform, Storage};
use crate::router::Router;
use crate::{debug_log, info_log, warn_log};
use async_trait::async_trait;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use serde_json::{Map, Value};
use std::rc::Rc;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))
}

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn to_json(value: &JsValue) -> Option<String> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    js_sys::JSON::stringify(value).ok().map(String::from)
}

fn from_json(json: &str) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(json)
}

// ============================================================================
// Document
// ============================================================================

/// The live `window.document`.
pub struct WebDocument {
    window: web_sys::Window,
    document: web_sys::Document,
    region_attribute: String,
    settings_global: String,
}

impl WebDocument {
    pub fn new(config: &RouterConfig, settings_global: impl Into<String>) -> Result<Self, JsValue> {
        let window = window()?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self {
            window,
            document,
            region_attribute: config.region_attribute.clone(),
            settings_global: settings_global.into(),
        })
    }

    fn region(&self, key: &str) -> Option<web_sys::Element> {
        let selector = format!("[{}=\"{}\"]", self.region_attribute, key.replace('"', "\\\""));
        self.document.query_selector(&selector).ok().flatten()
    }

    fn elements(&self, selector: &str) -> Vec<web_sys::Element> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
            .collect()
    }

    fn settings_object(&self) -> Result<JsValue, JsValue> {
        let key = JsValue::from_str(&self.settings_global);
        let current = js_sys::Reflect::get(&self.window, &key)?;
        if current.is_object() {
            return Ok(current);
        }
        let created: JsValue = js_sys::Object::new().into();
        js_sys::Reflect::set(&self.window, &key, &created)?;
        Ok(created)
    }
}

#[async_trait(?Send)]
impl Document for WebDocument {
    fn snapshot(&self) -> String {
        self.document
            .document_element()
            .map(|el| format!("<!DOCTYPE html>{}", el.outer_html()))
            .unwrap_or_default()
    }

    fn region_keys(&self) -> Vec<String> {
        self.elements(&format!("[{}]", self.region_attribute))
            .into_iter()
            .filter_map(|el| el.get_attribute(&self.region_attribute))
            .collect()
    }

    fn region_html(&self, region: &str) -> Option<String> {
        self.region(region).map(|el| el.inner_html())
    }

    fn replace_region(&self, region: &str, markup: &str) {
        if let Some(el) = self.region(region) {
            el.set_inner_html(markup);
        }
    }

    fn title(&self) -> String {
        self.document.title()
    }

    fn set_title(&self, title: &str) {
        self.document.set_title(title);
    }

    fn contains_markup(&self, markup: &str) -> bool {
        self.document
            .document_element()
            .is_some_and(|el| el.outer_html().contains(markup))
    }

    fn append_to_body(&self, markup: &str) {
        if let Some(body) = self.document.body() {
            if let Err(err) = body.insert_adjacent_html("beforeend", markup) {
                warn_log!("Could not append asset: {}", describe(&err));
            }
        }
    }

    fn script_sources(&self) -> Vec<String> {
        self.elements("script[src]")
            .into_iter()
            .filter_map(|el| el.get_attribute("src"))
            .collect()
    }

    async fn insert_script(&self, src: &str) -> Result<(), RouteError> {
        let failed = |err: JsValue| RouteError::AssetLoad {
            src: src.to_string(),
            message: describe(&err),
        };
        let body = self
            .document
            .body()
            .ok_or_else(|| failed(JsValue::from_str("document has no body")))?;
        let script: web_sys::HtmlScriptElement = self
            .document
            .create_element("script")
            .map_err(failed)?
            .dyn_into()
            .map_err(|el: web_sys::Element| failed(el.into()))?;
        script.set_src(src);

        let loaded = js_sys::Promise::new(&mut |resolve, reject| {
            script.set_onload(Some(&resolve));
            script.set_onerror(Some(&reject));
        });
        body.append_child(&script).map_err(failed)?;
        JsFuture::from(loaded)
            .await
            .map(|_| ())
            .map_err(|_| failed(JsValue::from_str("script failed to load")))
    }

    fn settings(&self) -> Map<String, Value> {
        let key = JsValue::from_str(&self.settings_global);
        js_sys::Reflect::get(&self.window, &key)
            .ok()
            .and_then(|value| to_json(&value))
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    fn merge_settings(&self, settings: &Map<String, Value>) {
        let target = match self.settings_object() {
            Ok(target) => target,
            Err(err) => {
                warn_log!("Live settings unavailable: {}", describe(&err));
                return;
            }
        };
        for (key, value) in settings {
            let parsed = serde_json::to_string(value)
                .ok()
                .and_then(|json| from_json(&json).ok());
            if let Some(parsed) = parsed {
                let _ = js_sys::Reflect::set(&target, &JsValue::from_str(key), &parsed);
            }
        }
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn scroll_to_y(&self, y: f64) {
        self.window.scroll_to_with_x_and_y(0.0, y);
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        match self.document.get_element_by_id(id) {
            Some(el) => {
                el.scroll_into_view();
                true
            }
            None => false,
        }
    }

    fn focus(&self, id: &str) -> bool {
        let Some(el) = self
            .document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<web_sys::HtmlElement>().ok())
        else {
            return false;
        };
        // Landmarks are not focusable by default.
        if !el.has_attribute("tabindex") {
            let _ = el.set_attribute("tabindex", "-1");
        }
        el.focus().is_ok()
    }

    fn for_each_link(&self, visit: &mut dyn FnMut(&mut dyn LinkElement)) {
        for el in self.elements("a") {
            visit(&mut WebLink(el));
        }
    }
}

/// A live anchor.
struct WebLink(web_sys::Element);

impl LinkElement for WebLink {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_active(&mut self, class: &str, active: bool) {
        let classes = self.0.class_list();
        let result = if active {
            classes
                .add_1(class)
                .and_then(|()| self.0.set_attribute("aria-current", "page"))
        } else {
            classes
                .remove_1(class)
                .and_then(|()| self.0.remove_attribute("aria-current"))
        };
        if let Err(err) = result {
            debug_log!("Could not update link state: {}", describe(&err));
        }
    }
}

// ============================================================================
// History, storage, fetch, spawn
// ============================================================================

/// `window.history` and `window.location`.
pub struct WebHistory {
    window: web_sys::Window,
    initial: Url,
}

impl WebHistory {
    pub fn new() -> Result<Self, JsValue> {
        let window = window()?;
        let href = window.location().href()?;
        let initial = Url::parse(&href).map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(Self { window, initial })
    }

    fn entry_to_js(entry: &HistoryEntry) -> JsValue {
        serde_json::to_string(entry)
            .ok()
            .and_then(|json| from_json(&json).ok())
            .unwrap_or(JsValue::NULL)
    }
}

impl History for WebHistory {
    fn current_url(&self) -> Url {
        self.window
            .location()
            .href()
            .ok()
            .and_then(|href| Url::parse(&href).ok())
            .unwrap_or_else(|| self.initial.clone())
    }

    fn state(&self) -> Option<HistoryEntry> {
        let state = self.window.history().ok()?.state().ok()?;
        parse_entry(&state)
    }

    fn push(&self, url: &Url, entry: HistoryEntry) {
        let result = self.window.history().and_then(|history| {
            history.push_state_with_url(&Self::entry_to_js(&entry), "", Some(url.as_str()))
        });
        if let Err(err) = result {
            warn_log!("pushState failed: {}", describe(&err));
        }
    }

    fn replace(&self, entry: HistoryEntry) {
        let result = self
            .window
            .history()
            .and_then(|history| history.replace_state(&Self::entry_to_js(&entry), ""));
        if let Err(err) = result {
            warn_log!("replaceState failed: {}", describe(&err));
        }
    }

    fn assign(&self, url: &Url) {
        if let Err(err) = self.window.location().assign(url.as_str()) {
            warn_log!("location.assign failed: {}", describe(&err));
        }
    }
}

fn parse_entry(state: &JsValue) -> Option<HistoryEntry> {
    to_json(state).and_then(|json| serde_json::from_str(&json).ok())
}

/// `window.localStorage`; behaves as empty when storage is unavailable.
pub struct WebStorage {
    storage: Option<web_sys::Storage>,
}

impl WebStorage {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            warn_log!("localStorage unavailable, unroutable URLs will not persist");
        }
        Self { storage }
    }
}

impl Default for WebStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for WebStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Some(storage) = &self.storage {
            let _ = storage.set_item(key, value);
        }
    }
}

/// `window.fetch`.
#[derive(Debug, Default)]
pub struct WebFetcher;

#[async_trait(?Send)]
impl Fetcher for WebFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, RouteError> {
        let failed = |err: JsValue| RouteError::transport(url.as_str(), describe(&err));
        let window = window().map_err(failed)?;
        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url.as_str()))
            .await
            .map_err(failed)?
            .dyn_into()
            .map_err(failed)?;
        let content_type = response.headers().get("content-type").map_err(failed)?;
        let body = JsFuture::from(response.text().map_err(failed)?)
            .await
            .map_err(failed)?
            .as_string()
            .unwrap_or_default();
        Ok(FetchResponse {
            status: response.status(),
            content_type,
            body,
        })
    }
}

/// Spawns onto the browser's microtask queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSpawner;

impl LocalSpawn for WebSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// A [`Platform`] for the current page.
pub fn web_platform(config: &RouterConfig, settings_global: &str) -> Result<Platform, JsValue> {
    Ok(Platform {
        document: Rc::new(WebDocument::new(config, settings_global)?),
        history: Rc::new(WebHistory::new()?),
        storage: Rc::new(WebStorage::new()),
        fetcher: Rc::new(WebFetcher),
        spawner: Rc::new(WebSpawner),
    })
}

// ============================================================================
// Event listeners
// ============================================================================

type Listener = Closure<dyn FnMut(web_sys::Event)>;

/// Registered DOM listeners; dropping the guard removes them.
pub struct ListenerGuard {
    listeners: Vec<(web_sys::EventTarget, &'static str, Listener)>,
}

impl ListenerGuard {
    fn listen(
        &mut self,
        target: &web_sys::EventTarget,
        event: &'static str,
        handler: impl FnMut(web_sys::Event) + 'static,
    ) -> Result<(), JsValue> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        self.listeners.push((target.clone(), event, closure));
        Ok(())
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for (target, event, closure) in self.listeners.drain(..) {
            let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        }
        debug_log!("Router listeners removed");
    }
}

fn anchor_for(event: &web_sys::Event) -> Option<web_sys::Element> {
    event
        .target()?
        .dyn_into::<web_sys::Element>()
        .ok()?
        .closest("a[href]")
        .ok()
        .flatten()
}

/// Register click, hover, focus and popstate listeners for `router`.
pub fn install(router: &Router) -> Result<ListenerGuard, JsValue> {
    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("window has no document"))?;
    let document_target: &web_sys::EventTarget = document.as_ref();
    let window_target: &web_sys::EventTarget = window.as_ref();
    let mut guard = ListenerGuard {
        listeners: Vec::new(),
    };

    let clicks = router.clone();
    guard.listen(document_target, "click", move |event| {
        let Some(anchor) = anchor_for(&event) else {
            return;
        };
        let Some(mouse) = event.dyn_ref::<web_sys::MouseEvent>() else {
            return;
        };
        let Some(href) = anchor.get_attribute("href") else {
            return;
        };
        let click = ClickEvent {
            href,
            button: mouse.button(),
            ctrl_key: mouse.ctrl_key(),
            meta_key: mouse.meta_key(),
            shift_key: mouse.shift_key(),
            alt_key: mouse.alt_key(),
            default_prevented: event.default_prevented(),
            target: anchor.get_attribute("target"),
            download: anchor.has_attribute("download"),
        };
        if clicks.handle_click(&click) {
            event.prevent_default();
        }
    })?;

    for name in ["mouseover", "focusin"] {
        let hovers = router.clone();
        guard.listen(document_target, name, move |event| {
            if let Some(href) = anchor_for(&event).and_then(|a| a.get_attribute("href")) {
                hovers.handle_hover(&href);
            }
        })?;
    }

    let pops = router.clone();
    guard.listen(window_target, "popstate", move |event| {
        let entry = event
            .dyn_ref::<web_sys::PopStateEvent>()
            .and_then(|pop| parse_entry(&pop.state()));
        pops.handle_popstate(entry);
    })?;

    info_log!("Router listeners installed");
    Ok(guard)
}

/// Build, initialize and install a router for the current page.
///
/// Configuration comes from the `router` key of the settings global.
pub fn start(settings_global: &str) -> Result<(Router, ListenerGuard), JsValue> {
    let window = window()?;
    let settings: Map<String, Value> = js_sys::Reflect::get(&window, &JsValue::from_str(settings_global))
        .ok()
        .and_then(|value| to_json(&value))
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();
    let config = RouterConfig::from_settings(&settings)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

    let platform = web_platform(&config, settings_global)?;
    let router = Router::builder(platform)
        .config(config)
        .build()
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    router.init();
    let guard = install(&router)?;
    Ok((router, guard))
}
