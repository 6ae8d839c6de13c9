//! Browser seams.
//!
//! The router never talks to the browser directly. Everything it needs from
//! the host environment goes through the traits in this module, bundled in a
//! [`Platform`]:
//!
//! | Trait        | Browser counterpart                                    |
//! |--------------|--------------------------------------------------------|
//! | [`Document`] | live DOM regions, title, assets, settings, scroll/focus |
//! | [`History`]  | `history.pushState` / `replaceState`, `location`       |
//! | [`Storage`]  | `localStorage`                                         |
//! | [`Fetcher`]  | `fetch()`                                              |
//! | `LocalSpawn` | `spawn_local` on the page's event loop                 |
//!
//! Two implementations ship with the crate: the in-memory one in
//! [`memory`](crate::memory) (headless use and tests) and, with the `web`
//! feature on wasm32, a web-sys backend.
//!
//! Everything is single-threaded; trait objects are held in `Rc` and async
//! methods produce `!Send` futures.

use crate::active_link::LinkElement;
use crate::error::RouteError;
use async_trait::async_trait;
use futures::task::LocalSpawn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;
use url::Url;

/// Metadata the router attaches to every history entry it creates or rewrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub route_url: String,
    pub title: String,
    pub scroll_position: f64,
}

/// Where to scroll once new content is in place.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    /// Scroll the element with this id into view and focus it.
    Element(String),
    /// Scroll the window to this vertical offset and focus the main landmark.
    Position(f64),
}

impl Default for ScrollTarget {
    fn default() -> Self {
        ScrollTarget::Position(0.0)
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    /// A `200 text/html` response.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html; charset=UTF-8".to_string()),
            body: body.into(),
        }
    }

    /// A response with an explicit status and content type.
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network access.
#[async_trait(?Send)]
pub trait Fetcher {
    /// Fetch `url`. Transport failures map to [`RouteError::Network`];
    /// HTTP-level failures are reported through the response status.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, RouteError>;
}

/// The live document.
#[async_trait(?Send)]
pub trait Document {
    /// Serialized markup of the whole document.
    fn snapshot(&self) -> String;

    /// Keys of the content regions currently in the document, in document order.
    fn region_keys(&self) -> Vec<String>;

    /// Inner markup of a region.
    fn region_html(&self, region: &str) -> Option<String>;

    /// Replace the inner markup of a region.
    fn replace_region(&self, region: &str, markup: &str);

    fn title(&self) -> String;

    fn set_title(&self, title: &str);

    /// Whether an element serializing to exactly `markup` already exists.
    fn contains_markup(&self, markup: &str) -> bool;

    /// Parse `markup` and append the result to the body.
    fn append_to_body(&self, markup: &str);

    /// `src` of every script element currently in the document.
    fn script_sources(&self) -> Vec<String>;

    /// Append `<script src>` to the body and wait for its load or error event.
    async fn insert_script(&self, src: &str) -> Result<(), RouteError>;

    /// The live global settings object.
    fn settings(&self) -> Map<String, Value>;

    /// Shallow-merge `settings` into the live global settings object.
    fn merge_settings(&self, settings: &Map<String, Value>);

    fn scroll_y(&self) -> f64;

    fn scroll_to_y(&self, y: f64);

    /// Scroll the element with `id` into view. Returns `false` when it does not exist.
    fn scroll_into_view(&self, id: &str) -> bool;

    /// Focus the element with `id`. Returns `false` when it does not exist.
    fn focus(&self, id: &str) -> bool;

    /// Visit every anchor in the document.
    fn for_each_link(&self, visit: &mut dyn FnMut(&mut dyn LinkElement));
}

/// Session history and location.
pub trait History {
    /// The document URL, hash included.
    fn current_url(&self) -> Url;

    /// Router metadata of the current entry, if the router wrote any.
    fn state(&self) -> Option<HistoryEntry>;

    /// Push a new entry for `url`.
    fn push(&self, url: &Url, entry: HistoryEntry);

    /// Rewrite the metadata of the current entry; the URL is unchanged.
    fn replace(&self, entry: HistoryEntry);

    /// Leave the router: perform an ordinary full browser navigation.
    fn assign(&self, url: &Url);
}

/// Persistent key-value storage scoped to the browser.
pub trait Storage {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str);
}

/// The host environment the router runs in.
#[derive(Clone)]
pub struct Platform {
    pub document: Rc<dyn Document>,
    pub history: Rc<dyn History>,
    pub storage: Rc<dyn Storage>,
    pub fetcher: Rc<dyn Fetcher>,
    pub spawner: Rc<dyn LocalSpawn>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("url", &self.history.current_url().as_str())
            .finish_non_exhaustive()
    }
}
