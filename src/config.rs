//! Router configuration.
//!
//! [`RouterConfig`] names every marker the router looks for in server
//! markup and every policy knob it honours. Defaults match the markup the
//! page renderer emits; a page can override any field by shipping a
//! `router` object inside its settings blob:
//!
//! ```
//! use fragment_navigator::config::RouterConfig;
//! use serde_json::json;
//!
//! let settings = json!({
//!     "router": {
//!         "mainContentId": "content",
//!         "adminPatterns": ["/admin", "/admin/{*rest}"]
//!     }
//! });
//! let config = RouterConfig::from_settings(settings.as_object().unwrap()).unwrap();
//! assert_eq!(config.main_content_id, "content");
//! assert_eq!(config.region_attribute, "data-router-region");
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Key under which the settings blob may carry a router configuration.
pub const SETTINGS_KEY: &str = "router";

/// Marker names and policies used by the router.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Attribute marking a content region; its value is the region key.
    pub region_attribute: String,
    /// Attribute marking the container of extra managed assets.
    pub assets_attribute: String,
    /// Attribute marking the embedded JSON settings element.
    pub settings_attribute: String,
    /// Attribute the server uses for deferred placeholders still being streamed.
    pub deferred_placeholder_attribute: String,
    /// Id of the main content landmark focused after numeric scrolls.
    pub main_content_id: String,
    /// Exact response body meaning "cannot be routed in this context".
    pub unroutable_sentinel: String,
    /// Storage key for the persisted unroutable-URL registry.
    pub storage_key: String,
    /// Administrative path patterns, in matchit syntax, never routed client-side.
    pub admin_patterns: Vec<String>,
    /// Query keys ignored by active-link matching.
    pub internal_query_keys: Vec<String>,
    /// Path value that stands for the front page on anchors.
    pub front_path: String,
    /// Class toggled on active anchors.
    pub active_class: String,
    /// Site base path stripped before admin pattern matching.
    pub base_path: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            region_attribute: "data-router-region".to_string(),
            assets_attribute: "data-router-assets".to_string(),
            settings_attribute: "data-router-settings".to_string(),
            deferred_placeholder_attribute: "data-big-pipe-placeholder-id".to_string(),
            main_content_id: "main-content".to_string(),
            unroutable_sentinel: "<!-- fragment-navigator:unroutable -->".to_string(),
            storage_key: "fragment_navigator.unroutable".to_string(),
            admin_patterns: default_admin_patterns(),
            internal_query_keys: vec![
                "_wrapper_format".to_string(),
                "ajax_form".to_string(),
                "_drupal_ajax".to_string(),
                "ajax_page_state".to_string(),
            ],
            front_path: "<front>".to_string(),
            active_class: "is-active".to_string(),
            base_path: "/".to_string(),
        }
    }
}

fn default_admin_patterns() -> Vec<String> {
    [
        "/admin",
        "/admin/{*rest}",
        "/user/logout",
        "/{entity}/add",
        "/{entity}/add/{*rest}",
        "/{entity}/{id}/edit",
        "/{entity}/{id}/edit/{*rest}",
        "/{entity}/{id}/delete",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}

impl RouterConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `router` key of a settings blob, falling back to defaults
    /// for every field it leaves out (or entirely when the key is absent).
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, ConfigError> {
        match settings.get(SETTINGS_KEY) {
            Some(value) => Ok(Self::deserialize(value)?),
            None => Ok(Self::default()),
        }
    }

    /// Set the region marker attribute.
    pub fn region_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.region_attribute = attribute.into();
        self
    }

    /// Set the main landmark id.
    pub fn main_content_id(mut self, id: impl Into<String>) -> Self {
        self.main_content_id = id.into();
        self
    }

    /// Set the storage key of the unroutable registry.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the unroutable sentinel body.
    pub fn unroutable_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.unroutable_sentinel = sentinel.into();
        self
    }

    /// Replace the admin path patterns.
    pub fn admin_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Add one admin path pattern.
    pub fn admin_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.admin_patterns.push(pattern.into());
        self
    }

    /// Set the site base path.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }
}
