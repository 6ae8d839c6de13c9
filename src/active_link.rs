//! Active-link marking.
//!
//! Anchors rendered by the server carry the system path they point at in
//! `data-link-system-path` (and, for links with a query string, the query
//! as a JSON object in `data-link-query`). Given the [`PathSettings`] of the
//! displayed page, [`ActiveLinkWriter`] marks exactly the anchors that point
//! at it:
//!
//! 1. the system path equals `currentPath`, or equals the front-page
//!    sentinel while `isFront` is set;
//! 2. the anchor has no `hreflang`, or its `hreflang` equals `currentLanguage`;
//! 3. the anchor's query equals the page query, after both have been
//!    stripped of routing-internal keys (an anchor without query metadata
//!    only matches a page without a query).
//!
//! Marking first clears every candidate, so running it twice yields the
//! same result as running it once.
//!
//! The same writer runs over freshly fetched region markup (so cached
//! fragments are already correct) and over the live document after every
//! completed navigation.

use crate::config::RouterConfig;
use crate::dom::Element;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding the anchor's system path.
pub const SYSTEM_PATH_ATTRIBUTE: &str = "data-link-system-path";
/// Attribute holding the anchor's query as a JSON object.
pub const QUERY_ATTRIBUTE: &str = "data-link-query";

/// The `path` object of the page settings blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathSettings {
    pub base_url: String,
    pub path_prefix: String,
    pub current_path: String,
    pub current_path_is_admin: bool,
    pub is_front: bool,
    pub current_language: Option<String>,
    /// Raw `currentQuery`; the server sends `[]` rather than `{}` when empty.
    pub current_query: Option<Value>,
}

impl PathSettings {
    /// Read the `path` key of a settings blob. Missing or malformed data
    /// yields the default (empty) settings.
    pub fn from_settings(settings: &Map<String, Value>) -> Self {
        settings
            .get("path")
            .and_then(|value| Self::deserialize(value).ok())
            .unwrap_or_default()
    }

    /// Path settings for `current_path`.
    pub fn new(current_path: impl Into<String>) -> Self {
        Self {
            current_path: current_path.into(),
            ..Self::default()
        }
    }

    /// Mark this as the front page.
    pub fn front(mut self) -> Self {
        self.is_front = true;
        self
    }

    /// Set the current language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.current_language = Some(language.into());
        self
    }

    /// Set the current query.
    pub fn query(mut self, query: Map<String, Value>) -> Self {
        self.current_query = Some(Value::Object(query));
        self
    }

    /// The current query as an object, when it is one.
    pub fn query_map(&self) -> Option<&Map<String, Value>> {
        self.current_query.as_ref().and_then(Value::as_object)
    }
}

/// An anchor the writer can inspect and mark.
///
/// Implemented by [`dom::Element`](crate::dom::Element) for fetched markup,
/// and by live-DOM wrappers in the platform backends.
pub trait LinkElement {
    /// Read an attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Toggle the active state (class plus `aria-current`).
    fn set_active(&mut self, class: &str, active: bool);
}

impl LinkElement for Element {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attr(name).map(str::to_string)
    }

    fn set_active(&mut self, class: &str, active: bool) {
        if active {
            self.add_class(class);
            self.set_attr("aria-current", "page");
        } else {
            self.remove_class(class);
            self.remove_attr("aria-current");
        }
    }
}

/// Computes and writes active-link state.
#[derive(Debug, Clone)]
pub struct ActiveLinkWriter {
    active_class: String,
    front_path: String,
    internal_query_keys: Vec<String>,
}

impl ActiveLinkWriter {
    /// Create a writer from router configuration.
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            active_class: config.active_class.clone(),
            front_path: config.front_path.clone(),
            internal_query_keys: config.internal_query_keys.clone(),
        }
    }

    /// Class applied to active anchors.
    pub fn active_class(&self) -> &str {
        &self.active_class
    }

    /// Whether `link` represents the page described by `path`.
    ///
    /// Links without a system path are never active.
    pub fn is_active(&self, link: &dyn LinkElement, path: &PathSettings) -> bool {
        let Some(system_path) = link.attribute(SYSTEM_PATH_ATTRIBUTE) else {
            return false;
        };

        let path_matches = system_path == path.current_path
            || (path.is_front && system_path == self.front_path);
        if !path_matches {
            return false;
        }

        if let Some(hreflang) = link.attribute("hreflang") {
            if path.current_language.as_deref() != Some(hreflang.as_str()) {
                return false;
            }
        }

        let link_query = link
            .attribute(QUERY_ATTRIBUTE)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            });
        self.strip(link_query.as_ref()) == self.strip(path.query_map())
    }

    /// Recompute the state of one link. Returns whether it is now active.
    pub fn apply(&self, link: &mut dyn LinkElement, path: &PathSettings) -> bool {
        if link.attribute(SYSTEM_PATH_ATTRIBUTE).is_none() {
            return false;
        }
        let active = self.is_active(link, path);
        link.set_active(&self.active_class, active);
        active
    }

    /// Recompute every anchor below `root`. Returns the number of active anchors.
    pub fn apply_to_tree(&self, root: &mut Element, path: &PathSettings) -> usize {
        let mut active = 0;
        root.walk_mut(&mut |el| {
            if el.name == "a" && self.apply(el, path) {
                active += 1;
            }
        });
        active
    }

    /// Drop internal keys; an empty result compares equal to no query.
    fn strip(&self, query: Option<&Map<String, Value>>) -> Option<Map<String, Value>> {
        let stripped: Map<String, Value> = query?
            .iter()
            .filter(|(key, _)| !self.internal_query_keys.iter().any(|k| k == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        (!stripped.is_empty()).then_some(stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use serde_json::json;

    fn writer() -> ActiveLinkWriter {
        ActiveLinkWriter::new(&RouterConfig::default())
    }

    fn active_ids(root: &Element) -> Vec<String> {
        root.find_all(&|el| el.name == "a" && el.has_class("is-active"))
            .into_iter()
            .filter_map(|el| el.attr("id").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_path_match_and_front_sentinel() {
        let mut doc = parse_document(
            r#"<body>
                <a id="home" data-link-system-path="&lt;front&gt;">Home</a>
                <a id="node" data-link-system-path="node/1">Node</a>
                <a id="other" data-link-system-path="node/2">Other</a>
                <a id="plain" href="/x">Plain</a>
            </body>"#,
        );
        let count = writer().apply_to_tree(&mut doc, &PathSettings::new("node/1").front());
        assert_eq!(count, 2);
        assert_eq!(active_ids(&doc), vec!["home", "node"]);
        let node = doc.find(&|el| el.attr("id") == Some("node")).unwrap();
        assert_eq!(node.attr("aria-current"), Some("page"));
    }

    #[test]
    fn test_hreflang_filter() {
        let mut doc = parse_document(
            r#"<body>
                <a id="en" hreflang="en" data-link-system-path="node/1"></a>
                <a id="fr" hreflang="fr" data-link-system-path="node/1"></a>
                <a id="any" data-link-system-path="node/1"></a>
            </body>"#,
        );
        writer().apply_to_tree(&mut doc, &PathSettings::new("node/1").language("fr"));
        assert_eq!(active_ids(&doc), vec!["fr", "any"]);
    }

    #[test]
    fn test_query_matching_strips_internal_keys() {
        let mut doc = parse_document(
            r#"<body>
                <a id="p2" data-link-system-path="news" data-link-query='{"page":"2"}'></a>
                <a id="p3" data-link-system-path="news" data-link-query='{"page":"3"}'></a>
                <a id="bare" data-link-system-path="news"></a>
            </body>"#,
        );
        let query = json!({ "page": "2", "_wrapper_format": "html" });
        let path = PathSettings::new("news").query(query.as_object().unwrap().clone());
        writer().apply_to_tree(&mut doc, &path);
        assert_eq!(active_ids(&doc), vec!["p2"]);
    }

    #[test]
    fn test_query_of_only_internal_keys_matches_bare_link() {
        let mut doc = parse_document(
            r#"<body><a id="bare" data-link-system-path="news"></a></body>"#,
        );
        let query = json!({ "ajax_form": "1" });
        let path = PathSettings::new("news").query(query.as_object().unwrap().clone());
        writer().apply_to_tree(&mut doc, &path);
        assert_eq!(active_ids(&doc), vec!["bare"]);
    }

    #[test]
    fn test_apply_is_idempotent_and_clears_stale_marks() {
        let mut doc = parse_document(
            r#"<body>
                <a id="a" class="menu is-active" data-link-system-path="a"></a>
                <a id="b" class="menu" data-link-system-path="b"></a>
            </body>"#,
        );
        let w = writer();
        w.apply_to_tree(&mut doc, &PathSettings::new("b"));
        let first = doc.clone();
        w.apply_to_tree(&mut doc, &PathSettings::new("b"));
        assert_eq!(doc, first);
        assert_eq!(active_ids(&doc), vec!["b"]);
        let b = doc.find(&|el| el.attr("id") == Some("b")).unwrap();
        assert_eq!(b.attr("class"), Some("menu is-active"));
        let a = doc.find(&|el| el.attr("id") == Some("a")).unwrap();
        assert_eq!(a.attr("class"), Some("menu"));
    }

    #[test]
    fn test_path_settings_from_settings_blob() {
        let settings = json!({
            "path": {
                "currentPath": "node/7",
                "isFront": false,
                "currentLanguage": "en",
                "currentQuery": []
            }
        });
        let path = PathSettings::from_settings(settings.as_object().unwrap());
        assert_eq!(path.current_path, "node/7");
        assert_eq!(path.current_language.as_deref(), Some("en"));
        assert!(path.query_map().is_none());

        assert_eq!(PathSettings::from_settings(&Map::new()), PathSettings::default());
    }
}
