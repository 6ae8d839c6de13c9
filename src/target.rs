//! Navigation target classification.
//!
//! Before the router touches a URL it decides what kind of target it is:
//!
//! | Kind                          | Meaning                                          |
//! |-------------------------------|--------------------------------------------------|
//! | [`TargetKind::External`]      | different origin (or a non-http scheme)          |
//! | [`TargetKind::Admin`]         | administrative path, always served by the server |
//! | [`TargetKind::File`]          | last path segment contains a `.`                 |
//! | [`TargetKind::SamePageHash`]  | same path and query, only the hash moves         |
//! | [`TargetKind::Routable`]      | everything else                                  |
//!
//! Only `Routable` targets are handed to the
//! [`Navigator`](crate::navigator::Navigator).
//!
//! Routes are cached by [`cache_key`]: path plus query string, never host or
//! hash, so `/a?x=1#top` and `/a?x=1` share a cache entry.

use crate::config::RouterConfig;
use crate::error::ConfigError;
use std::borrow::Cow;
use url::Url;

/// Classification of a URL relative to the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Routable,
    External,
    Admin,
    File,
    SamePageHash,
}

/// A parsed URL together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub url: Url,
    pub kind: TargetKind,
}

impl NavigationTarget {
    /// Whether the router should handle this target.
    pub fn is_routable(&self) -> bool {
        self.kind == TargetKind::Routable
    }

    /// Cache key of the target URL.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// Cache key of a URL: path plus `?query` when a query is present.
///
/// ```
/// use fragment_navigator::target::cache_key;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/news?page=2#latest").unwrap();
/// assert_eq!(cache_key(&url), "/news?page=2");
/// ```
pub fn cache_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

/// Normalize a path for consistent comparison
///
/// Ensures paths have a leading slash and no trailing slash (unless root).
/// Returns `Cow<str>` to avoid allocation when path is already normalized.
///
/// ```
/// use fragment_navigator::normalize_path;
///
/// assert_eq!(normalize_path("/admin/"), "/admin");
/// assert_eq!(normalize_path("node/1"), "/node/1");
/// assert_eq!(normalize_path(""), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &'_ str) -> Cow<'_, str> {
    if path.is_empty() {
        return Cow::Borrowed("/");
    }
    if path == "/" {
        return Cow::Borrowed(path);
    }

    let has_leading = path.starts_with('/');
    let has_trailing = path.ends_with('/');
    if has_leading && !has_trailing {
        return Cow::Borrowed(path);
    }

    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{trimmed}"))
    }
}

/// Classifies URLs against the current document.
///
/// Admin patterns are compiled once into a [`matchit::Router`].
pub struct TargetClassifier {
    admin: matchit::Router<()>,
    base_path: String,
}

impl std::fmt::Debug for TargetClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetClassifier")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl TargetClassifier {
    /// Compile the admin patterns of `config`.
    pub fn new(config: &RouterConfig) -> Result<Self, ConfigError> {
        let mut admin = matchit::Router::new();
        for pattern in &config.admin_patterns {
            admin
                .insert(pattern.as_str(), ())
                .map_err(|source| ConfigError::AdminPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        Ok(Self {
            admin,
            base_path: normalize_path(&config.base_path).into_owned(),
        })
    }

    /// Check a path (site-absolute, base path included) against the admin patterns.
    pub fn is_admin_path(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let relative = if self.base_path == "/" {
            path.as_ref()
        } else {
            match path.strip_prefix(self.base_path.as_str()) {
                Some("") => "/",
                Some(rest) if rest.starts_with('/') => rest,
                _ => path.as_ref(),
            }
        };
        self.admin.at(relative).is_ok()
    }

    /// Classify `url` relative to the document currently at `current`.
    pub fn classify(&self, url: &Url, current: &Url) -> TargetKind {
        if url.origin() != current.origin() {
            return TargetKind::External;
        }
        if self.is_admin_path(url.path()) {
            return TargetKind::Admin;
        }
        let is_file = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .is_some_and(|last| last.contains('.'));
        if is_file {
            return TargetKind::File;
        }
        let has_hash = url.fragment().is_some_and(|f| !f.is_empty());
        if has_hash && cache_key(url) == cache_key(current) {
            return TargetKind::SamePageHash;
        }
        TargetKind::Routable
    }

    /// Resolve `href` against `current` and classify it.
    ///
    /// Returns `None` when `href` does not parse as a URL reference.
    pub fn target(&self, href: &str, current: &Url) -> Option<NavigationTarget> {
        let url = current.join(href).ok()?;
        let kind = self.classify(&url, current);
        Some(NavigationTarget { url, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TargetClassifier {
        TargetClassifier::new(&RouterConfig::default()).unwrap()
    }

    fn current() -> Url {
        Url::parse("https://example.com/news?page=1").unwrap()
    }

    fn kind(href: &str) -> TargetKind {
        classifier().target(href, &current()).unwrap().kind
    }

    #[test]
    fn test_external() {
        assert_eq!(kind("https://other.example/news"), TargetKind::External);
        assert_eq!(kind("http://example.com/news"), TargetKind::External);
        assert_eq!(kind("mailto:someone@example.com"), TargetKind::External);
    }

    #[test]
    fn test_admin_paths() {
        assert_eq!(kind("/admin"), TargetKind::Admin);
        assert_eq!(kind("/admin/content"), TargetKind::Admin);
        assert_eq!(kind("/node/12/edit"), TargetKind::Admin);
        assert_eq!(kind("/node/12/delete"), TargetKind::Admin);
        assert_eq!(kind("/node/add/article"), TargetKind::Admin);
        assert_eq!(kind("/user/logout"), TargetKind::Admin);
        assert_eq!(kind("/node/12"), TargetKind::Routable);
    }

    #[test]
    fn test_admin_paths_under_base_path() {
        let config = RouterConfig::default().base_path("/site/");
        let classifier = TargetClassifier::new(&config).unwrap();
        assert!(classifier.is_admin_path("/site/admin/config"));
        assert!(classifier.is_admin_path("/site/node/1/edit/"));
        assert!(!classifier.is_admin_path("/site/about"));
        assert!(!classifier.is_admin_path("/site"));
    }

    #[test]
    fn test_file_heuristic() {
        assert_eq!(kind("/files/report.pdf"), TargetKind::File);
        assert_eq!(kind("/sitemap.xml?x=1"), TargetKind::File);
        assert_eq!(kind("/v1.2/docs"), TargetKind::Routable);
    }

    #[test]
    fn test_same_page_hash() {
        assert_eq!(kind("?page=1#comments"), TargetKind::SamePageHash);
        assert_eq!(kind("#comments"), TargetKind::SamePageHash);
        assert_eq!(kind("/news?page=1"), TargetKind::Routable);
        assert_eq!(kind("/news?page=1#"), TargetKind::Routable);
        assert_eq!(kind("/news?page=2#comments"), TargetKind::Routable);
    }

    #[test]
    fn test_hash_on_other_query_is_routable() {
        let current = Url::parse("https://example.com/news").unwrap();
        let target = classifier().target("/news?page=3#top", &current).unwrap();
        assert_eq!(target.kind, TargetKind::Routable);
        assert_eq!(target.cache_key(), "/news?page=3");
    }

    #[test]
    fn test_cache_key_ignores_hash_and_host() {
        let a = Url::parse("https://example.com/a?x=1#top").unwrap();
        let b = Url::parse("https://example.com/a?x=1").unwrap();
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_eq!(cache_key(&Url::parse("https://example.com/a").unwrap()), "/a");
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let config = RouterConfig::default().admin_patterns(["/x/{a}", "/x/{b}"]);
        assert!(matches!(
            TargetClassifier::new(&config),
            Err(ConfigError::AdminPattern { .. })
        ));
    }
}
