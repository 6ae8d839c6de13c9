//! Error handling for the navigator.
//!
//! This module defines what a navigation can end in and why:
//!
//! - [`RouteError`]: the failure taxonomy for fetching, assembling and
//!   installing a route (`Network`, `NotHtml`, `UnroutableMarker`,
//!   `MalformedResponse`, `AssetLoad`).
//! - [`NavigationResult`]: the outcome of every call to
//!   [`Navigator::navigate`](crate::navigator::Navigator::navigate)
//!   (`Completed`, `Cancelled`, `FullReload`, `InPage`).
//! - [`ConfigError`]: raised while building a router from a bad
//!   [`RouterConfig`](crate::config::RouterConfig).
//!
//! None of these ever reach the user as an in-page error. The worst a
//! failed navigation does is fall back to an ordinary full page load.
//!
//! # Examples
//!
//! ```
//! use fragment_navigator::error::{NavigationResult, RouteError};
//!
//! let err = RouteError::NotHtml {
//!     url: "/files/report".into(),
//!     content_type: "application/pdf".into(),
//! };
//! assert!(err.is_unroutable());
//!
//! let result = NavigationResult::FullReload {
//!     url: "/files/report".into(),
//!     reason: Some(err),
//! };
//! assert!(result.is_full_reload());
//! ```

use thiserror::Error;

// ============================================================================
// Route errors
// ============================================================================

/// Failure while fetching, assembling or installing a [`Route`](crate::route::Route).
///
/// `Clone` because a single pending fetch is shared by every navigation
/// that asked for the same URL, and each of them receives the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Transport failure or a non-2xx status.
    #[error("network error fetching '{url}': {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The response is not an HTML document.
    #[error("'{url}' is not an HTML document (content type '{content_type}')")]
    NotHtml { url: String, content_type: String },

    /// The server answered with the "cannot route here" sentinel body.
    #[error("'{url}' cannot be served under the current routing context")]
    UnroutableMarker { url: String },

    /// The document carries no content regions, or is otherwise unusable.
    #[error("malformed response for '{url}': {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A script asset failed to load.
    #[error("failed to load asset '{src}': {message}")]
    AssetLoad { src: String, message: String },
}

impl RouteError {
    /// Whether the URL should be recorded as unroutable so that later
    /// clicks skip the router entirely.
    pub fn is_unroutable(&self) -> bool {
        matches!(
            self,
            RouteError::NotHtml { .. } | RouteError::UnroutableMarker { .. }
        )
    }

    /// Build a [`RouteError::Network`] for a non-2xx response.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        RouteError::Network {
            url: url.into(),
            status: Some(status),
            message: format!("HTTP status {status}"),
        }
    }

    /// Build a [`RouteError::Network`] for a transport failure.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        RouteError::Network {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Error raised while turning a [`RouterConfig`](crate::config::RouterConfig)
/// into a running router.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An administrative path pattern was rejected by the matcher.
    #[error("invalid admin path pattern '{pattern}': {source}")]
    AdminPattern {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },

    /// The `router` key of the settings blob did not deserialize.
    #[error("invalid router settings: {0}")]
    Settings(#[from] serde_json::Error),
}

// ============================================================================
// Navigation outcomes
// ============================================================================

/// Outcome of a single navigation.
///
/// Cancellation is not an error: a navigation superseded by a newer one
/// returns [`NavigationResult::Cancelled`] and touches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationResult {
    /// Content, history and title now reflect `url`.
    Completed { url: String },
    /// A newer navigation took over before this one reached the content swap.
    Cancelled { url: String },
    /// The router handed `url` to the browser for an ordinary page load.
    FullReload {
        url: String,
        reason: Option<RouteError>,
    },
    /// Target is the current page; only scroll and focus changed.
    InPage { url: String },
}

impl NavigationResult {
    /// Check if the navigation completed in place.
    pub fn is_completed(&self) -> bool {
        matches!(self, NavigationResult::Completed { .. })
    }

    /// Check if the navigation was superseded.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NavigationResult::Cancelled { .. })
    }

    /// Check if the navigation degraded to a full browser load.
    pub fn is_full_reload(&self) -> bool {
        matches!(self, NavigationResult::FullReload { .. })
    }

    /// The URL this navigation targeted.
    pub fn url(&self) -> &str {
        match self {
            NavigationResult::Completed { url }
            | NavigationResult::Cancelled { url }
            | NavigationResult::FullReload { url, .. }
            | NavigationResult::InPage { url } => url,
        }
    }

    /// The error behind a full reload, if one caused it.
    pub fn reason(&self) -> Option<&RouteError> {
        match self {
            NavigationResult::FullReload { reason, .. } => reason.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
