//! # fragment-navigator
//!
//! Client-side fragment router for server-rendered sites. In-site link
//! clicks are intercepted, the target page is fetched as ordinary HTML, and
//! only its named content regions are swapped into the live document. A
//! full page load is always the fallback, so the worst case behaves exactly
//! like a site without the router.
//!
//! ## Pieces
//!
//! | Module | Role |
//! |--------|------|
//! | [`target`] | classify URLs (routable, external, admin, file, same-page hash) |
//! | [`route`] | fetch a page and assemble it into a [`Route`] |
//! | [`cache`] | per-session route cache with coalesced fetches |
//! | [`navigator`] | the navigation state machine |
//! | [`interceptor`] | click, hover and popstate handling |
//! | [`active_link`] | mark anchors pointing at the displayed page |
//! | [`router`] | composition root |
//! | [`platform`] | traits for the browser seams; [`memory`] and `web` implement them |
//!
//! ## Server contract
//!
//! Pages mark swappable containers with `data-router-region="<name>"`,
//! may carry a JSON settings element marked `data-router-settings`, and
//! list extra assets inside a `data-router-assets` container. Attribute
//! names are configurable through [`RouterConfig`].
//!
//! ## Example
//!
//! ```
//! use fragment_navigator::memory::MemoryPlatform;
//! use fragment_navigator::{Document, Router};
//! use futures::executor::LocalPool;
//! use std::rc::Rc;
//! use url::Url;
//!
//! let home = r#"<html><head><title>Home</title></head><body>
//!   <main id="main-content" data-router-region="main"><p>Home</p></main></body></html>"#;
//! let memory = MemoryPlatform::new(Url::parse("https://example.com/").unwrap(), home);
//! memory.fetcher.respond_html(
//!     "/news",
//!     r#"<html><head><title>News</title></head><body>
//!       <main id="main-content" data-router-region="main"><p>News</p></main></body></html>"#,
//! );
//!
//! let pool = LocalPool::new();
//! let router = Router::builder(memory.platform(Rc::new(pool.spawner())))
//!     .build()
//!     .unwrap();
//! router.init();
//!
//! let result = pollster::block_on(router.navigate("/news"));
//! assert!(result.is_completed());
//! assert_eq!(memory.document.title(), "News");
//! ```
//!
//! ## Features
//!
//! - `log` (default) / `tracing`: logging backend, see [`logging`].
//! - `web`: web-sys backend for `wasm32` targets.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod logging;

pub mod active_link;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod lifecycle;
pub mod memory;
pub mod navigator;
pub mod platform;
pub mod route;
pub mod router;
pub mod state;
pub mod target;
pub mod transition;
pub mod unroutable;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
#[cfg_attr(docsrs, doc(cfg(feature = "web")))]
pub mod web;

pub use active_link::{ActiveLinkWriter, LinkElement, PathSettings};
pub use cache::{CacheStats, RouteCache};
pub use config::RouterConfig;
pub use error::{ConfigError, NavigationResult, RouteError};
pub use events::{RouterEvents, Subscription};
pub use interceptor::{ClickEvent, InterceptDecision, NavigationFuture};
pub use lifecycle::{behaviors_fn, NoBehaviors, PageBehaviors};
pub use navigator::{NavigateOptions, Navigator};
pub use platform::{Document, FetchResponse, Fetcher, History, HistoryEntry, Platform, ScrollTarget, Storage};
pub use route::{AssetDescriptor, AssetRegistry, Route, RouteParser};
pub use router::{Router, RouterBuilder};
pub use state::NavigationPhase;
pub use target::{cache_key, normalize_path, NavigationTarget, TargetKind};
pub use transition::{transition_fn, NoTransition, PageTransition};
