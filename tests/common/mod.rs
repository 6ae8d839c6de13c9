//! Test utilities for router integration tests
//!
//! Provides page fixtures and a harness that drives a router on the
//! in-memory platform with a single-threaded executor.

#![allow(dead_code)]

use fragment_navigator::memory::MemoryPlatform;
use fragment_navigator::{behaviors_fn, NavigationFuture, NavigationResult, Router, RouterConfig};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

pub const ORIGIN: &str = "https://example.com";

/// Route log output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Absolute URL for a site path.
pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Builder for server-rendered pages.
#[derive(Debug, Clone, Default)]
pub struct PageBuilder {
    title: String,
    head: Vec<String>,
    regions: Vec<(String, String)>,
    assets: Vec<String>,
    settings: Option<Value>,
}

impl PageBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Add a region. The `main` region carries the landmark id.
    pub fn region(mut self, name: &str, markup: &str) -> Self {
        self.regions.push((name.to_string(), markup.to_string()));
        self
    }

    pub fn head(mut self, markup: &str) -> Self {
        self.head.push(markup.to_string());
        self
    }

    /// Add an element to the managed assets container.
    pub fn asset(mut self, markup: &str) -> Self {
        self.assets.push(markup.to_string());
        self
    }

    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Settings whose `path.currentPath` is `path`.
    pub fn current_path(self, path: &str) -> Self {
        self.settings(serde_json::json!({ "path": { "currentPath": path } }))
    }

    pub fn build(&self) -> String {
        let mut html = format!("<html><head><title>{}</title>", self.title);
        for markup in &self.head {
            html.push_str(markup);
        }
        html.push_str("</head><body>");
        for (name, markup) in &self.regions {
            if name == "main" {
                html.push_str(&format!(
                    r#"<main id="main-content" data-router-region="main">{markup}</main>"#
                ));
            } else {
                html.push_str(&format!(r#"<div data-router-region="{name}">{markup}</div>"#));
            }
        }
        if !self.assets.is_empty() {
            html.push_str("<div data-router-assets>");
            for markup in &self.assets {
                html.push_str(markup);
            }
            html.push_str("</div>");
        }
        if let Some(settings) = &self.settings {
            html.push_str(&format!(
                r#"<script type="application/json" data-router-settings>{settings}</script>"#
            ));
        }
        html.push_str("</body></html>");
        html
    }
}

/// A page with a `main` region and a shared footer.
pub fn simple_page(title: &str, main: &str) -> String {
    PageBuilder::new(title)
        .region("main", main)
        .region("footer", "<p>Footer</p>")
        .build()
}

/// A router on the in-memory platform plus the executor driving it.
///
/// Page behavior hooks are recorded in `lifecycle` as `"detach"` and
/// `"attach"`.
pub struct Harness {
    pub memory: MemoryPlatform,
    pub router: Router,
    pub pool: LocalPool,
    pub lifecycle: Rc<RefCell<Vec<&'static str>>>,
}

impl Harness {
    /// Start on `path` showing `markup`, with the router initialized.
    pub fn new(path: &str, markup: &str) -> Self {
        Self::with_memory(MemoryPlatform::new(url(path), markup))
    }

    pub fn with_config(path: &str, markup: &str, config: RouterConfig) -> Self {
        let memory = MemoryPlatform::with_config(url(path), markup, &config);
        Self::build(memory, Some(config))
    }

    pub fn with_memory(memory: MemoryPlatform) -> Self {
        Self::build(memory, None)
    }

    fn build(memory: MemoryPlatform, config: Option<RouterConfig>) -> Self {
        init_logging();
        let pool = LocalPool::new();
        let lifecycle = Rc::new(RefCell::new(Vec::new()));
        let (detached, attached) = (Rc::clone(&lifecycle), Rc::clone(&lifecycle));
        let mut builder = Router::builder(memory.platform(Rc::new(pool.spawner()))).behaviors(
            behaviors_fn(
                move |_, _| detached.borrow_mut().push("detach"),
                move |_, _| attached.borrow_mut().push("attach"),
            ),
        );
        if let Some(config) = config {
            builder = builder.config(config);
        }
        let router = builder.build().unwrap();
        router.init();
        Self {
            memory,
            router,
            pool,
            lifecycle,
        }
    }

    /// How many times `hook` ("detach" or "attach") ran.
    pub fn hook_count(&self, hook: &str) -> usize {
        self.lifecycle.borrow().iter().filter(|h| **h == hook).count()
    }

    /// Run `navigation` in the background; the slot fills when it finishes.
    pub fn spawn(&self, navigation: NavigationFuture) -> Rc<RefCell<Option<NavigationResult>>> {
        let slot = Rc::new(RefCell::new(None));
        let out = Rc::clone(&slot);
        self.pool
            .spawner()
            .spawn_local(async move {
                let result = navigation.await;
                *out.borrow_mut() = Some(result);
            })
            .unwrap();
        slot
    }

    /// Drive every spawned task as far as it can go.
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Navigate to `href` and run it to completion.
    pub fn navigate(&mut self, href: &str) -> NavigationResult {
        let slot = self.spawn(self.router.navigate(href));
        self.run();
        let result = slot.borrow_mut().take();
        result.expect("navigation did not finish")
    }
}

/// Take a finished navigation's result out of its slot.
pub fn take(slot: &Rc<RefCell<Option<NavigationResult>>>) -> NavigationResult {
    let result = slot.borrow_mut().take();
    result.expect("navigation did not finish")
}
