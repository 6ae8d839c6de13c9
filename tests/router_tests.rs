//! Router lifecycle, active links, prefetching and click handling.

mod common;

use common::{init_logging, simple_page, url, Harness, PageBuilder};
use fragment_navigator::dom::Element;
use fragment_navigator::memory::MemoryPlatform;
use fragment_navigator::{
    behaviors_fn, transition_fn, ClickEvent, ConfigError, Document, NavigationPhase, PathSettings,
    Router,
};
use futures::executor::LocalPool;
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;

const HOME_WITH_MENU: &str = r#"<html><head><title>Home</title></head><body>
<nav>
<a id="link-home" href="/" data-link-system-path="&lt;front&gt;">Home</a>
<a id="link-a" href="/a" data-link-system-path="a">A</a>
</nav>
<main id="main-content" data-router-region="main"><p>Home</p></main>
<script type="application/json" data-router-settings>{"path":{"currentPath":"node","isFront":true}}</script>
</body></html>"#;

fn active_count(el: &Element) -> usize {
    el.classes().filter(|class| *class == "is-active").count()
}

fn link(h: &Harness, id: &str) -> Element {
    h.memory.document.element_by_id(id).unwrap()
}

#[test]
fn test_init_caches_the_current_page() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    assert!(h.router.is_cached("/"));

    h.navigate("/a");
    let result = h.navigate("/");

    assert!(result.is_completed());
    assert_eq!(h.memory.document.region_html("main").as_deref(), Some("<p>Home</p>"));
    assert_eq!(h.memory.fetcher.request_count("/"), 0);
}

#[test]
fn test_init_skips_pages_with_deferred_placeholders() {
    let page = simple_page(
        "Home",
        r#"<span data-big-pipe-placeholder-id="callback=x"></span>"#,
    );
    let h = Harness::new("/", &page);
    assert!(!h.router.is_cached("/"));
}

#[test]
fn test_init_twice_is_harmless() {
    let h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.router.init();
    assert_eq!(h.router.navigator().cache().len(), 1);
}

#[test]
fn test_init_seeds_existing_scripts() {
    let mut h = Harness::new(
        "/",
        &PageBuilder::new("Home")
            .head(r#"<script src="/core.js"></script>"#)
            .region("main", "<p>Home</p>")
            .build(),
    );
    h.memory.fetcher.respond_html(
        "/a",
        PageBuilder::new("A")
            .head(r#"<script src="/core.js"></script>"#)
            .head(r#"<script src="/a.js"></script>"#)
            .region("main", "<p>A</p>")
            .build(),
    );

    h.navigate("/a");

    assert_eq!(h.memory.document.inserted_scripts(), vec!["/a.js"]);
}

#[test]
fn test_active_links_follow_navigation() {
    let mut h = Harness::new("/", HOME_WITH_MENU);
    h.memory.fetcher.respond_html(
        "/a",
        PageBuilder::new("A").region("main", "<p>A</p>").current_path("a").build(),
    );

    h.navigate("/a");
    let a = link(&h, "link-a");
    assert_eq!(active_count(&a), 1);
    assert_eq!(a.attr("aria-current"), Some("page"));
    assert_eq!(active_count(&link(&h, "link-home")), 0);

    h.navigate("/");
    assert_eq!(active_count(&link(&h, "link-a")), 0);
    assert_eq!(link(&h, "link-a").attr("aria-current"), None);
    assert_eq!(active_count(&link(&h, "link-home")), 1);
}

#[test]
fn test_active_links_are_idempotent() {
    let h = Harness::new("/", HOME_WITH_MENU);
    let path = PathSettings::new("a");

    h.router.events().emit_routed(&path);
    let once = h.memory.document.count(&|el| el.has_class("is-active"));
    h.router.events().emit_routed(&path);
    let twice = h.memory.document.count(&|el| el.has_class("is-active"));

    assert_eq!(once, 1);
    assert_eq!(twice, once);
    assert_eq!(active_count(&link(&h, "link-a")), 1);
}

#[test]
fn test_fetched_regions_carry_active_links() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html(
        "/a",
        PageBuilder::new("A")
            .region("main", r#"<a id="inner" href="/a" data-link-system-path="a">Self</a>"#)
            .current_path("a")
            .build(),
    );

    h.navigate("/a");

    assert_eq!(active_count(&link(&h, "inner")), 1);
}

#[test]
fn test_hover_prefetches_one_at_a_time() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    h.memory.fetcher.respond_html("/b", simple_page("B", "<p>B</p>"));
    h.memory.fetcher.hold("/a");

    assert!(h.router.handle_hover("/a"));
    assert!(!h.router.handle_hover("/b"));
    h.run();
    assert!(h.router.is_cached("/a"));

    h.memory.fetcher.release("/a");
    h.run();
    assert!(h.router.handle_hover("/b"));
    h.run();

    let result = h.navigate("/a");
    assert!(result.is_completed());
    assert_eq!(h.memory.fetcher.request_count("/a"), 1);
    assert_eq!(h.memory.fetcher.request_count("/b"), 1);
    // Already cached.
    assert!(!h.router.handle_hover("/b"));
}

#[test]
fn test_navigation_joins_a_running_prefetch() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    h.memory.fetcher.hold("/a");

    h.router.handle_hover("/a");
    let navigation = h.spawn(h.router.navigate("/a"));
    h.run();
    h.memory.fetcher.release("/a");
    h.run();

    assert!(common::take(&navigation).is_completed());
    assert_eq!(h.memory.fetcher.request_count("/a"), 1);
}

#[test]
fn test_hover_ignored_while_navigating() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    h.memory.fetcher.hold("/a");

    let _navigation = h.spawn(h.router.navigate("/a"));
    h.run();
    assert_eq!(h.router.phase(), NavigationPhase::Fetching);
    assert!(!h.router.handle_hover("/b"));
}

#[test]
fn test_click_filters() {
    let h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));

    let mut ctrl = ClickEvent::primary("/a");
    ctrl.ctrl_key = true;
    let mut blank = ClickEvent::primary("/a");
    blank.target = Some("_blank".to_string());
    let mut download = ClickEvent::primary("/a");
    download.download = true;
    let mut prevented = ClickEvent::primary("/a");
    prevented.default_prevented = true;

    for event in [ctrl, blank, download, prevented] {
        assert!(!h.router.handle_click(&event), "{event:?} should be ignored");
    }
    assert!(h.router.handle_click(&ClickEvent::primary("/a")));
}

#[test]
fn test_forget_and_clear_cache() {
    let mut h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    h.navigate("/a");

    assert!(h.router.forget("/a"));
    assert!(!h.router.forget("/a"));
    h.navigate("/");
    h.navigate("/a");
    assert_eq!(h.memory.fetcher.request_count("/a"), 2);

    h.router.clear_cache();
    assert!(!h.router.is_cached("/"));
}

#[test]
fn test_dispose_tears_down() {
    let mut h = Harness::new("/", HOME_WITH_MENU);
    h.memory.fetcher.respond_html(
        "/a",
        PageBuilder::new("A").region("main", "<p>A</p>").current_path("a").build(),
    );
    h.router.dispose();
    assert!(h.router.navigator().cache().is_empty());

    h.navigate("/a");
    // Active links are no longer maintained.
    assert_eq!(active_count(&link(&h, "link-a")), 0);
}

#[test]
fn test_behaviors_and_transition_order() {
    init_logging();
    let memory = MemoryPlatform::new(url("/"), &simple_page("Home", "<p>Home</p>"));
    memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    let calls = Rc::new(RefCell::new(Vec::<String>::new()));

    let (detach, attach) = (Rc::clone(&calls), Rc::clone(&calls));
    let (exit, enter) = (Rc::clone(&calls), Rc::clone(&calls));
    let document = Rc::clone(&memory.document);

    let mut pool = LocalPool::new();
    let router = Router::builder(memory.platform(Rc::new(pool.spawner())))
        .behaviors(behaviors_fn(
            move |regions, _| detach.borrow_mut().push(format!("detach {}", regions.join(","))),
            move |regions, _| attach.borrow_mut().push(format!("attach {}", regions.join(","))),
        ))
        .transition(transition_fn(
            move || {
                let exit = Rc::clone(&exit);
                async move { exit.borrow_mut().push("exit".to_string()) }.boxed_local()
            },
            move || {
                let title = document.title();
                enter.borrow_mut().push(format!("enter {title}"));
            },
        ))
        .build()
        .unwrap();
    router.init();

    let result = pool.run_until(router.navigate("/a"));

    assert!(result.is_completed());
    assert_eq!(
        *calls.borrow(),
        vec!["detach main,footer", "exit", "attach main,footer", "enter A"]
    );
}

#[test]
fn test_config_is_read_from_page_settings() {
    init_logging();
    let page = PageBuilder::new("Home")
        .region("main", "<p>Home</p>")
        .settings(serde_json::json!({ "router": { "mainContentId": "content" } }))
        .build();
    let memory = MemoryPlatform::new(url("/"), &page);
    let pool = LocalPool::new();
    let router = Router::builder(memory.platform(Rc::new(pool.spawner())))
        .build()
        .unwrap();

    assert_eq!(router.config().main_content_id, "content");
    assert_eq!(router.config().region_attribute, "data-router-region");
}

#[test]
fn test_conflicting_admin_patterns_are_rejected() {
    let memory = MemoryPlatform::new(url("/"), &simple_page("Home", "<p>Home</p>"));
    let pool = LocalPool::new();
    let config = fragment_navigator::RouterConfig::new().admin_patterns(["/admin", "/admin"]);
    let err = Router::builder(memory.platform(Rc::new(pool.spawner())))
        .config(config)
        .build()
        .unwrap_err();

    assert!(matches!(err, ConfigError::AdminPattern { .. }));
}
