//! History entries, popstate replay and scroll restoration.

mod common;

use common::{simple_page, url, Harness, PageBuilder};
use fragment_navigator::{ClickEvent, Document, History, NavigationResult};

fn harness() -> Harness {
    let h = Harness::new("/", &simple_page("Home", "<p>Home</p>"));
    h.memory.fetcher.respond_html("/a", simple_page("A", "<p>A</p>"));
    h.memory.fetcher.respond_html(
        "/b",
        PageBuilder::new("B")
            .region("main", r#"<h2 id="details">Details</h2>"#)
            .region("footer", "<p>Footer</p>")
            .build(),
    );
    h
}

#[test]
fn test_pushes_one_entry_per_navigation() {
    let mut h = harness();
    h.navigate("/a");
    h.navigate("/b");

    let history = &h.memory.history;
    assert_eq!(history.len(), 3);
    assert_eq!(history.index(), 2);
    assert_eq!(history.current_url(), url("/b"));
    let entry = history.state().unwrap();
    assert_eq!(entry.route_url, url("/b").to_string());
    assert_eq!(entry.title, "B");
}

#[test]
fn test_pushed_entry_carries_the_route_title() {
    let mut h = harness();
    h.memory.fetcher.respond_html(
        "/untitled",
        PageBuilder::new("").region("main", "<p>Untitled</p>").build(),
    );
    h.navigate("/a");
    h.navigate("/untitled");

    // The document keeps the previous title, the entry does not inherit it.
    assert_eq!(h.memory.document.title(), "A");
    assert_eq!(h.memory.history.state().unwrap().title, "");
    assert_eq!(h.memory.history.entry(1).unwrap().title, "A");
}

#[test]
fn test_leaving_a_page_records_its_scroll_position() {
    let mut h = harness();
    h.navigate("/a");
    h.memory.document.set_scroll_y(250.0);
    h.navigate("/b");

    let left = h.memory.history.entry(1).unwrap();
    assert_eq!(left.route_url, url("/a").to_string());
    assert_eq!(left.title, "A");
    assert_eq!(left.scroll_position, 250.0);
}

#[test]
fn test_popstate_restores_content_and_scroll_without_pushing() {
    let mut h = harness();
    h.navigate("/a");
    h.memory.document.set_scroll_y(250.0);
    h.navigate("/b");
    assert_eq!(h.memory.document.scroll_y(), 0.0);

    let state = h.memory.history.back().unwrap();
    assert!(h.router.handle_popstate(state));
    h.run();

    let document = &h.memory.document;
    assert_eq!(document.region_html("main").as_deref(), Some("<p>A</p>"));
    assert_eq!(document.title(), "A");
    assert_eq!(document.scroll_y(), 250.0);
    assert_eq!(h.memory.history.len(), 3);
    assert_eq!(h.memory.history.index(), 1);
    // Both routes were cached, nothing was refetched.
    assert_eq!(h.memory.fetcher.request_count("/a"), 1);
}

#[test]
fn test_popstate_forward_after_back() {
    let mut h = harness();
    h.navigate("/a");
    h.navigate("/b");

    let state = h.memory.history.back().unwrap();
    h.router.handle_popstate(state);
    h.run();
    let state = h.memory.history.forward().unwrap();
    h.router.handle_popstate(state);
    h.run();

    assert_eq!(h.memory.document.title(), "B");
    assert_eq!(h.memory.history.len(), 3);
}

#[test]
fn test_popstate_without_router_state_is_ignored() {
    let mut h = harness();
    h.navigate("/a");
    assert!(!h.router.popstate(None).is_handled());
    assert!(!h.router.handle_popstate(None));
}

#[test]
fn test_hash_scrolls_to_element_on_fresh_navigation() {
    let mut h = harness();
    let result = h.navigate("/b#details");

    assert!(result.is_completed());
    assert_eq!(h.memory.document.scrolled_into_view().as_deref(), Some("details"));
    assert_eq!(h.memory.document.focused().as_deref(), Some("details"));
    assert_eq!(h.memory.history.current_url(), url("/b#details"));
}

#[test]
fn test_missing_hash_target_focuses_main() {
    let mut h = harness();
    h.navigate("/a#nowhere");

    assert_eq!(h.memory.document.scrolled_into_view(), None);
    assert_eq!(h.memory.document.focused().as_deref(), Some("main-content"));
}

#[test]
fn test_same_page_hash_stays_in_page() {
    let mut h = harness();
    h.navigate("/b");
    let requests = h.memory.fetcher.requests().len();

    let result = h.navigate("#details");

    assert_eq!(
        result,
        NavigationResult::InPage {
            url: url("/b#details").to_string()
        }
    );
    assert_eq!(h.memory.document.scrolled_into_view().as_deref(), Some("details"));
    assert_eq!(h.memory.fetcher.requests().len(), requests);
    assert_eq!(h.memory.history.len(), 2);
}

#[test]
fn test_same_page_hash_click_is_left_to_the_browser() {
    let mut h = harness();
    h.navigate("/b");
    assert!(!h.router.click(&ClickEvent::primary("#details")).is_handled());
}

#[test]
fn test_navigating_to_current_url_stays() {
    let mut h = harness();
    h.navigate("/a");
    let result = h.navigate("/a");

    assert!(matches!(result, NavigationResult::InPage { .. }));
    assert_eq!(h.memory.history.len(), 2);
}
