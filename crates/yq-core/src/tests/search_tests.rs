//! Tests for search handlers
//!
//! Covers:
//! - Argument precedence: callback < attributes < form
//! - Session id lookup and the deferred first request
//! - Required domain and search text
//! - Pagination bounds and page link activation
//! - Rendering of empty results and the page selector

use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use yq_types::{SearchType, Tag, Tags};

use super::fixtures::{
    FakeTransport, drain_updates, make_page, make_page_with, make_search_response,
};
use crate::config::Settings;
use crate::container::PageLink;
use crate::document::Element;
use crate::host::{DataSource, Host, SESSION_KEY};
use crate::page::PageUpdate;
use crate::registry::InstanceId;

const SEARCH: &str = r#"<div id="youneeq-search"></div>"#;
const ID: InstanceId = InstanceId::Search(0);

fn with_session() -> Host {
    Host::new().with_global_session("global-session-1")
}

#[tokio::test]
async fn test_query_from_page_url() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(SEARCH, with_session(), &transport);
    page.generate().await.unwrap();

    let calls = transport.search_calls();
    assert_eq!(calls.len(), 1);
    let (search_type, query) = &calls[0];
    assert_eq!(*search_type, SearchType::Article);
    assert_eq!(query.search.as_deref(), Some("maple"));
    assert_eq!(query.domain.as_deref(), Some("news.example.com"));
    assert_eq!(query.user_id.as_deref(), Some("global-session-1"));
    assert_eq!(query.page_number, Some(1));
    assert_eq!(query.order_by.as_deref(), Some("relevance"));
}

#[tokio::test]
async fn test_argument_precedence() {
    let transport = FakeTransport::new();
    let host = with_session().with_data_source(
        "searchArgs",
        DataSource::object(json!({
            "search": "from callback",
            "search_form": "#yq-form",
            "orderBy": "date",
            "search_max_age": 10
        })),
    );
    let (mut page, _updates) = make_page(
        r#"<form id="yq-form">
             <input name="q" value="from form">
             <input type="checkbox" name="personalized" value="true">
             <button name="go">Go</button>
           </form>
           <div id="youneeq-search" data-yq-search-function="searchArgs"
                data-yq-search-max-age="30" data-yq-search="from attribute"></div>"#,
        host,
        &transport,
    );
    page.generate().await.unwrap();

    let handler = page.registry().search(0).unwrap();
    assert_eq!(handler.form_id(), Some("yq-form"));
    let query = handler.query();
    assert_eq!(query.search.as_deref(), Some("from form"));
    assert_eq!(query.max_article_age, Some(30));
    assert_eq!(query.order_by.as_deref(), Some("date"));
    // Unchecked boxes are not submitted
    assert!(query.personalized.is_none());
}

#[tokio::test]
async fn test_form_submission_refreshes() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(
        r#"<form id="site-search"><input name="s" value=""></form>
           <div class="youneeq-search" data-yq-search-form-id="site-search"></div>"#,
        with_session(),
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    assert!(page.set_form_field("site-search", "s", "hockey"));
    assert!(!page.set_form_field("site-search", "missing", "x"));
    assert!(!page.set_form_field("other-form", "s", "x"));
    assert_eq!(page.submit_form("#site-search"), 1);
    assert_eq!(page.submit_form("other-form"), 0);

    let calls = transport.search_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1.search.as_deref(), Some("maple"));
    assert_eq!(calls[1].1.search.as_deref(), Some("hockey"));
}

#[tokio::test]
async fn test_explicit_search_text() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(SEARCH, with_session(), &transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;

    assert!(page.search_for(ID, "curling").unwrap());
    assert_eq!(transport.search_calls()[1].1.search.as_deref(), Some("curling"));
    assert!(page.search_for(InstanceId::Recommend(0), "x").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_request_deferred_until_session_id() {
    let transport = FakeTransport::new();
    let host = Host::new();
    let (mut page, mut updates) = make_page(SEARCH, host, &transport);
    page.generate().await.unwrap();

    assert_eq!(transport.session_calls(), 1);
    assert!(transport.search_calls().is_empty());
    assert!(!page.registry().search(0).unwrap().is_waiting_for_id());

    let start = Instant::now();
    page.run_until_idle().await;
    assert!(start.elapsed() >= Duration::from_secs(1));

    let calls = transport.search_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.user_id.as_deref(), Some("session-abcdef"));

    let stored = page.host().session_store().unwrap().get(SESSION_KEY);
    assert_eq!(stored.as_deref(), Some("session-abcdef"));

    // The retried request keeps the tags of the deferred one
    let attached: Vec<Tags> = drain_updates(&mut updates)
        .into_iter()
        .filter_map(|update| match update {
            PageUpdate::SearchPopulateAttach { tags, .. } => Some(tags),
            _ => None,
        })
        .collect();
    assert_eq!(attached, vec![Tags::from([Tag::First])]);
    assert!(page.registry().search(0).unwrap().is_page_nav_bound());
}

#[tokio::test(start_paused = true)]
async fn test_short_session_id_is_not_used() {
    let transport = FakeTransport::new();
    transport.set_session_id("tiny");
    let (mut page, _updates) = make_page(SEARCH, Host::new(), &transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;

    // The deferred request still goes out once, without a visitor id
    let calls = transport.search_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.user_id.is_none());
    assert!(page.host().session_store().unwrap().get(SESSION_KEY).is_none());
}

#[tokio::test]
async fn test_search_needs_domain_and_text() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page_with(
        r#"<div id="youneeq-search" data-yq-domain=""></div>
           <div class="youneeq-search"></div>"#,
        "https://news.example.com/search",
        with_session(),
        Settings::default(),
        &transport,
    );
    page.generate().await.unwrap();

    // Empty domain, then no search text anywhere
    assert!(transport.search_calls().is_empty());
    assert!(!page.registry().search(0).unwrap().is_loading());
    assert!(!page.registry().search(1).unwrap().is_loading());
}

#[tokio::test]
async fn test_pagination_bounds() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(SEARCH, with_session(), &transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let handler = page.registry().search(0).unwrap();
    assert_eq!(handler.results_count(), 95);
    assert_eq!(handler.page_count(), 10);
    assert!(handler.is_page_nav_bound());

    assert!(!page.search_page(ID, PageLink::Prev).unwrap());
    assert!(!page.search_page(ID, PageLink::Page(11)).unwrap());
    assert!(!page.search_page(ID, PageLink::Page(0)).unwrap());

    assert!(page.search_page(ID, PageLink::Next).unwrap());
    page.run_until_idle().await;
    assert!(page.search_last_page(ID).unwrap());
    page.run_until_idle().await;
    assert!(!page.search_page(ID, PageLink::Next).unwrap());
    assert!(page.search_page(ID, PageLink::Page(4)).unwrap());
    page.run_until_idle().await;
    assert!(page.search_first_page(ID).unwrap());

    let pages: Vec<_> = transport
        .search_calls()
        .iter()
        .map(|(_, q)| q.page_number.unwrap())
        .collect();
    assert_eq!(pages, vec![1, 2, 10, 4, 1]);
    assert!(page.search_page(InstanceId::Recommend(0), PageLink::Next).is_err());
}

#[tokio::test]
async fn test_image_search_page_size() {
    let transport = FakeTransport::new();
    transport.set_search_response(make_search_response(25, 12));
    let (mut page, _updates) = make_page(
        r#"<div id="youneeq-search" data-yq-search-type="image"></div>"#,
        with_session(),
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let handler = page.registry().search(0).unwrap();
    assert_eq!(handler.search_type(), SearchType::Image);
    assert_eq!(handler.page_count(), 3);
    assert_eq!(transport.search_calls()[0].0, SearchType::Image);
}

#[tokio::test]
async fn test_page_links_wait_for_first_render() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page("", with_session(), &transport);
    let id = page
        .add_search(Element::new("youneeq-search").with_attr("data-yq-search", "tide"))
        .unwrap();
    assert!(page.request(id, Tags::new()).unwrap());
    page.run_until_idle().await;

    assert!(!page.registry().search(0).unwrap().is_page_nav_bound());
    assert!(!page.search_page(id, PageLink::Next).unwrap());

    assert!(page.request(id, Tags::from([Tag::First])).unwrap());
    page.run_until_idle().await;
    assert!(page.search_page(id, PageLink::Next).unwrap());
}

#[tokio::test]
async fn test_render_results_and_selector() {
    let transport = FakeTransport::new();
    let (mut page, mut updates) = make_page(
        r#"<div id="youneeq-search" data-yq-next-msg="More" data-yq-prev-msg="Back"></div>"#,
        with_session(),
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let container = page.registry().search(0).unwrap().container();
    assert_eq!(container.markup().matches(r#"class="yqs-article""#).count(), 10);
    assert!(container.markup().contains(">More</a>"));
    assert!(container.markup().contains(">Back</span>"));
    let links = container.page_links();
    assert!(links.contains(&PageLink::Next));
    assert!(links.contains(&PageLink::Page(10)));
    assert!(!links.contains(&PageLink::Page(1)));

    let updates = drain_updates(&mut updates);
    assert!(matches!(updates[0], PageUpdate::SearchPopulatePrepare { .. }));
    assert!(matches!(updates[1], PageUpdate::SearchPopulateAttach { .. }));
}

#[tokio::test]
async fn test_render_no_results_message() {
    let transport = FakeTransport::new();
    transport.set_search_response(make_search_response(0, 0));
    let (mut page, _updates) = make_page(
        r#"<div id="youneeq-search" data-yq-no-results-msg="Nothing for <%1>"></div>"#,
        with_session(),
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let handler = page.registry().search(0).unwrap();
    assert_eq!(handler.page_count(), 0);
    assert!(
        handler
            .container()
            .markup()
            .starts_with("Nothing for &lt;maple&gt;")
    );
}

#[tokio::test]
async fn test_search_failure_reports_and_stays_loading() {
    let transport = FakeTransport::failing();
    let (mut page, mut updates) = make_page(SEARCH, with_session(), &transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;

    assert!(page.registry().search(0).unwrap().is_loading());
    assert!(matches!(
        &drain_updates(&mut updates)[..],
        [PageUpdate::RequestFailed { instance: ID, .. }]
    ));
}
