//! Tests for page discovery and the recommend request lifecycle
//!
//! Covers:
//! - Discovery order by priority, recommend before search
//! - `yq-no-auto` on the page root and on single containers
//! - One outstanding request per handler
//! - Full variant for the first request, lite afterwards
//! - End-to-end request body for a configured container
//! - Failure handling with and without `unlockOnError`

use futures_util::FutureExt;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use yq_client::Transport;
use yq_types::{RequestVariant, Tag, Tags};

use super::fixtures::{
    FakeTransport, PAGE_URL, drain_updates, make_page, make_page_with, make_recommend_response,
};
use crate::Error;
use crate::args::Args;
use crate::config::Settings;
use crate::document::{ContainerKind, Document, Element};
use crate::host::Host;
use crate::page::{Discovery, Page, PageUpdate};
use crate::registry::InstanceId;

const CONFIGURED: &str = r#"<div id="youneeq"
    data-yq-suggest-count="5"
    data-yq-content-id="42"
    data-yq-observe="true"
    data-yq-observe-title="Hello"></div>"#;

#[tokio::test]
async fn test_discovery_order() {
    let transport = FakeTransport::new();
    let host = Host::new().with_global_session("global-session-1");
    let (mut page, _updates) = make_page(
        r#"<div class="youneeq" data-yq-priority="5" data-yq-suggest-count="2"></div>
           <div id="youneeq-search"></div>
           <youneeq-section data-yq-priority="-1" data-yq-suggest-count="4"></youneeq-section>
           <div class="youneeq" data-yq-priority="5" data-yq-suggest-count="3"></div>"#,
        host,
        &transport,
    );

    let ids = page.generate().await.unwrap();
    assert_eq!(
        ids,
        vec![
            InstanceId::Recommend(0),
            InstanceId::Recommend(1),
            InstanceId::Recommend(2),
            InstanceId::Search(0),
        ]
    );

    let registry = page.registry();
    let counts: Vec<_> = registry
        .recommend_handlers()
        .map(|h| h.suggest().unwrap().count.clone())
        .collect();
    // Lowest priority first, ties keep document order
    assert_eq!(counts, vec!["4", "2", "3"]);
    assert_eq!(registry.recommend(0).unwrap().container().element().tag, "youneeq-section");
    assert_eq!(registry.len(), 4);

    assert_eq!(transport.recommend_calls().len(), 3);
    assert_eq!(transport.search_calls().len(), 1);
}

#[tokio::test]
async fn test_first_request_tags() {
    let transport = FakeTransport::new();
    let host = Host::new().with_global_session("global-session-1");
    let (mut page, mut updates) = make_page(
        r#"<div id="youneeq" data-yq-suggest-count="2"></div>
           <div id="youneeq-search"></div>"#,
        host,
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let updates = drain_updates(&mut updates);
    assert!(updates.iter().any(|u| matches!(
        u,
        PageUpdate::PopulateAttach { instance: InstanceId::Recommend(0), tags, .. }
            if *tags == Tags::from([Tag::First, Tag::Observe])
    )));
    assert!(updates.iter().any(|u| matches!(
        u,
        PageUpdate::SearchPopulateAttach { instance: InstanceId::Search(0), tags, .. }
            if *tags == Tags::from([Tag::First])
    )));
}

#[tokio::test]
async fn test_no_auto_on_page_root() {
    let transport = FakeTransport::new();
    let html = format!(r#"<html class="yq-no-auto"><body>{CONFIGURED}</body></html>"#);
    let document = Document::parse(&html, PAGE_URL).unwrap();
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let (mut page, _updates) =
        Page::new(document, Settings::default(), Host::new(), dyn_transport);

    let ids = page.generate().await.unwrap();
    assert!(ids.is_empty());
    assert!(page.registry().is_empty());
    assert!(transport.recommend_calls().is_empty());

    // Manual construction still works
    let element = page
        .document()
        .containers(ContainerKind::Recommend)
        .next()
        .cloned()
        .unwrap();
    let id = page.add_recommend(element, Args::new()).unwrap();
    assert!(page.request(id, Tags::from([Tag::First])).unwrap());
    assert_eq!(transport.recommend_calls().len(), 1);
}

#[tokio::test]
async fn test_container_opt_out_initializes_without_request() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(
        r#"<div class="youneeq yq-no-auto" data-yq-suggest-count="2"></div>"#,
        Host::new(),
        &transport,
    );

    let ids = page.generate().await.unwrap();
    assert_eq!(ids, vec![InstanceId::Recommend(0)]);
    assert!(transport.recommend_calls().is_empty());
    assert!(page.registry().recommend(0).unwrap().suggest().is_some());
}

#[tokio::test]
async fn test_manual_discovery_waits_for_host_ready() {
    let transport = FakeTransport::new();
    let loaded = Arc::new(AtomicBool::new(false));
    let flag = loaded.clone();
    let host = Host::new().with_ready(
        async move {
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
        }
        .boxed(),
    );
    let (mut page, _updates) = make_page(CONFIGURED, host, &transport);

    let ids = page.generate_with(Discovery::Manual).await.unwrap();
    assert!(ids.is_empty());
    assert!(loaded.load(Ordering::SeqCst));
    assert!(transport.recommend_calls().is_empty());
}

#[tokio::test]
async fn test_one_outstanding_request_per_handler() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(CONFIGURED, Host::new(), &transport);
    let ids = page.generate().await.unwrap();
    let id = ids[0];

    assert!(page.registry().recommend(0).unwrap().is_loading());
    assert!(!page.request(id, Tags::new()).unwrap());
    assert!(!page.request(id, Tags::from([Tag::Scroll])).unwrap());
    assert_eq!(transport.recommend_calls().len(), 1);

    page.run_until_idle().await;
    assert!(!page.registry().recommend(0).unwrap().is_loading());

    assert!(page.request(id, Tags::new()).unwrap());
    let calls = transport.recommend_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, RequestVariant::Full);
    assert_eq!(calls[1].1, RequestVariant::Lite);
}

#[tokio::test]
async fn test_end_to_end_request_body() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(CONFIGURED, Host::new(), &transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;

    let calls = transport.recommend_calls();
    let (request, _) = &calls[0];
    assert_eq!(
        serde_json::to_value(request).unwrap(),
        json!({
            "content_id": "42",
            "content_type": "article",
            "alt_href": "https://news.example.com/maple-syrup",
            "suggest": [{
                "type": "node",
                "count": "5",
                "is_panel_detailed": "true",
                "isAllClientDomains": "false"
            }],
            "observe": [{
                "type": "node",
                "title": "Hello"
            }]
        })
    );

    // Without the observe tag the observe payload stays home
    page.request(InstanceId::Recommend(0), Tags::new()).unwrap();
    let calls = transport.recommend_calls();
    let (request, _) = &calls[1];
    assert!(request.observe.is_none());
    assert!(request.suggest.is_some());
}

#[tokio::test]
async fn test_response_renders_and_binds_tracker() {
    let transport = FakeTransport::new();
    transport.set_recommend_response(make_recommend_response(&["x1", "x2"]));
    let (mut page, mut updates) = make_page(CONFIGURED, Host::new(), &transport);
    page.generate().await.unwrap();

    assert!(!page.registry().recommend(0).unwrap().is_tracking_bound());
    page.run_until_idle().await;

    let handler = page.registry().recommend(0).unwrap();
    assert!(handler.is_tracking_bound());
    assert!(handler.container().markup().contains("Story x1"));
    assert_eq!(handler.tracked_links().len(), 2);

    let updates = drain_updates(&mut updates);
    assert!(matches!(updates[0], PageUpdate::PopulatePrepare { .. }));
    assert!(matches!(updates[1], PageUpdate::PopulateAttach { .. }));
}

#[tokio::test]
async fn test_failure_keeps_handler_loading() {
    let transport = FakeTransport::failing();
    let (mut page, mut updates) = make_page(CONFIGURED, Host::new(), &transport);
    let ids = page.generate().await.unwrap();
    page.run_until_idle().await;

    assert!(page.registry().recommend(0).unwrap().is_loading());
    let updates = drain_updates(&mut updates);
    assert!(matches!(
        &updates[..],
        [PageUpdate::RequestFailed { instance: InstanceId::Recommend(0), .. }]
    ));

    // Wedged: later requests are dropped even once the service recovers
    transport.set_failing(false);
    assert!(!page.request(ids[0], Tags::new()).unwrap());
    assert_eq!(transport.recommend_calls().len(), 1);
}

#[tokio::test]
async fn test_failure_unlocks_when_configured() {
    let transport = FakeTransport::failing();
    let mut settings = Settings::default();
    settings.api.unlock_on_error = true;
    let (mut page, _updates) =
        make_page_with(CONFIGURED, PAGE_URL, Host::new(), settings, &transport);
    let ids = page.generate().await.unwrap();
    page.run_until_idle().await;

    assert!(!page.registry().recommend(0).unwrap().is_loading());
    transport.set_failing(false);
    assert!(page.request(ids[0], Tags::new()).unwrap());
}

#[tokio::test]
async fn test_refresh_all_recollects_configuration() {
    let transport = FakeTransport::new();
    let host = Host::new().with_global_session("global-session-1");
    let (mut page, _updates) = make_page(
        r#"<div id="youneeq" data-yq-suggest-count="2"></div>
           <div class="youneeq-search"></div>"#,
        host,
        &transport,
    );
    page.generate().await.unwrap();
    page.run_until_idle().await;

    assert_eq!(page.refresh_all(), 2);
    assert_eq!(transport.recommend_calls().len(), 2);
    assert_eq!(transport.search_calls().len(), 2);
}

#[tokio::test]
async fn test_construction_errors() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page("", Host::new(), &transport);

    let err = page
        .add_recommend(Element::new("div").with_attr("class", "sidebar"), Args::new())
        .unwrap_err();
    assert!(matches!(err, Error::NotAContainer("recommendation")));

    let err = page.add_search(Element::new("youneeq-section")).unwrap_err();
    assert!(matches!(err, Error::NotAContainer("search")));

    let err = page.request(InstanceId::Search(3), Tags::new()).unwrap_err();
    assert!(matches!(err, Error::UnknownInstance(_)));
}

#[tokio::test]
async fn test_base_args_are_overridden_by_attributes() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page("", Host::new(), &transport);

    let element = Element::new("div")
        .with_attr("class", "youneeq")
        .with_attr("data-yq-suggest-count", "7");
    let base: Args = [("suggest_count", "3"), ("suggest_categories", "news|sports")]
        .into_iter()
        .collect();
    page.add_recommend(element, base).unwrap();

    let suggest = page.registry().recommend(0).unwrap().suggest().unwrap();
    assert_eq!(suggest.count, "7");
    assert_eq!(
        suggest.categories,
        Some(vec!["news".to_string(), "sports".to_string()])
    );
}
