//! Tests for click tracking on rendered recommendations
//!
//! Covers:
//! - Deferred navigation after delivery or the timeout, exactly once
//! - Immediate navigation with beacon transport
//! - `no-google-analytics` still reporting the panel click
//! - Non-primary buttons
//! - Tracking overrides

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::fixtures::{Delivery, FakeTransport, RecordingNavigator, RecordingSink, make_page};
use crate::container::TrackedLink;
use crate::host::{Host, TrackingTarget};
use crate::page::Page;
use crate::registry::InstanceId;
use crate::tracking::{MouseButton, Navigation};

const ID: InstanceId = InstanceId::Recommend(0);
const STORY_B: &str = "https://news.example.com/b";
const PLAIN: &str = r#"<div id="youneeq" data-yq-suggest-count="3"></div>"#;

async fn rendered_page(body: &str, host: Host, transport: &Arc<FakeTransport>) -> Page {
    let (mut page, _updates) = make_page(body, host, transport);
    page.generate().await.unwrap();
    page.run_until_idle().await;
    page
}

fn tracked_host(delivery: Delivery) -> (Host, Arc<RecordingSink>, Arc<RecordingNavigator>) {
    let sink = RecordingSink::new(delivery);
    let navigator = RecordingNavigator::new();
    let host = Host::new()
        .with_analytics("ga", sink.clone())
        .with_navigator(navigator.clone());
    (host, sink, navigator)
}

#[tokio::test]
async fn test_click_before_render_is_untracked() {
    let transport = FakeTransport::new();
    let (mut page, _updates) = make_page(PLAIN, Host::new(), &transport);
    page.generate().await.unwrap();

    assert!(page.click(ID, 0, MouseButton::Primary).is_none());
    assert!(page.click(InstanceId::Search(0), 0, MouseButton::Primary).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deferred_navigation_on_timeout() {
    let transport = FakeTransport::new();
    let (host, sink, navigator) = tracked_host(Delivery::Never);
    let mut page = rendered_page(PLAIN, host, &transport).await;

    let outcome = page.click(ID, 1, MouseButton::Primary).unwrap();
    assert!(outcome.prevent_default);
    assert_eq!(outcome.navigation, Navigation::Deferred(STORY_B.to_string()));
    assert!(navigator.urls().is_empty());

    let start = Instant::now();
    page.run_until_idle().await;
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(navigator.urls(), vec![STORY_B]);

    let hits = sink.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "send");
    assert_eq!(hits[0].1.event_category.as_deref(), Some("Articles"));
    assert_eq!(hits[0].1.event_action.as_deref(), Some("Youneeq View"));
    assert_eq!(hits[0].1.event_label.as_deref(), Some(STORY_B));
    assert!(hits[0].1.transport.is_none());

    let clicks = transport.panel_clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].url, STORY_B);
    assert_eq!(clicks[0].title, "Story b");
    assert_eq!(clicks[0].id, "b");
}

#[tokio::test(start_paused = true)]
async fn test_deferred_navigation_after_delivery() {
    let transport = FakeTransport::new();
    let (host, _sink, navigator) = tracked_host(Delivery::After(Duration::from_millis(200)));
    let mut page = rendered_page(PLAIN, host, &transport).await;

    page.click(ID, 1, MouseButton::Primary).unwrap();
    let start = Instant::now();
    page.run_until_idle().await;

    assert!(start.elapsed() < Duration::from_secs(1));
    // The timeout losing the race does not navigate a second time
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(navigator.urls(), vec![STORY_B]);
}

#[tokio::test]
async fn test_beacon_navigates_immediately() {
    let transport = FakeTransport::new();
    let (host, sink, navigator) = tracked_host(Delivery::Never);
    let mut page = rendered_page(PLAIN, host.with_beacon(true), &transport).await;

    let outcome = page.click(ID, 0, MouseButton::Primary).unwrap();
    assert_eq!(
        outcome.navigation,
        Navigation::Immediate("https://news.example.com/a".to_string())
    );
    assert_eq!(navigator.urls(), vec!["https://news.example.com/a"]);
    assert_eq!(sink.hits()[0].1.transport.as_deref(), Some("beacon"));
}

#[tokio::test]
async fn test_tracker_name_prefixes_command() {
    let transport = FakeTransport::new();
    let (host, sink, _navigator) = tracked_host(Delivery::Immediate);
    let mut page = rendered_page(
        r#"<div id="youneeq" data-yq-suggest-count="3" data-yq-ga-tracker="yqTracker"></div>"#,
        host,
        &transport,
    )
    .await;

    page.click(ID, 2, MouseButton::Primary).unwrap();
    page.run_until_idle().await;
    assert_eq!(sink.hits()[0].0, "yqTracker.send");
}

#[tokio::test]
async fn test_no_google_analytics_still_reports_click() {
    let transport = FakeTransport::new();
    let (host, sink, navigator) = tracked_host(Delivery::Never);
    let mut page = rendered_page(
        r#"<div id="youneeq" data-yq-suggest-count="3"
            data-yq-features="no-google-analytics"></div>"#,
        host,
        &transport,
    )
    .await;

    let outcome = page.click(ID, 0, MouseButton::Primary).unwrap();
    assert!(matches!(outcome.navigation, Navigation::Immediate(_)));
    assert_eq!(navigator.urls().len(), 1);
    assert!(sink.hits().is_empty());
    assert_eq!(transport.panel_clicks().len(), 1);
}

#[tokio::test]
async fn test_middle_click_leaves_navigation_to_browser() {
    let transport = FakeTransport::new();
    let (host, sink, navigator) = tracked_host(Delivery::Never);
    let mut page = rendered_page(PLAIN, host, &transport).await;

    let outcome = page.click(ID, 0, MouseButton::Auxiliary).unwrap();
    assert!(!outcome.prevent_default);
    assert_eq!(outcome.navigation, Navigation::None);
    assert_eq!(sink.hits().len(), 1);
    assert_eq!(transport.panel_clicks().len(), 1);
    assert!(navigator.urls().is_empty());
}

#[tokio::test]
async fn test_unknown_link_index_is_untracked() {
    let transport = FakeTransport::new();
    let mut page = rendered_page(PLAIN, Host::new(), &transport).await;
    assert!(page.click(ID, 3, MouseButton::Primary).is_none());
    assert!(transport.panel_clicks().is_empty());
}

#[tokio::test]
async fn test_override_replaces_sink() {
    let transport = FakeTransport::new();
    let default_sink = RecordingSink::new(Delivery::Immediate);
    let other_sink = RecordingSink::new(Delivery::Immediate);
    let host = Host::new()
        .with_analytics("ga", default_sink.clone())
        .with_analytics("gtagProxy", other_sink.clone())
        .with_tracking_override(
            "routeClicks",
            Arc::new(|link: Option<&TrackedLink>, _target: &TrackingTarget| TrackingTarget {
                sink: link.map(|_| "gtagProxy".to_string()),
                command: None,
            }),
        );
    let mut page = rendered_page(
        r#"<div id="youneeq" data-yq-suggest-count="3"
            data-yq-ga-override-function="routeClicks"></div>"#,
        host,
        &transport,
    )
    .await;

    page.click(ID, 0, MouseButton::Primary).unwrap();
    page.run_until_idle().await;

    assert!(default_sink.hits().is_empty());
    let hits = other_sink.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "send");
}
