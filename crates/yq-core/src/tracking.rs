//! Click and analytics tracking for rendered results.
//!
//! Every click on a tracked link reports a panel click to the service and,
//! unless analytics is disabled, an "Articles / Youneeq View" event to the
//! page analytics function. A primary click then navigates: immediately when
//! the host can deliver hits asynchronously, otherwise once the hit is
//! delivered or the navigation timeout expires, whichever comes first.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use yq_types::{AnalyticsHit, PanelClick};

use crate::args::Args;
use crate::container::TrackedLink;
use crate::dispatch::Dispatcher;
use crate::host::{AnalyticsSink, Host, Navigator, TrackingTarget};

const VIEW_ACTION: &str = "Youneeq View";
const SCROLLED_VIEW_ACTION: &str = "Scrolled View";

/// Analytics configuration of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Name of the analytics function.
    pub function: String,
    /// Tracker name, without the `.send` suffix.
    pub tracker: Option<String>,
    /// Name of a registered tracking override.
    pub override_function: Option<String>,
}

impl TrackingConfig {
    #[must_use]
    pub fn from_args(args: &Args, default_function: &str) -> Self {
        Self {
            function: args
                .non_empty("ga_function")
                .unwrap_or(default_function)
                .to_string(),
            tracker: args.non_empty("ga_tracker").map(str::to_string),
            override_function: args.non_empty("ga_override_function").map(str::to_string),
        }
    }

    /// Command passed to the analytics function for click events.
    #[must_use]
    pub fn command(&self) -> String {
        self.tracker
            .as_ref()
            .map_or_else(|| "send".to_string(), |t| format!("{t}.send"))
    }

    /// Command for story river events; only set when a tracker is named.
    #[must_use]
    pub fn river_command(&self) -> Option<String> {
        self.tracker.as_ref().map(|t| format!("{t}.send"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Let the browser handle the click.
    None,
    Immediate(String),
    /// Navigate after delivery or the timeout.
    Deferred(String),
}

/// A hit ready to hand to an analytics function.
#[derive(Clone)]
pub struct AnalyticsDelivery {
    pub sink: Arc<dyn AnalyticsSink>,
    pub command: String,
    pub hit: AnalyticsHit,
}

impl std::fmt::Debug for AnalyticsDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsDelivery")
            .field("command", &self.command)
            .field("hit", &self.hit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ClickPlan {
    pub panel_click: PanelClick,
    pub analytics: Option<AnalyticsDelivery>,
    pub navigation: Navigation,
    pub prevent_default: bool,
}

/// What the host should do with the native click event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome {
    pub prevent_default: bool,
    pub navigation: Navigation,
}

/// Apply the registered override, if any, to a tracking target.
#[must_use]
pub fn resolve_target(
    host: &Host,
    override_function: Option<&str>,
    link: Option<&TrackedLink>,
    target: TrackingTarget,
) -> TrackingTarget {
    let Some(f) = override_function.and_then(|name| host.tracking_override(name)) else {
        return target;
    };
    let replaced = f(link, &target);
    TrackingTarget {
        sink: replaced.sink.or(target.sink),
        command: replaced.command.or(target.command),
    }
}

fn delivery(host: &Host, target: TrackingTarget, hit: AnalyticsHit) -> Option<AnalyticsDelivery> {
    let (Some(name), Some(command)) = (target.sink, target.command) else {
        return None;
    };
    let Some(sink) = host.analytics(&name) else {
        debug!("Analytics function {name} is not registered");
        return None;
    };
    Some(AnalyticsDelivery { sink, command, hit })
}

/// Click handler bound to a container after its first render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTracker {
    config: TrackingConfig,
    analytics_disabled: bool,
}

impl ClickTracker {
    #[must_use]
    pub fn bind(config: TrackingConfig, analytics_disabled: bool) -> Self {
        Self {
            config,
            analytics_disabled,
        }
    }

    #[must_use]
    pub fn plan(&self, host: &Host, link: &TrackedLink, button: MouseButton) -> ClickPlan {
        let primary = button == MouseButton::Primary;
        let panel_click = PanelClick {
            url: link.story_url.clone(),
            title: link.story_title.trim().to_string(),
            id: link.story_id.clone(),
        };

        let analytics = if self.analytics_disabled {
            None
        } else {
            let target = resolve_target(
                host,
                self.config.override_function.as_deref(),
                Some(link),
                TrackingTarget {
                    sink: Some(self.config.function.clone()),
                    command: Some(self.config.command()),
                },
            );
            delivery(
                host,
                target,
                AnalyticsHit::article_event(VIEW_ACTION, &link.story_url),
            )
        };

        let href = link.href.clone();
        let (analytics, navigation) = match analytics {
            Some(mut delivery) if host.supports_beacon() => {
                delivery.hit = delivery.hit.with_beacon();
                let nav = if primary {
                    Navigation::Immediate(href)
                } else {
                    Navigation::None
                };
                (Some(delivery), nav)
            }
            Some(delivery) if primary => (Some(delivery), Navigation::Deferred(href)),
            Some(delivery) => (Some(delivery), Navigation::None),
            None if primary => (None, Navigation::Immediate(href)),
            None => (None, Navigation::None),
        };

        ClickPlan {
            panel_click,
            analytics,
            navigation,
            prevent_default: primary,
        }
    }
}

/// Carry out a click plan. Reporting runs detached; immediate navigation
/// happens before this returns.
pub fn execute_click(
    plan: ClickPlan,
    dispatcher: &Dispatcher,
    navigator: Arc<dyn Navigator>,
    navigation_timeout: Duration,
) -> ClickOutcome {
    let report = dispatcher.transport().panel_click(plan.panel_click);
    dispatcher.detach(async move {
        if let Err(e) = report.await {
            warn!("Panel click report failed: {e}");
        }
    });

    match (&plan.navigation, plan.analytics) {
        (Navigation::Deferred(url), Some(delivery)) => {
            let url = url.clone();
            let sent = delivery.sink.send(&delivery.command, delivery.hit);
            dispatcher.detach(async move {
                tokio::select! {
                    () = sent => debug!("Analytics delivered, navigating"),
                    () = tokio::time::sleep(navigation_timeout) => {
                        debug!("Analytics timed out, navigating");
                    }
                }
                navigator.navigate(&url);
            });
        }
        (navigation, analytics) => {
            if let Some(delivery) = analytics {
                dispatcher.detach(delivery.sink.send(&delivery.command, delivery.hit));
            }
            if let Navigation::Immediate(url) | Navigation::Deferred(url) = navigation {
                navigator.navigate(url);
            }
        }
    }

    ClickOutcome {
        prevent_default: plan.prevent_default,
        navigation: plan.navigation,
    }
}

/// "Scrolled View" hit for a story appended to the river.
#[must_use]
pub fn river_delivery(
    host: &Host,
    config: &TrackingConfig,
    story_url: &str,
) -> Option<AnalyticsDelivery> {
    let target = resolve_target(
        host,
        config.override_function.as_deref(),
        None,
        TrackingTarget {
            sink: Some(config.function.clone()),
            command: config.river_command(),
        },
    );
    delivery(
        host,
        target,
        AnalyticsHit::article_event(SCROLLED_VIEW_ACTION, story_url),
    )
}
