//! Host capabilities registered before page initialization.
//!
//! Page-supplied logic is looked up by name in this registry: suggest,
//! observe and search data callbacks, renderers, analytics functions and
//! tracking overrides. Names that are not registered are ignored.

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;
use yq_types::AnalyticsHit;

use crate::args::{Args, CallbackData};
use crate::container::TrackedLink;
use crate::render::{RecommendRenderer, SearchRenderer};

/// Key under which the session id is persisted.
pub const SESSION_KEY: &str = "yq_session";

/// What a data callback sees of the handler calling it.
#[derive(Debug, Clone, Copy)]
pub struct CallbackContext<'a> {
    pub instance: usize,
    pub content_id: &'a str,
    pub args: &'a Args,
}

pub type DataFn = Arc<dyn Fn(&CallbackContext<'_>) -> CallbackData + Send + Sync>;

/// A named data callback: a function, or a plain object used as-is.
#[derive(Clone)]
pub enum DataSource {
    Callable(DataFn),
    Object(CallbackData),
}

impl DataSource {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&CallbackContext<'_>) -> CallbackData + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }

    /// Build from a JSON object; other values yield an empty object.
    #[must_use]
    pub fn object(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            _ => Self::Object(Map::new()),
        }
    }

    #[must_use]
    pub fn resolve(&self, ctx: &CallbackContext<'_>) -> CallbackData {
        match self {
            Self::Callable(f) => f(ctx),
            Self::Object(map) => map.clone(),
        }
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("DataSource::Callable"),
            Self::Object(map) => f.debug_tuple("DataSource::Object").field(map).finish(),
        }
    }
}

/// A page analytics function such as `ga`.
pub trait AnalyticsSink: Send + Sync {
    /// Deliver a hit under `command` (`send` or `<tracker>.send`). The future
    /// resolves when the hit has been delivered.
    fn send(&self, command: &str, hit: AnalyticsHit) -> BoxFuture<'static, ()>;
}

/// Analytics function and command name used for a hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingTarget {
    pub sink: Option<String>,
    pub command: Option<String>,
}

/// Runtime override of the tracking target. Receives the clicked link, if
/// any, and the current target; fields left `None` keep the current value.
pub type TrackingOverride =
    Arc<dyn Fn(Option<&TrackedLink>, &TrackingTarget) -> TrackingTarget + Send + Sync>;

pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Navigator used when the host does not supply one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        debug!("Navigate to {url}");
    }
}

/// External identity provider (Gigya).
pub trait IdentityProvider: Send + Sync {
    fn is_ready(&self) -> bool;

    /// The signed-in user object, or `None` when the lookup failed.
    fn user_info(&self) -> BoxFuture<'static, Option<Map<String, Value>>>;
}

/// Client-side key/value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

/// Everything the page runtime borrows from its host.
pub struct Host {
    data_sources: HashMap<String, DataSource>,
    recommend_renderers: HashMap<String, Arc<dyn RecommendRenderer>>,
    search_renderers: HashMap<String, Arc<dyn SearchRenderer>>,
    analytics: HashMap<String, Arc<dyn AnalyticsSink>>,
    tracking_overrides: HashMap<String, TrackingOverride>,
    navigator: Arc<dyn Navigator>,
    supports_beacon: bool,
    identity: Option<Arc<dyn IdentityProvider>>,
    session_store: Option<Arc<dyn SessionStore>>,
    global_session: Option<String>,
    ready: Vec<BoxFuture<'static, ()>>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            data_sources: HashMap::new(),
            recommend_renderers: HashMap::new(),
            search_renderers: HashMap::new(),
            analytics: HashMap::new(),
            tracking_overrides: HashMap::new(),
            navigator: Arc::new(LogNavigator),
            supports_beacon: false,
            identity: None,
            session_store: Some(Arc::new(MemorySessionStore::default())),
            global_session: None,
            ready: Vec::new(),
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("analytics", &self.analytics.keys().collect::<Vec<_>>())
            .field("supports_beacon", &self.supports_beacon)
            .field("pending_ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}

impl Host {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_data_source(mut self, name: &str, source: DataSource) -> Self {
        self.data_sources.insert(name.to_string(), source);
        self
    }

    #[must_use]
    pub fn with_recommend_renderer(
        mut self,
        name: &str,
        renderer: Arc<dyn RecommendRenderer>,
    ) -> Self {
        self.recommend_renderers.insert(name.to_string(), renderer);
        self
    }

    #[must_use]
    pub fn with_search_renderer(mut self, name: &str, renderer: Arc<dyn SearchRenderer>) -> Self {
        self.search_renderers.insert(name.to_string(), renderer);
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, name: &str, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics.insert(name.to_string(), sink);
        self
    }

    #[must_use]
    pub fn with_tracking_override(mut self, name: &str, f: TrackingOverride) -> Self {
        self.tracking_overrides.insert(name.to_string(), f);
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_beacon(mut self, supported: bool) -> Self {
        self.supports_beacon = supported;
        self
    }

    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    /// Replace the session store; `None` models a page without storage.
    #[must_use]
    pub fn with_session_store(mut self, store: Option<Arc<dyn SessionStore>>) -> Self {
        self.session_store = store;
        self
    }

    /// Session id published by the page as a global.
    #[must_use]
    pub fn with_global_session(mut self, id: impl Into<String>) -> Self {
        self.global_session = Some(id.into());
        self
    }

    /// A prerequisite that must resolve before handlers are constructed.
    #[must_use]
    pub fn with_ready(mut self, ready: BoxFuture<'static, ()>) -> Self {
        self.ready.push(ready);
        self
    }

    #[must_use]
    pub fn data_source(&self, name: &str) -> Option<&DataSource> {
        self.data_sources.get(name)
    }

    #[must_use]
    pub fn recommend_renderer(&self, name: &str) -> Option<Arc<dyn RecommendRenderer>> {
        self.recommend_renderers.get(name).cloned()
    }

    #[must_use]
    pub fn search_renderer(&self, name: &str) -> Option<Arc<dyn SearchRenderer>> {
        self.search_renderers.get(name).cloned()
    }

    #[must_use]
    pub fn analytics(&self, name: &str) -> Option<Arc<dyn AnalyticsSink>> {
        self.analytics.get(name).cloned()
    }

    #[must_use]
    pub fn tracking_override(&self, name: &str) -> Option<&TrackingOverride> {
        self.tracking_overrides.get(name)
    }

    #[must_use]
    pub fn navigator(&self) -> Arc<dyn Navigator> {
        Arc::clone(&self.navigator)
    }

    #[must_use]
    pub fn supports_beacon(&self) -> bool {
        self.supports_beacon
    }

    #[must_use]
    pub fn identity_provider(&self) -> Option<Arc<dyn IdentityProvider>> {
        self.identity.clone()
    }

    #[must_use]
    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session_store.as_ref()
    }

    #[must_use]
    pub fn global_session(&self) -> Option<&str> {
        self.global_session.as_deref()
    }

    pub(crate) fn take_ready(&mut self) -> Vec<BoxFuture<'static, ()>> {
        std::mem::take(&mut self.ready)
    }
}
