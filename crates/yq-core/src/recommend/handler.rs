use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use yq_client::ClientError;
use yq_types::{
    ObservePayload, RecommendRequest, RecommendResponse, Story, SuggestPayload, Tag, Tags,
};

use super::builder::{ContentIdentity, assemble_request, build_observe, build_suggest};
use super::{Feature, STORY_CACHE_DISPLAY};
use crate::args::{Args, CallbackData, parse_leading_int, split};
use crate::config::RiverSettings;
use crate::container::{Container, TrackedLink};
use crate::dispatch::{Dispatcher, Task};
use crate::document::{ContainerKind, Element};
use crate::host::{CallbackContext, Host};
use crate::page::{PageContext, PageUpdate};
use crate::registry::InstanceId;
use crate::render::{DefaultRecommendRenderer, RecommendRenderer};
use crate::scroll::{Layout, RiverStep, ScrollConfig, ScrollMonitor, ScrollPosition, StoryRiver};
use crate::tracking::{ClickPlan, ClickTracker, MouseButton, TrackingConfig, river_delivery};
use crate::{Error, Result};

/// How a handler shows its results.
#[derive(Clone, Default)]
pub enum DisplayMode {
    #[default]
    Default,
    /// Renderer registered by the host under this name.
    Host(String, Arc<dyn RecommendRenderer>),
    /// Cache stories for the page-level story river instead of rendering.
    StoryCache,
}

impl fmt::Debug for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Host(name, _) => f.debug_tuple("Host").field(name).finish(),
            Self::StoryCache => f.write_str("StoryCache"),
        }
    }
}

impl DisplayMode {
    /// `ajax_display_function` wins over `display_function`. Unknown names
    /// fall back to the default renderer.
    fn resolve(args: &Args, host: &Host) -> Self {
        let Some(name) = args
            .non_empty("ajax_display_function")
            .or_else(|| args.non_empty("display_function"))
        else {
            return Self::Default;
        };

        if let Some(renderer) = host.recommend_renderer(name) {
            Self::Host(name.to_string(), renderer)
        } else if name == STORY_CACHE_DISPLAY {
            Self::StoryCache
        } else {
            debug!("Display function {name} is not registered, using default renderer");
            Self::Default
        }
    }
}

/// Orchestrates suggest/observe requests for one container.
#[derive(Debug)]
pub struct RecommendHandler {
    id_num: usize,
    container: Container,
    base_args: Args,
    identity: ContentIdentity,
    suggest: Option<SuggestPayload>,
    observe: Option<ObservePayload>,
    tracking: TrackingConfig,
    scrolling: ScrollConfig,
    features: Vec<Feature>,
    display: DisplayMode,
    is_loading: bool,
    monitor: ScrollMonitor,
    tracker: Option<ClickTracker>,
    river: Option<StoryRiver>,
    layout: Layout,
    unlock_on_error: bool,
    dispatcher: Dispatcher,
}

impl RecommendHandler {
    /// Build a handler for `element` and collect its configuration. No
    /// request is issued.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAContainer` if `element` carries no recommendation marker.
    pub(crate) fn new(
        id_num: usize,
        element: Element,
        base_args: Args,
        ctx: &PageContext<'_>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        if element.container_kind() != Some(ContainerKind::Recommend) {
            return Err(Error::NotAContainer(ContainerKind::Recommend.label()));
        }

        let mut handler = Self {
            id_num,
            container: Container::new(element),
            base_args,
            identity: ContentIdentity::default(),
            suggest: None,
            observe: None,
            tracking: TrackingConfig::from_args(&Args::new(), &ctx.settings.tracking.function),
            scrolling: ScrollConfig::new(
                ctx.settings.scroll.offset,
                ctx.settings.scroll.cooldown_ms,
            ),
            features: Vec::new(),
            display: DisplayMode::Default,
            is_loading: false,
            monitor: ScrollMonitor::new(),
            tracker: None,
            river: None,
            layout: Layout::default(),
            unlock_on_error: ctx.settings.api.unlock_on_error,
            dispatcher,
        };
        handler.init_all_data(ctx);

        for feature in &handler.features {
            if let Feature::Unknown(name) = feature {
                warn!("RecommendHandler: {name} is not a recognized feature");
            }
        }
        Ok(handler)
    }

    fn init_all_data(&mut self, ctx: &PageContext<'_>) {
        let mut args = self.base_args.clone();
        args.merge(&self.container.element().args());

        self.identity = ContentIdentity::from_args(&args, ctx.document);
        let suggest_data = self.callback_data(ctx.host, args.non_empty("suggest_function"), &args);
        self.suggest = build_suggest(&args, &suggest_data, &mut self.identity);
        let observe_data = self.callback_data(ctx.host, args.non_empty("observe_function"), &args);
        self.observe = build_observe(&args, &observe_data, &mut self.identity, ctx.document);

        self.tracking = TrackingConfig::from_args(&args, &ctx.settings.tracking.function);
        self.scrolling = ScrollConfig::new(
            args.non_empty("scroll_offset")
                .and_then(parse_leading_int)
                .unwrap_or(ctx.settings.scroll.offset),
            args.non_empty("scroll_cooldown")
                .and_then(parse_leading_int)
                .unwrap_or(ctx.settings.scroll.cooldown_ms),
        );
        self.display = DisplayMode::resolve(&args, ctx.host);
        self.features = args
            .non_empty("features")
            .map(split)
            .unwrap_or_default()
            .iter()
            .map(|name| Feature::parse(name.trim()))
            .collect();

        if self.has_feature(&Feature::InfiniteScroll) && self.monitor.arm() {
            debug!("Armed scroll monitor for recommend#{}", self.id_num);
        }
    }

    fn callback_data(&self, host: &Host, name: Option<&str>, args: &Args) -> CallbackData {
        let Some(source) = name.and_then(|n| host.data_source(n)) else {
            return CallbackData::new();
        };
        source.resolve(&CallbackContext {
            instance: self.id_num,
            content_id: &self.identity.content_id,
            args,
        })
    }

    fn instance(&self) -> InstanceId {
        InstanceId::Recommend(self.id_num)
    }

    /// Recollect configuration and request again.
    pub(crate) fn refresh(&mut self, ctx: &PageContext<'_>, tags: Tags) -> bool {
        self.suggest = None;
        self.observe = None;
        self.init_all_data(ctx);
        self.request(tags)
    }

    /// Send a request unless one is outstanding. Returns whether one was sent.
    pub(crate) fn request(&mut self, tags: Tags) -> bool {
        if self.is_loading {
            debug!("recommend#{} is loading, request dropped", self.id_num);
            return false;
        }
        self.is_loading = true;

        let request = self.build_request(&tags);
        let variant = self.dispatcher.next_variant();
        let work = self.dispatcher.transport().recommend(request, variant);
        let index = self.id_num;
        debug!("recommend#{index} requesting with tags {tags:?} ({variant:?})");
        self.dispatcher.spawn(async move {
            Task::RecommendDone {
                index,
                tags,
                result: work.await,
            }
        });
        true
    }

    /// The body a request with `tags` would carry.
    #[must_use]
    pub fn build_request(&self, tags: &Tags) -> RecommendRequest {
        assemble_request(
            &self.identity,
            self.suggest.as_ref(),
            self.observe.as_ref(),
            tags,
        )
    }

    pub(crate) fn on_response(
        &mut self,
        tags: Tags,
        result: std::result::Result<RecommendResponse, ClientError>,
        updates: &UnboundedSender<PageUpdate>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Recommend request for recommend#{} failed: {e}", self.id_num);
                if self.unlock_on_error {
                    self.is_loading = false;
                }
                let _ = updates.send(PageUpdate::RequestFailed {
                    instance: self.instance(),
                    error: e.to_string(),
                });
                return;
            }
        };

        self.is_loading = false;
        let _ = updates.send(PageUpdate::PopulatePrepare {
            instance: self.instance(),
            response: response.clone(),
            tags: tags.clone(),
        });

        match &self.display {
            DisplayMode::Default => {
                DefaultRecommendRenderer.render(&mut self.container, &response, &tags);
            }
            DisplayMode::Host(_, renderer) => {
                renderer.render(&mut self.container, &response, &tags);
            }
            DisplayMode::StoryCache => {
                let river = self.river.get_or_insert_with(StoryRiver::new);
                river.cache_stories(response.stories());
                debug!(
                    "recommend#{} cached stories, {} waiting",
                    self.id_num,
                    river.cached().len()
                );
            }
        }

        let _ = updates.send(PageUpdate::PopulateAttach {
            instance: self.instance(),
            response,
            tags,
        });

        if self.tracker.is_none() {
            self.tracker = Some(ClickTracker::bind(
                self.tracking.clone(),
                self.has_feature(&Feature::NoGoogleAnalytics),
            ));
        }
    }

    /// Check the scroll monitor. On trigger, requests the next batch.
    pub(crate) fn on_scroll(
        &mut self,
        position: ScrollPosition,
        updates: &UnboundedSender<PageUpdate>,
    ) -> bool {
        if !self
            .monitor
            .on_scroll(self.layout, position, self.scrolling.offset)
        {
            return false;
        }

        self.dispatcher.schedule(
            self.scrolling.cooldown,
            Task::ScrollReady { index: self.id_num },
        );
        let _ = updates.send(PageUpdate::ScrollBottom {
            instance: self.instance(),
        });
        self.request(Tags::from([Tag::Scroll]));
        true
    }

    pub(crate) fn scroll_ready(&mut self) {
        self.monitor.reset();
    }

    /// Check the story river monitor against the last story's layout.
    pub(crate) fn on_river_scroll(
        &mut self,
        story_layout: Layout,
        position: ScrollPosition,
        settings: &RiverSettings,
    ) -> bool {
        let Some(river) = self.river.as_mut() else {
            return false;
        };
        if !river
            .monitor_mut()
            .on_scroll(story_layout, position, settings.offset)
        {
            return false;
        }

        let config = ScrollConfig::new(settings.offset, settings.cooldown_ms);
        self.dispatcher
            .schedule(config.cooldown, Task::RiverReady { index: self.id_num });

        let refill = match river.next_step() {
            RiverStep::Load { story, refill } => {
                self.fetch_story(story);
                refill
            }
            RiverStep::Refill => true,
        };
        if refill {
            self.request(Tags::from([Tag::Scroll, Tag::Cache]));
        }
        true
    }

    fn fetch_story(&self, story: Story) {
        let Some(post_id) = story.id.clone() else {
            return;
        };
        let work = self.dispatcher.transport().fetch_story(post_id);
        let index = self.id_num;
        self.dispatcher.spawn(async move {
            Task::StoryFetched {
                index,
                story,
                result: work.await,
            }
        });
    }

    pub(crate) fn river_ready(&mut self) {
        if let Some(river) = self.river.as_mut() {
            river.monitor_mut().reset();
        }
    }

    pub(crate) fn on_story_fetched(
        &mut self,
        host: &Host,
        story: &Story,
        result: std::result::Result<String, ClientError>,
        min_markup_len: usize,
        updates: &UnboundedSender<PageUpdate>,
    ) {
        let markup = match result {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Story fetch for recommend#{} failed: {e}", self.id_num);
                return;
            }
        };
        if markup.len() <= min_markup_len {
            debug!("Discarding {} byte story markup", markup.len());
            return;
        }
        let Some(river) = self.river.as_mut() else {
            return;
        };

        river.attach(markup.clone());
        info!(
            "recommend#{} appended story {} to the river",
            self.id_num,
            story.id.as_deref().unwrap_or_default()
        );
        let _ = updates.send(PageUpdate::StoryAttached {
            instance: self.instance(),
            markup,
        });

        let url = story.url.as_deref().unwrap_or_default();
        if let Some(delivery) = river_delivery(host, &self.tracking, url) {
            self.dispatcher
                .detach(delivery.sink.send(&delivery.command, delivery.hit));
        }
    }

    /// Plan the reaction to a click on the `link_index`-th tracked link.
    /// `None` until the tracker is bound or when the link does not exist.
    #[must_use]
    pub fn plan_click(
        &self,
        host: &Host,
        link_index: usize,
        button: MouseButton,
    ) -> Option<ClickPlan> {
        let tracker = self.tracker.as_ref()?;
        let link = self.container.tracked_links().into_iter().nth(link_index)?;
        Some(tracker.plan(host, &link, button))
    }

    #[must_use]
    pub fn id_num(&self) -> usize {
        self.id_num
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[must_use]
    pub fn tracked_links(&self) -> Vec<TrackedLink> {
        self.container.tracked_links()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn identity(&self) -> &ContentIdentity {
        &self.identity
    }

    #[must_use]
    pub fn suggest(&self) -> Option<&SuggestPayload> {
        self.suggest.as_ref()
    }

    #[must_use]
    pub fn observe(&self) -> Option<&ObservePayload> {
        self.observe.as_ref()
    }

    #[must_use]
    pub fn tracking(&self) -> &TrackingConfig {
        &self.tracking
    }

    #[must_use]
    pub fn scrolling(&self) -> ScrollConfig {
        self.scrolling
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn has_feature(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }

    #[must_use]
    pub fn display(&self) -> &DisplayMode {
        &self.display
    }

    #[must_use]
    pub fn monitor(&self) -> &ScrollMonitor {
        &self.monitor
    }

    #[must_use]
    pub fn is_tracking_bound(&self) -> bool {
        self.tracker.is_some()
    }

    #[must_use]
    pub fn river(&self) -> Option<&StoryRiver> {
        self.river.as_ref()
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }
}
