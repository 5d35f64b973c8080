//! The page runtime.
//!
//! A [`Page`] owns the parsed document, the host registrations, the settings
//! and every handler created for the page. Host events (scroll, click, form
//! submission) enter through `&mut self` methods; completions of spawned work
//! come back as tasks and are applied by [`Page::tick`], [`Page::next_task`]
//! or [`Page::run_until_idle`]. Lifecycle notifications for the host go out
//! on the [`PageUpdate`] channel returned by [`Page::new`].

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use yq_client::Transport;
use yq_types::{RecommendResponse, SearchResponse, Tag, Tags};

use crate::args::Args;
use crate::config::Settings;
use crate::container::PageLink;
use crate::dispatch::{Dispatcher, Task};
use crate::document::{ContainerKind, Document, Element};
use crate::host::Host;
use crate::identity::sync_identity;
use crate::recommend::{Feature, RecommendHandler};
use crate::registry::{InstanceId, InstanceRegistry};
use crate::scroll::{Layout, ScrollPosition};
use crate::search::SearchHandler;
use crate::tracking::{ClickOutcome, MouseButton, execute_click};
use crate::{Error, Result};

/// What handlers see of the page while collecting their configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageContext<'a> {
    pub host: &'a Host,
    pub document: &'a Document,
    pub settings: &'a Settings,
}

/// Notification for the host about a handler's lifecycle.
#[derive(Debug, Clone)]
pub enum PageUpdate {
    /// A recommend response arrived and is about to be rendered.
    PopulatePrepare {
        instance: InstanceId,
        response: RecommendResponse,
        tags: Tags,
    },
    /// A recommend response was rendered (or cached for the story river).
    PopulateAttach {
        instance: InstanceId,
        response: RecommendResponse,
        tags: Tags,
    },
    SearchPopulatePrepare {
        instance: InstanceId,
        response: SearchResponse,
        tags: Tags,
    },
    SearchPopulateAttach {
        instance: InstanceId,
        response: SearchResponse,
        tags: Tags,
    },
    /// The infinite scroll monitor fired.
    ScrollBottom { instance: InstanceId },
    /// A story was appended to the story river.
    StoryAttached { instance: InstanceId, markup: String },
    RequestFailed { instance: InstanceId, error: String },
}

/// Whether [`Page::generate_with`] looks for containers itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Discovery {
    #[default]
    Auto,
    /// Only wait for the host; handlers are added explicitly.
    Manual,
}

#[derive(Debug)]
pub struct Page {
    document: Document,
    settings: Settings,
    host: Host,
    registry: InstanceRegistry,
    dispatcher: Dispatcher,
    tasks: UnboundedReceiver<Task>,
    updates: UnboundedSender<PageUpdate>,
    story_layout: Layout,
}

impl Page {
    #[must_use]
    pub fn new(
        document: Document,
        settings: Settings,
        host: Host,
        transport: Arc<dyn Transport>,
    ) -> (Self, UnboundedReceiver<PageUpdate>) {
        let (task_tx, tasks) = mpsc::unbounded_channel();
        let (updates, update_rx) = mpsc::unbounded_channel();
        let page = Self {
            document,
            settings,
            host,
            registry: InstanceRegistry::new(),
            dispatcher: Dispatcher::new(transport, task_tx),
            tasks,
            updates,
            story_layout: Layout::default(),
        };
        (page, update_rx)
    }

    /// Discover containers, create their handlers and issue first requests.
    ///
    /// # Errors
    ///
    /// Returns an error if a discovered container cannot get a handler.
    pub async fn generate(&mut self) -> Result<Vec<InstanceId>> {
        self.generate_with(Discovery::Auto).await
    }

    /// Wait for the host's ready futures, then discover containers unless
    /// `discovery` is manual or the page root carries `yq-no-auto`.
    /// Recommendation handlers are created before search handlers, each kind
    /// in ascending `data-yq-priority` order.
    ///
    /// # Errors
    ///
    /// Returns an error if a discovered container cannot get a handler.
    pub async fn generate_with(&mut self, discovery: Discovery) -> Result<Vec<InstanceId>> {
        let ready = self.host.take_ready();
        if !ready.is_empty() {
            debug!("Waiting for {} host ready futures", ready.len());
            futures_util::future::join_all(ready).await;
        }

        if discovery == Discovery::Manual {
            return Ok(Vec::new());
        }
        if self.document.auto_disabled() {
            info!("Automatic discovery disabled by page root class");
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for element in self.sorted_containers(ContainerKind::Recommend) {
            let opts_out = element.opts_out();
            let id = self.add_recommend(element, Args::new())?;
            if !opts_out {
                self.request(id, Tags::from([Tag::First, Tag::Observe]))?;
            }
            ids.push(id);
        }
        for element in self.sorted_containers(ContainerKind::Search) {
            let opts_out = element.opts_out();
            let id = self.add_search(element)?;
            if !opts_out {
                self.request(id, Tags::from([Tag::First]))?;
            }
            ids.push(id);
        }

        info!("Generated {} handlers for {}", ids.len(), self.document.url());
        Ok(ids)
    }

    fn sorted_containers(&self, kind: ContainerKind) -> Vec<Element> {
        let mut elements: Vec<Element> = self.document.containers(kind).cloned().collect();
        elements.sort_by_key(Element::priority);
        elements
    }

    /// Create a recommendation handler for `element` without requesting.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAContainer` if `element` is not a recommendation container.
    pub fn add_recommend(&mut self, element: Element, base_args: Args) -> Result<InstanceId> {
        let ctx = PageContext {
            host: &self.host,
            document: &self.document,
            settings: &self.settings,
        };
        let index = self.registry.next_recommend_index();
        let handler =
            RecommendHandler::new(index, element, base_args, &ctx, self.dispatcher.clone())?;
        let gigya = handler.has_feature(&Feature::Gigya);
        let id = self.registry.register_recommend(handler);
        debug!("Registered {id}");

        if gigya {
            sync_identity(
                &self.host,
                &self.dispatcher,
                self.settings.identity.retries,
                self.settings.identity.retry_delay(),
            );
        }
        Ok(id)
    }

    /// Create a search handler for `element` without requesting.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAContainer` if `element` is not a search container.
    pub fn add_search(&mut self, element: Element) -> Result<InstanceId> {
        let ctx = PageContext {
            host: &self.host,
            document: &self.document,
            settings: &self.settings,
        };
        let index = self.registry.next_search_index();
        let handler = SearchHandler::new(index, element, &ctx, self.dispatcher.clone())?;
        let id = self.registry.register_search(handler);
        debug!("Registered {id}");
        Ok(id)
    }

    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Spawned work whose completion has not been applied yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Issue a request with `tags`. Returns whether one was sent now.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not registered.
    pub fn request(&mut self, id: InstanceId, tags: Tags) -> Result<bool> {
        match id {
            InstanceId::Recommend(i) => self
                .registry
                .recommend_mut(i)
                .map(|h| h.request(tags))
                .ok_or_else(|| Error::UnknownInstance(id.to_string())),
            InstanceId::Search(i) => self
                .registry
                .search_mut(i)
                .map(|h| h.request(tags))
                .ok_or_else(|| Error::UnknownInstance(id.to_string())),
        }
    }

    /// Recollect a handler's configuration and request again.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not registered.
    pub fn refresh(&mut self, id: InstanceId, tags: Tags) -> Result<bool> {
        self.refresh_with_query(id, tags, None)
    }

    fn refresh_with_query(
        &mut self,
        id: InstanceId,
        tags: Tags,
        query: Option<&str>,
    ) -> Result<bool> {
        let ctx = PageContext {
            host: &self.host,
            document: &self.document,
            settings: &self.settings,
        };
        let sent = match id {
            InstanceId::Recommend(i) => self
                .registry
                .recommend_mut(i)
                .map(|h| h.refresh(&ctx, tags)),
            InstanceId::Search(i) => self
                .registry
                .search_mut(i)
                .map(|h| h.refresh(&ctx, tags, query)),
        };
        sent.ok_or_else(|| Error::UnknownInstance(id.to_string()))
    }

    /// Refresh every handler in registration order. Returns how many sent a request.
    pub fn refresh_all(&mut self) -> usize {
        let ids: Vec<InstanceId> = self.registry.ids().collect();
        ids.into_iter()
            .filter(|id| matches!(self.refresh(*id, Tags::new()), Ok(true)))
            .count()
    }

    /// Run a search handler with explicit search text.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not a registered search handler.
    pub fn search_for(&mut self, id: InstanceId, query: &str) -> Result<bool> {
        if !matches!(id, InstanceId::Search(_)) {
            return Err(Error::UnknownInstance(id.to_string()));
        }
        self.refresh_with_query(id, Tags::new(), Some(query))
    }

    /// A visitor submitted the form with id `form_id`. Every search handler
    /// bound to it refreshes. Returns how many sent a request.
    pub fn submit_form(&mut self, form_id: &str) -> usize {
        let form_id = form_id.trim_start_matches('#');
        let targets: Vec<InstanceId> = self
            .registry
            .search_handlers()
            .filter(|h| h.form_id() == Some(form_id))
            .map(|h| InstanceId::Search(h.id_num()))
            .collect();
        debug!("Form {form_id} submitted, refreshing {} handlers", targets.len());
        targets
            .into_iter()
            .filter(|id| matches!(self.refresh(*id, Tags::new()), Ok(true)))
            .count()
    }

    /// Set the value of a named control in a page form.
    pub fn set_form_field(&mut self, form_id: &str, name: &str, value: &str) -> bool {
        self.document
            .form_mut(form_id)
            .is_some_and(|form| form.set_field(name, value))
    }

    /// A visitor activated a page selector link.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not a registered search handler.
    pub fn search_page(&mut self, id: InstanceId, link: PageLink) -> Result<bool> {
        self.with_search(id, |h| h.activate_page_link(link))
    }

    /// Jump to the first result page.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not a registered search handler.
    pub fn search_first_page(&mut self, id: InstanceId) -> Result<bool> {
        self.with_search(id, SearchHandler::page_first)
    }

    /// Jump to the last result page.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownInstance` if `id` is not a registered search handler.
    pub fn search_last_page(&mut self, id: InstanceId) -> Result<bool> {
        self.with_search(id, SearchHandler::page_last)
    }

    fn with_search<F>(&mut self, id: InstanceId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut SearchHandler) -> bool,
    {
        let handler = match id {
            InstanceId::Search(i) => self.registry.search_mut(i),
            InstanceId::Recommend(_) => None,
        };
        handler
            .map(f)
            .ok_or_else(|| Error::UnknownInstance(id.to_string()))
    }

    /// Record where a recommendation container sits on the page.
    pub fn set_layout(&mut self, id: InstanceId, layout: Layout) -> bool {
        match id {
            InstanceId::Recommend(i) => self
                .registry
                .recommend_mut(i)
                .map(|h| h.set_layout(layout))
                .is_some(),
            InstanceId::Search(_) => false,
        }
    }

    /// Record where the last story of the story river sits on the page.
    pub fn set_story_layout(&mut self, layout: Layout) {
        self.story_layout = layout;
    }

    /// The viewport moved. Returns how many monitors fired.
    pub fn scroll(&mut self, position: ScrollPosition) -> usize {
        let mut fired = 0;
        for i in 0..self.registry.next_recommend_index() {
            let Some(handler) = self.registry.recommend_mut(i) else {
                continue;
            };
            if handler.on_scroll(position, &self.updates) {
                fired += 1;
            }
            if handler.on_river_scroll(self.story_layout, position, &self.settings.river) {
                fired += 1;
            }
        }
        fired
    }

    /// A visitor clicked the `link_index`-th tracked link of a recommendation
    /// container. `None` when the click is not tracked.
    pub fn click(
        &mut self,
        id: InstanceId,
        link_index: usize,
        button: MouseButton,
    ) -> Option<ClickOutcome> {
        let InstanceId::Recommend(i) = id else {
            return None;
        };
        let plan = self
            .registry
            .recommend(i)?
            .plan_click(&self.host, link_index, button)?;
        Some(execute_click(
            plan,
            &self.dispatcher,
            self.host.navigator(),
            self.settings.tracking.navigation_timeout(),
        ))
    }

    /// Apply every completion that is already queued. Returns how many were applied.
    pub fn tick(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(task) = self.tasks.try_recv() {
            self.apply(task);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it. Returns `false` when
    /// nothing is in flight.
    pub async fn next_task(&mut self) -> bool {
        if self.dispatcher.in_flight() == 0 {
            return false;
        }
        match self.tasks.recv().await {
            Some(task) => {
                self.apply(task);
                true
            }
            None => false,
        }
    }

    /// Apply completions until no spawned work remains, including timers.
    pub async fn run_until_idle(&mut self) {
        while self.next_task().await {}
    }

    fn apply(&mut self, task: Task) {
        self.dispatcher.complete();
        match task {
            Task::RecommendDone {
                index,
                tags,
                result,
            } => {
                if let Some(handler) = self.registry.recommend_mut(index) {
                    handler.on_response(tags, result, &self.updates);
                }
            }
            Task::SearchDone {
                index,
                tags,
                result,
            } => {
                if let Some(handler) = self.registry.search_mut(index) {
                    handler.on_response(tags, result, &self.updates);
                }
            }
            Task::SearchRetry { index, tags } => {
                if let Some(handler) = self.registry.search_mut(index) {
                    handler.request(tags);
                }
            }
            Task::SessionId { index, result } => {
                if let Some(handler) = self.registry.search_mut(index) {
                    handler.on_session_id(&self.host, result);
                }
            }
            Task::ScrollReady { index } => {
                if let Some(handler) = self.registry.recommend_mut(index) {
                    handler.scroll_ready();
                }
            }
            Task::RiverReady { index } => {
                if let Some(handler) = self.registry.recommend_mut(index) {
                    handler.river_ready();
                }
            }
            Task::StoryFetched {
                index,
                story,
                result,
            } => {
                if let Some(handler) = self.registry.recommend_mut(index) {
                    handler.on_story_fetched(
                        &self.host,
                        &story,
                        result,
                        self.settings.river.min_markup_len,
                        &self.updates,
                    );
                }
            }
            Task::IdentityRetry { retries } => {
                sync_identity(
                    &self.host,
                    &self.dispatcher,
                    retries,
                    self.settings.identity.retry_delay(),
                );
            }
            Task::Detached => {}
        }
    }
}
