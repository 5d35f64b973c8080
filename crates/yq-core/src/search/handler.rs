use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use yq_client::{ClientError, MIN_SESSION_ID_LEN};
use yq_types::{SearchQuery, SearchResponse, SearchType, Tag, Tags};

use super::query::{UserIdSource, collect_query};
use crate::args::{Args, value_to_arg};
use crate::container::{Container, PageLink};
use crate::dispatch::{Dispatcher, Task};
use crate::document::{ContainerKind, Element};
use crate::host::{CallbackContext, Host, SESSION_KEY};
use crate::page::{PageContext, PageUpdate};
use crate::registry::InstanceId;
use crate::render::{DefaultSearchRenderer, SearchRenderer, SearchView};
use crate::{Error, Result};

const DEFAULT_NO_RESULTS_MSG: &str = "No results found";
const DEFAULT_NEXT_MSG: &str = "Next";
const DEFAULT_PREV_MSG: &str = "Prev";

#[derive(Clone, Default)]
pub enum SearchDisplay {
    #[default]
    Default,
    Host(String, Arc<dyn SearchRenderer>),
}

impl fmt::Debug for SearchDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Host(name, _) => f.debug_tuple("Host").field(name).finish(),
        }
    }
}

impl SearchDisplay {
    fn resolve(args: &Args, host: &Host) -> Self {
        let Some(name) = args
            .non_empty("ajax_display_function")
            .or_else(|| args.non_empty("display_function"))
        else {
            return Self::Default;
        };
        match host.search_renderer(name) {
            Some(renderer) => Self::Host(name.to_string(), renderer),
            None => {
                debug!("Search display function {name} is not registered, using default renderer");
                Self::Default
            }
        }
    }
}

/// Orchestrates search requests and pagination for one container.
#[derive(Debug)]
pub struct SearchHandler {
    id_num: usize,
    container: Container,
    search: SearchQuery,
    search_type: SearchType,
    no_results_msg: String,
    next_msg: String,
    prev_msg: String,
    display: SearchDisplay,
    is_loading: bool,
    is_waiting_for_id: bool,
    results_count: u64,
    form_id: Option<String>,
    page_nav_bound: bool,
    retry_delay: Duration,
    unlock_on_error: bool,
    dispatcher: Dispatcher,
}

impl SearchHandler {
    /// Build a handler for `element` and collect its query. No request is issued.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAContainer` if `element` carries no search marker.
    pub(crate) fn new(
        id_num: usize,
        element: Element,
        ctx: &PageContext<'_>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        if element.container_kind() != Some(ContainerKind::Search) {
            return Err(Error::NotAContainer(ContainerKind::Search.label()));
        }

        let mut handler = Self {
            id_num,
            container: Container::new(element),
            search: SearchQuery::default(),
            search_type: SearchType::Article,
            no_results_msg: DEFAULT_NO_RESULTS_MSG.to_string(),
            next_msg: DEFAULT_NEXT_MSG.to_string(),
            prev_msg: DEFAULT_PREV_MSG.to_string(),
            display: SearchDisplay::Default,
            is_loading: false,
            is_waiting_for_id: false,
            results_count: 0,
            form_id: None,
            page_nav_bound: false,
            retry_delay: ctx.settings.search.retry_delay(),
            unlock_on_error: ctx.settings.api.unlock_on_error,
            dispatcher,
        };
        handler.init_all_data(ctx, None);
        Ok(handler)
    }

    /// Callback data, then attributes, then form fields; later sources win.
    fn collect_args(&mut self, ctx: &PageContext<'_>) -> Args {
        let attributes = self.container.element().args();
        let data = attributes
            .non_empty("search_function")
            .and_then(|name| ctx.host.data_source(name))
            .map(|source| {
                source.resolve(&CallbackContext {
                    instance: self.id_num,
                    content_id: "",
                    args: &attributes,
                })
            })
            .unwrap_or_default();

        let mut args = Args::from_callback(&data);
        args.merge(&attributes);

        self.form_id = data
            .get("search_form")
            .and_then(value_to_arg)
            .filter(|id| !id.is_empty())
            .or_else(|| attributes.non_empty("search_form_id").map(str::to_string))
            .map(|id| id.trim_start_matches('#').to_string());

        if let Some(form) = self.form_id.as_deref().and_then(|id| ctx.document.form(id)) {
            args.merge(&form.args());
        }
        args
    }

    fn init_all_data(&mut self, ctx: &PageContext<'_>, explicit: Option<&str>) {
        let args = self.collect_args(ctx);

        self.search_type = args
            .get("search_type")
            .map_or(SearchType::Article, SearchType::from_arg);
        self.no_results_msg = args
            .get("no_results_msg")
            .unwrap_or(DEFAULT_NO_RESULTS_MSG)
            .to_string();
        self.next_msg = args.get("next_msg").unwrap_or(DEFAULT_NEXT_MSG).to_string();
        self.prev_msg = args.get("prev_msg").unwrap_or(DEFAULT_PREV_MSG).to_string();
        self.display = SearchDisplay::resolve(&args, ctx.host);

        let (search, source) = collect_query(
            &args,
            explicit,
            ctx.document,
            ctx.host,
            ctx.settings.search.utc_offset.as_deref(),
        );
        self.search = search;

        if source == UserIdSource::Lookup {
            self.is_waiting_for_id = true;
            let work = self.dispatcher.transport().session_id();
            let index = self.id_num;
            debug!("search#{index} waiting for a session id");
            self.dispatcher.spawn(async move {
                Task::SessionId {
                    index,
                    result: work.await,
                }
            });
        }
    }

    fn instance(&self) -> InstanceId {
        InstanceId::Search(self.id_num)
    }

    /// Recollect the query, optionally with explicit search text, and request again.
    pub(crate) fn refresh(
        &mut self,
        ctx: &PageContext<'_>,
        tags: Tags,
        query: Option<&str>,
    ) -> bool {
        self.search = SearchQuery::default();
        self.init_all_data(ctx, query);
        self.request(tags)
    }

    /// Send a search. While the session id lookup is pending the call is
    /// deferred by the retry delay with the same tags. Returns whether a
    /// request was sent now.
    pub(crate) fn request(&mut self, tags: Tags) -> bool {
        if self.is_waiting_for_id {
            self.is_waiting_for_id = false;
            debug!("search#{} deferred until the session id arrives", self.id_num);
            self.dispatcher.schedule(
                self.retry_delay,
                Task::SearchRetry {
                    index: self.id_num,
                    tags,
                },
            );
            return false;
        }
        if self.is_loading || !self.search.is_dispatchable() {
            return false;
        }
        self.is_loading = true;

        let work = self
            .dispatcher
            .transport()
            .search(self.search_type, self.search.clone());
        let index = self.id_num;
        debug!("search#{index} requesting with tags {tags:?}");
        self.dispatcher.spawn(async move {
            Task::SearchDone {
                index,
                tags,
                result: work.await,
            }
        });
        true
    }

    pub(crate) fn on_session_id(
        &mut self,
        host: &Host,
        result: std::result::Result<String, ClientError>,
    ) {
        match result {
            Ok(id) if id.len() >= MIN_SESSION_ID_LEN => {
                info!("search#{} received session id", self.id_num);
                if let Some(store) = host.session_store() {
                    store.set(SESSION_KEY, &id);
                }
                self.search.user_id = Some(id);
            }
            Ok(id) => debug!("Ignoring short session id {id:?}"),
            Err(e) => warn!("Session id lookup failed: {e}"),
        }
        self.is_waiting_for_id = false;
    }

    pub(crate) fn on_response(
        &mut self,
        tags: Tags,
        result: std::result::Result<SearchResponse, ClientError>,
        updates: &UnboundedSender<PageUpdate>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Search request for search#{} failed: {e}", self.id_num);
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
        self.results_count = response.num_results.unwrap_or(0);
        let _ = updates.send(PageUpdate::SearchPopulatePrepare {
            instance: self.instance(),
            response: response.clone(),
            tags: tags.clone(),
        });

        let view = SearchView {
            query: &self.search,
            search_type: self.search_type,
            no_results_msg: &self.no_results_msg,
            next_msg: &self.next_msg,
            prev_msg: &self.prev_msg,
            results_count: self.results_count,
            page_count: self.page_count(),
            page_number: self.page_number(),
        };
        match &self.display {
            SearchDisplay::Default => {
                DefaultSearchRenderer.render(&mut self.container, &view, &response, &tags);
            }
            SearchDisplay::Host(_, renderer) => {
                renderer.render(&mut self.container, &view, &response, &tags);
            }
        }

        if tags.contains(&Tag::First) {
            self.page_nav_bound = true;
        }
        let _ = updates.send(PageUpdate::SearchPopulateAttach {
            instance: self.instance(),
            response,
            tags,
        });
    }

    /// Total result pages for the last response.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.results_count.div_ceil(self.search_type.per_page())
    }

    #[must_use]
    pub fn page_number(&self) -> u64 {
        self.search.page_number.unwrap_or(1)
    }

    /// Go to page `n`. Out-of-range pages are ignored.
    pub(crate) fn page(&mut self, n: u64) -> bool {
        if n == 0 || n > self.page_count() {
            return false;
        }
        self.search.page_number = Some(n);
        self.request(Tags::from([Tag::ChangePage]))
    }

    pub(crate) fn page_prev(&mut self) -> bool {
        let n = self.search.page_number.map_or(1, |p| p.saturating_sub(1));
        self.page(n)
    }

    pub(crate) fn page_next(&mut self) -> bool {
        let n = self.search.page_number.map_or(self.page_count(), |p| p + 1);
        self.page(n)
    }

    pub(crate) fn page_first(&mut self) -> bool {
        self.page(1)
    }

    pub(crate) fn page_last(&mut self) -> bool {
        self.page(self.page_count())
    }

    /// Follow a page selector link. Links only respond once the handler has
    /// rendered a response tagged `first`.
    pub(crate) fn activate_page_link(&mut self, link: PageLink) -> bool {
        if !self.page_nav_bound {
            return false;
        }
        match link {
            PageLink::Prev => self.page_prev(),
            PageLink::Next => self.page_next(),
            PageLink::Page(n) => self.page(n),
        }
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
    pub fn query(&self) -> &SearchQuery {
        &self.search
    }

    #[must_use]
    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    #[must_use]
    pub fn no_results_msg(&self) -> &str {
        &self.no_results_msg
    }

    #[must_use]
    pub fn next_msg(&self) -> &str {
        &self.next_msg
    }

    #[must_use]
    pub fn prev_msg(&self) -> &str {
        &self.prev_msg
    }

    #[must_use]
    pub fn display(&self) -> &SearchDisplay {
        &self.display
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn is_waiting_for_id(&self) -> bool {
        self.is_waiting_for_id
    }

    #[must_use]
    pub fn results_count(&self) -> u64 {
        self.results_count
    }

    #[must_use]
    pub fn form_id(&self) -> Option<&str> {
        self.form_id.as_deref()
    }

    #[must_use]
    pub fn is_page_nav_bound(&self) -> bool {
        self.page_nav_bound
    }
}
