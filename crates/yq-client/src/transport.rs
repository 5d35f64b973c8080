//! Transport seam between page handlers and the remote API.
//!
//! Handlers never call HTTP directly; they hold an `Arc<dyn Transport>` and
//! spawn the returned futures. Futures are `'static` so they can outlive the
//! borrow of the handler that started them.

use futures_util::future::BoxFuture;
use yq_types::{
    IdentityPayload, PanelClick, RecommendRequest, RecommendResponse, RequestVariant, SearchQuery,
    SearchResponse, SearchType,
};

use crate::error::ClientError;

pub type TransportFuture<T> = BoxFuture<'static, Result<T, ClientError>>;

pub trait Transport: Send + Sync {
    /// Send a suggest/observe request.
    fn recommend(
        &self,
        request: RecommendRequest,
        variant: RequestVariant,
    ) -> TransportFuture<RecommendResponse>;

    /// Push an external identity profile to the service.
    fn identify(&self, payload: IdentityPayload) -> TransportFuture<()>;

    /// Run a text or image search.
    fn search(&self, search_type: SearchType, query: SearchQuery)
    -> TransportFuture<SearchResponse>;

    /// Fetch a fresh visitor session id.
    fn session_id(&self) -> TransportFuture<String>;

    /// Fetch pre-rendered markup for one post.
    fn fetch_story(&self, post_id: String) -> TransportFuture<String>;

    /// Report a click on a recommended item.
    fn panel_click(&self, click: PanelClick) -> TransportFuture<()>;
}
