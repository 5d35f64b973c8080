//! reqwest-backed client for the Youneeq endpoints.
//!
//! Recommend calls POST a JSON body. Search calls GET with the query object
//! JSON-encoded in the `json` URL parameter. Story markup is fetched with a
//! form-encoded POST to the site's ajax endpoint.

use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use yq_types::{
    IdentityPayload, PanelClick, RecommendRequest, RecommendResponse, RequestVariant, SearchQuery,
    SearchResponse, SearchType,
};

use crate::error::{ClientError, Result};
use crate::transport::{Transport, TransportFuture};

/// Session ids shorter than this are treated as missing.
pub const MIN_SESSION_ID_LEN: usize = 8;

const STORY_ACTION: &str = "yqr_ajax_post";

/// Remote endpoint locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default = "default_recommend_host")]
    pub recommend_host: String,

    #[serde(default = "default_observe_path")]
    pub observe_path: String,

    #[serde(default = "default_observe_min_path")]
    pub observe_min_path: String,

    #[serde(default = "default_panel_click_path")]
    pub panel_click_path: String,

    #[serde(default = "default_session_id_url")]
    pub session_id_url: String,

    #[serde(default = "default_search_host")]
    pub search_host: String,

    #[serde(default = "default_search_path")]
    pub search_path: String,

    #[serde(default = "default_image_search_path")]
    pub image_search_path: String,

    /// Site ajax endpoint used for per-story markup.
    #[serde(default)]
    pub ajax_url: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_recommend_host() -> String {
    "https://api.youneeq.ca/".to_string()
}
fn default_observe_path() -> String {
    "app/observe".to_string()
}
fn default_observe_min_path() -> String {
    "app/observemin".to_string()
}
fn default_panel_click_path() -> String {
    "app/panelclick".to_string()
}
fn default_session_id_url() -> String {
    "http://api.youneeq.ca/app/sessionid".to_string()
}
fn default_search_host() -> String {
    "http://search.youneeq.ca/".to_string()
}
fn default_search_path() -> String {
    "api/search".to_string()
}
fn default_image_search_path() -> String {
    "api/imagesearch".to_string()
}
fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            recommend_host: default_recommend_host(),
            observe_path: default_observe_path(),
            observe_min_path: default_observe_min_path(),
            panel_click_path: default_panel_click_path(),
            session_id_url: default_session_id_url(),
            search_host: default_search_host(),
            search_path: default_search_path(),
            image_search_path: default_image_search_path(),
            ajax_url: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Endpoints {
    /// Point every host at one base URL. Used for local mirrors and tests.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Self {
            recommend_host: base.clone(),
            session_id_url: format!("{base}app/sessionid"),
            search_host: base.clone(),
            ajax_url: Some(format!("{base}wp-admin/admin-ajax.php")),
            ..Self::default()
        }
    }

    /// Recommend endpoint for a request variant.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Url` if the configured host or path is not a valid URL.
    pub fn recommend_url(&self, variant: RequestVariant) -> Result<Url> {
        let path = match variant {
            RequestVariant::Full => &self.observe_path,
            RequestVariant::Lite => &self.observe_min_path,
        };
        Ok(Url::parse(&self.recommend_host)?.join(path)?)
    }

    /// Search endpoint with the query attached as the `json` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the query cannot be encoded.
    pub fn search_url(&self, search_type: SearchType, query: &SearchQuery) -> Result<Url> {
        let path = match search_type {
            SearchType::Image => &self.image_search_path,
            SearchType::Article => &self.search_path,
        };
        let mut url = Url::parse(&self.search_host)?.join(path)?;
        url.query_pairs_mut()
            .append_pair("json", &serde_json::to_string(query)?);
        Ok(url)
    }
}

/// Client for the remote recommendation, search, session and story endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ApiClient {
    /// Build a client for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the underlying HTTP client cannot be built.
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(endpoints.request_timeout_ms))
            .build()?;
        Ok(Self { http, endpoints })
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn read_text(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(
                status.as_u16(),
                response.url().as_str(),
            ));
        }
        Ok(response.text().await?)
    }

    async fn post_json<T: Serialize>(&self, url: Url, body: &T) -> Result<String> {
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;
        Self::read_text(response).await
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        Self::read_text(response).await
    }

    /// Send a suggest/observe request.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or an unparsable body.
    pub async fn send_recommend(
        &self,
        request: &RecommendRequest,
        variant: RequestVariant,
    ) -> Result<RecommendResponse> {
        let url = self.endpoints.recommend_url(variant)?;
        let body = self.post_json(url, request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Push an identity profile through the lite recommend endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    pub async fn send_identity(&self, payload: &IdentityPayload) -> Result<()> {
        let url = self.endpoints.recommend_url(RequestVariant::Lite)?;
        self.post_json(url, payload).await?;
        Ok(())
    }

    /// Run a search.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or an unparsable body.
    pub async fn send_search(
        &self,
        search_type: SearchType,
        query: &SearchQuery,
    ) -> Result<SearchResponse> {
        let url = self.endpoints.search_url(search_type, query)?;
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a new session id.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidSessionId` when the service answers with
    /// fewer than [`MIN_SESSION_ID_LEN`] characters.
    pub async fn fetch_session_id(&self) -> Result<String> {
        let url = Url::parse(&self.endpoints.session_id_url)?;
        let id = self.get_text(url).await?.trim().to_string();
        if id.len() < MIN_SESSION_ID_LEN {
            return Err(ClientError::InvalidSessionId(id));
        }
        Ok(id)
    }

    /// Fetch the pre-rendered markup of a post from the site ajax endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when no ajax URL is configured or the request fails.
    pub async fn fetch_story_markup(&self, post_id: &str) -> Result<String> {
        let ajax_url = self
            .endpoints
            .ajax_url
            .as_deref()
            .ok_or(url::ParseError::EmptyHost)?;
        let url = Url::parse(ajax_url)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("action", STORY_ACTION)
            .append_pair("post_id", post_id)
            .finish();

        debug!("POST {url} (story {post_id})");
        let response = self
            .http
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;
        Self::read_text(response).await
    }

    /// Report a panel click.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    pub async fn send_panel_click(&self, click: &PanelClick) -> Result<()> {
        let url = Url::parse(&self.endpoints.recommend_host)?.join(&self.endpoints.panel_click_path)?;
        self.post_json(url, click).await?;
        Ok(())
    }
}

impl Transport for ApiClient {
    fn recommend(
        &self,
        request: RecommendRequest,
        variant: RequestVariant,
    ) -> TransportFuture<RecommendResponse> {
        let client = self.clone();
        async move { client.send_recommend(&request, variant).await }.boxed()
    }

    fn identify(&self, payload: IdentityPayload) -> TransportFuture<()> {
        let client = self.clone();
        async move { client.send_identity(&payload).await }.boxed()
    }

    fn search(
        &self,
        search_type: SearchType,
        query: SearchQuery,
    ) -> TransportFuture<SearchResponse> {
        let client = self.clone();
        async move { client.send_search(search_type, &query).await }.boxed()
    }

    fn session_id(&self) -> TransportFuture<String> {
        let client = self.clone();
        async move { client.fetch_session_id().await }.boxed()
    }

    fn fetch_story(&self, post_id: String) -> TransportFuture<String> {
        let client = self.clone();
        async move { client.fetch_story_markup(&post_id).await }.boxed()
    }

    fn panel_click(&self, click: PanelClick) -> TransportFuture<()> {
        let client = self.clone();
        async move { client.send_panel_click(&click).await }.boxed()
    }
}
