//! HTTP client for the Youneeq recommendation and search API.
//!
//! # Architecture
//!
//! - [`client`]: [`ApiClient`], a reqwest-backed client for every remote endpoint
//! - [`transport`]: the [`Transport`] trait that page handlers dispatch through
//! - [`error`]: [`ClientError`] and the `Result` alias
//!
//! # Example
//!
//! ```no_run
//! use yq_client::{ApiClient, Endpoints, Transport};
//! use yq_types::{RecommendRequest, RequestVariant};
//!
//! # async fn example() -> Result<(), yq_client::ClientError> {
//! let client = ApiClient::new(Endpoints::default())?;
//! let request = RecommendRequest {
//!     content_id: Some("1234".to_string()),
//!     ..Default::default()
//! };
//! let response = client.recommend(request, RequestVariant::Full).await?;
//! println!("{} stories", response.stories().count());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, Endpoints, MIN_SESSION_ID_LEN};
pub use error::{ClientError, Result};
pub use transport::{Transport, TransportFuture};

pub use yq_types::{
    AnalyticsHit, IdentityPayload, PanelClick, RecommendRequest, RecommendResponse,
    RequestVariant, SearchQuery, SearchResponse, SearchType,
};
