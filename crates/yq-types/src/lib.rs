//! Shared wire types for the Youneeq page runtime.
//!
//! This crate provides the request and response shapes of the remote
//! recommendation and search API, plus the small value types (tags, analytics
//! hits, identity payloads) passed between yq-core and yq-client. Field names
//! follow the remote API exactly and must not be renamed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Deserialize a Vec that may be null or missing (both become empty vec)
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Deserialize a string field that the API sometimes sends as a number.
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Deserialize a count that may arrive as a number or a numeric string.
fn deserialize_lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Request context tags
// ============================================================================

/// A context label attached to a request.
///
/// Tags are consumed by renderers and trackers, never by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    /// The first request issued by a handler after page load.
    First,
    /// The request may carry an observe payload.
    Observe,
    /// The request was triggered by scrolling.
    Scroll,
    /// The request refills a story cache.
    Cache,
    /// A search page change.
    ChangePage,
    Custom(String),
}

impl Tag {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::First => "first",
            Self::Observe => "observe",
            Self::Scroll => "scroll",
            Self::Cache => "cache",
            Self::ChangePage => "change_page",
            Self::Custom(s) => s,
        }
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        match value.as_str() {
            "first" => Self::First,
            "observe" => Self::Observe,
            "scroll" => Self::Scroll,
            "cache" => Self::Cache,
            "change_page" => Self::ChangePage,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unordered set of request context tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[Tag; N]> for Tags {
    fn from(tags: [Tag; N]) -> Self {
        Self(tags.into())
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags)
    }
}

// ============================================================================
// Recommendation request
// ============================================================================

/// The only content item type the service understands.
pub const NODE_TYPE: &str = "node";

/// A request for recommended content items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestPayload {
    #[serde(rename = "type")]
    pub kind: String,

    /// Number of items, always sent as a string.
    pub count: String,

    pub is_panel_detailed: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,

    #[serde(
        rename = "isAllClientDomains",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_all_client_domains: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_custom: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Domain restriction for a suggest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainFilter {
    /// Only these domains.
    List(Vec<String>),
    /// All domains of the client (`true`) or only the current one (`false`).
    AllClientDomains(bool),
}

impl SuggestPayload {
    #[must_use]
    pub fn new(count: impl Into<String>) -> Self {
        Self {
            kind: NODE_TYPE.to_string(),
            count: count.into(),
            is_panel_detailed: "true".to_string(),
            categories: None,
            domains: None,
            is_all_client_domains: None,
            date_start: None,
            date_end: None,
            panel_custom: None,
            panel_type: None,
            options: None,
        }
    }

    /// Apply a domain filter. The two wire keys are mutually exclusive.
    pub fn set_domain_filter(&mut self, filter: DomainFilter) {
        match filter {
            DomainFilter::List(domains) => {
                self.domains = Some(domains);
                self.is_all_client_domains = None;
            }
            DomainFilter::AllClientDomains(all) => {
                self.domains = None;
                self.is_all_client_domains = Some(all.to_string());
            }
        }
    }
}

/// Metadata about the content item the visitor is viewing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservePayload {
    #[serde(rename = "type")]
    pub kind: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ObservePayload {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            kind: NODE_TYPE.to_string(),
            title: title.into(),
            image: None,
            description: None,
            create_date: None,
            categories: None,
            tags: None,
        }
    }
}

/// Full body of a recommend/observe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest: Option<Vec<SuggestPayload>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe: Option<Vec<ObservePayload>>,
}

/// Which recommend endpoint variant to use.
///
/// The first request of a page goes through the full variant, later ones
/// through the lighter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestVariant {
    Full,
    Lite,
}

// ============================================================================
// Recommendation response
// ============================================================================

/// A recommended content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestResults {
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub node: Vec<Story>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    #[serde(default)]
    pub suggest: Option<SuggestResults>,

    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub meta_info: Vec<Value>,

    #[serde(default)]
    pub page_hit: Option<Value>,

    #[serde(default)]
    pub submitted: Option<Value>,
}

impl RecommendResponse {
    /// Recommended items in response order.
    pub fn stories(&self) -> impl Iterator<Item = &Story> {
        self.suggest.iter().flat_map(|s| s.node.iter())
    }
}

// ============================================================================
// Search
// ============================================================================

/// Kind of search, which selects the endpoint and page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Article,
    Image,
}

impl SearchType {
    /// Results per page returned by the search service.
    #[must_use]
    pub fn per_page(self) -> u64 {
        match self {
            Self::Article => 10,
            Self::Image => 12,
        }
    }

    /// Parse a configured search type; anything but `image` is an article search.
    #[must_use]
    pub fn from_arg(value: &str) -> Self {
        if value == "image" {
            Self::Image
        } else {
            Self::Article
        }
    }
}

/// Query object sent JSON-encoded to the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_article_age: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalized: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_info: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_promote_info: Option<bool>,
}

impl SearchQuery {
    /// Whether the query has everything the search service requires.
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        self.domain.as_deref().is_some_and(|d| !d.is_empty()) && self.search.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStory {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub content_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchImage {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub content_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "deserialize_lenient_count")]
    pub num_results: Option<u64>,

    #[serde(default)]
    pub stories: Option<Vec<SearchStory>>,

    #[serde(default)]
    pub images: Option<Vec<SearchImage>>,
}

/// Search hit flattened for rendering, article or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub image: String,
    /// Description for articles, caption for images.
    pub text: String,
    pub is_image: bool,
}

impl SearchResponse {
    /// True when the service reported a result count of zero.
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        self.num_results == Some(0)
    }

    /// Hits in response order. Stories win when both lists are present.
    #[must_use]
    pub fn items(&self) -> Vec<SearchItem> {
        if let Some(stories) = &self.stories {
            stories
                .iter()
                .map(|s| SearchItem {
                    id: s.content_id.clone().unwrap_or_default(),
                    title: s.title.clone().unwrap_or_default(),
                    url: s.url.clone().unwrap_or_default(),
                    image: s.image_url.clone().unwrap_or_default(),
                    text: s.description.clone().unwrap_or_default(),
                    is_image: false,
                })
                .collect()
        } else if let Some(images) = &self.images {
            images
                .iter()
                .map(|i| SearchItem {
                    id: i.content_id.clone().unwrap_or_default(),
                    title: i.title.clone().unwrap_or_default(),
                    url: i.url.clone().unwrap_or_default(),
                    image: i.image_url.clone().unwrap_or_default(),
                    text: i.caption.clone().unwrap_or_default(),
                    is_image: true,
                })
                .collect()
        } else {
            Vec::new()
        }
    }
}

// ============================================================================
// Tracking and identity
// ============================================================================

/// A hit sent to a page analytics function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsHit {
    pub hit_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Set to `beacon` when the host can deliver asynchronously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

impl AnalyticsHit {
    /// An "Articles" event hit.
    #[must_use]
    pub fn article_event(action: &str, label: &str) -> Self {
        Self {
            hit_type: "event".to_string(),
            event_category: Some("Articles".to_string()),
            event_action: Some(action.to_string()),
            event_label: Some(label.to_string()),
            location: None,
            transport: None,
        }
    }

    #[must_use]
    pub fn pageview(location: &str) -> Self {
        Self {
            hit_type: "pageview".to_string(),
            event_category: None,
            event_action: None,
            event_label: None,
            location: Some(location.to_string()),
            transport: None,
        }
    }

    #[must_use]
    pub fn with_beacon(mut self) -> Self {
        self.transport = Some("beacon".to_string());
        self
    }
}

/// Click report sent to the recommendation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelClick {
    pub url: String,
    pub title: String,
    pub id: String,
}

/// Profile fields copied from an external identity provider.
pub const IDENTITY_PROFILE_FIELDS: &[&str] = &[
    "birthDay",
    "birthMonth",
    "birthYear",
    "city",
    "country",
    "email",
    "firstName",
    "gender",
    "lastName",
    "loginProvider",
    "loginProviderUID",
    "nickname",
    "providers",
    "state",
    "zip",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub profile: Map<String, Value>,
}

/// Identity sync body, sent through the lite recommend endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub idm: IdentityRecord,
}

impl IdentityPayload {
    /// Build from a provider user object; `None` when it carries no `ID`.
    #[must_use]
    pub fn from_user(user: &Map<String, Value>) -> Option<Self> {
        let id = match user.get("ID")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let mut profile = Map::new();
        profile.insert("UID".to_string(), Value::String(id.clone()));
        for field in IDENTITY_PROFILE_FIELDS {
            if let Some(value) = user.get(*field) {
                profile.insert((*field).to_string(), value.clone());
            }
        }

        Some(Self {
            idm: IdentityRecord { id, profile },
        })
    }
}


/// Property-based tests using proptest for serialization round-trips.
#[cfg(test)]
mod proptest_roundtrip_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_json_string() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-zA-Z0-9_\\-. ]{0,60}")
            .unwrap()
            .boxed()
    }

    fn arb_opt_string() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(arb_json_string())
    }

    fn arb_opt_list() -> impl Strategy<Value = Option<Vec<String>>> {
        proptest::option::of(proptest::collection::vec(arb_json_string(), 0..5))
    }

    prop_compose! {
        fn arb_search_query()(
            search in arb_opt_string(),
            domain in arb_opt_string(),
            user_id in arb_opt_string(),
            page_number in proptest::option::of(1u64..1000),
            order_by in arb_opt_string(),
            max_article_age in proptest::option::of(-1000i64..1000),
            personalized in proptest::option::of(any::<bool>()),
        ) -> SearchQuery {
            SearchQuery {
                search, domain, user_id, page_number, order_by, max_article_age, personalized,
                ..Default::default()
            }
        }
    }

    prop_compose! {
        fn arb_suggest()(
            count in "[1-9][0-9]{0,2}",
            categories in arb_opt_list(),
            panel_type in arb_opt_string(),
            options in arb_opt_list(),
            all in any::<bool>(),
        ) -> SuggestPayload {
            let mut payload = SuggestPayload::new(count);
            payload.categories = categories;
            payload.panel_type = panel_type;
            payload.options = options;
            payload.set_domain_filter(DomainFilter::AllClientDomains(all));
            payload
        }
    }

    proptest! {
        #[test]
        fn search_query_survives_json(query in arb_search_query()) {
            let json = serde_json::to_string(&query).unwrap();
            let back: SearchQuery = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(query, back);
        }

        #[test]
        fn suggest_payload_survives_json(payload in arb_suggest()) {
            let json = serde_json::to_string(&payload).unwrap();
            let back: SuggestPayload = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(payload, back);
        }
    }
}
