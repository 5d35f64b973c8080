//! Suggest and observe payload construction.
//!
//! Values from a host data callback win over container attributes, which in
//! turn win over page meta tags.

use serde_json::Value;
use yq_types::{DomainFilter, ObservePayload, RecommendRequest, SuggestPayload, Tag, Tags};

use crate::args::{
    Args, CallbackData, parse_leading_int, split, value_list, value_to_arg, value_truthy,
};
use crate::dates::normalize_date;
use crate::document::Document;

const DEFAULT_CONTENT_TYPE: &str = "article";

/// Top-level request fields describing the viewed content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIdentity {
    pub content_id: String,
    pub content_type: String,
    pub alt_href: String,
}

impl ContentIdentity {
    /// `alt_href` falls back to the page's `og:url`.
    #[must_use]
    pub fn from_args(args: &Args, document: &Document) -> Self {
        Self {
            content_id: args.get("content_id").unwrap_or_default().to_string(),
            content_type: args
                .get("content_type")
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            alt_href: args
                .get("alt_href")
                .or_else(|| document.og("url"))
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn take_name(&mut self, data: &CallbackData) {
        if let Some(name) = data.get("name").and_then(value_to_arg) {
            self.content_id = name;
        }
    }
}

/// A count is usable when it is non-empty and not zero.
fn usable_count(count: &str) -> bool {
    let count = count.trim();
    !count.is_empty() && parse_leading_int(count) != Some(0)
}

fn resolve_count(args: &Args, data: &CallbackData) -> Option<String> {
    let count = match data.get("count") {
        Some(value) if value_truthy(value) => value_to_arg(value),
        Some(_) => None,
        None => args
            .get("count")
            .or_else(|| args.get("suggest_count"))
            .map(str::to_string),
    };
    count.filter(|c| usable_count(c))
}

fn list_field(data: &CallbackData, key: &str, args: &Args, arg: &str) -> Option<Vec<String>> {
    match data.get(key) {
        Some(value) => value_list(value),
        None => args.get(arg).map(split),
    }
}

fn text_field(data: &CallbackData, key: &str, args: &Args, arg: &str) -> Option<String> {
    match data.get(key) {
        Some(value) => value_to_arg(value),
        None => args.get(arg).map(str::to_string),
    }
}

/// Callback dates are passed through; attribute dates are normalized and
/// dropped when unparsable.
fn date_field(data: &CallbackData, key: &str, args: &Args, arg: &str) -> Option<String> {
    match data.get(key) {
        Some(value) => value_to_arg(value),
        None => args.get(arg).and_then(normalize_date),
    }
}

fn domain_filter(args: &Args, data: &CallbackData) -> DomainFilter {
    match data.get("domains") {
        // Any callback boolean selects every client domain
        Some(Value::Bool(_)) => DomainFilter::AllClientDomains(true),
        Some(value) => DomainFilter::List(value_list(value).unwrap_or_default()),
        None => match args.get("suggest_domains") {
            Some("true") => DomainFilter::AllClientDomains(true),
            Some("false") => DomainFilter::AllClientDomains(false),
            Some(domains) => DomainFilter::List(split(domains)),
            None => DomainFilter::AllClientDomains(false),
        },
    }
}

/// Build the suggest payload, or `None` when no usable count resolves.
pub fn build_suggest(
    args: &Args,
    data: &CallbackData,
    identity: &mut ContentIdentity,
) -> Option<SuggestPayload> {
    let wanted = args.non_empty("count").is_some()
        || args.non_empty("suggest_count").is_some()
        || args.non_empty("suggest_function").is_some();
    if !wanted {
        return None;
    }

    identity.take_name(data);
    let count = resolve_count(args, data)?;

    let mut suggest = SuggestPayload::new(count);
    suggest.categories = list_field(data, "categories", args, "suggest_categories");
    suggest.set_domain_filter(domain_filter(args, data));
    suggest.date_start = date_field(data, "date_start", args, "suggest_date_start");
    suggest.date_end = date_field(data, "date_end", args, "suggest_date_end");
    suggest.panel_custom = list_field(data, "panel_custom", args, "suggest_panel_custom");
    suggest.panel_type = text_field(data, "panel_type", args, "suggest_panel_type");
    suggest.options = list_field(data, "options", args, "suggest_options");
    Some(suggest)
}

/// Meta tag fallback; an empty tag counts as missing.
fn meta_fallback(document: &Document, property: &str) -> Option<String> {
    document
        .meta(property)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build the observe payload, or `None` without both a content id and a title.
pub fn build_observe(
    args: &Args,
    data: &CallbackData,
    identity: &mut ContentIdentity,
    document: &Document,
) -> Option<ObservePayload> {
    if !args.flag("observe") && args.non_empty("observe_function").is_none() {
        return None;
    }

    identity.take_name(data);
    if data.get("observe").is_some_and(|v| !value_truthy(v)) {
        return None;
    }

    let title = text_field(data, "title", args, "observe_title")
        .or_else(|| meta_fallback(document, "og:title"))
        .unwrap_or_default();
    if identity.content_id.is_empty() || title.is_empty() {
        return None;
    }

    if let Some(url) = data.get("url").and_then(value_to_arg) {
        identity.alt_href = url;
    }

    let mut observe = ObservePayload::new(title);
    observe.image = non_empty(
        text_field(data, "image", args, "observe_image")
            .or_else(|| meta_fallback(document, "og:image")),
    );
    observe.description = non_empty(
        text_field(data, "description", args, "observe_description")
            .or_else(|| meta_fallback(document, "og:description")),
    );
    observe.create_date = non_empty(match data.get("create_date") {
        Some(value) => value_to_arg(value),
        None => args
            .get("observe_date")
            .and_then(normalize_date)
            .or_else(|| {
                meta_fallback(document, "article:published_time")
                    .as_deref()
                    .and_then(normalize_date)
            }),
    });
    observe.categories = list_field(data, "categories", args, "observe_categories");
    observe.tags = list_field(data, "tags", args, "observe_tags");

    if let Some(content_type) = data.get("content_type").and_then(value_to_arg) {
        identity.content_type = content_type;
    }
    Some(observe)
}

/// Assemble the request body. Observe data is only sent with the observe tag.
#[must_use]
pub fn assemble_request(
    identity: &ContentIdentity,
    suggest: Option<&SuggestPayload>,
    observe: Option<&ObservePayload>,
    tags: &Tags,
) -> RecommendRequest {
    let field = |s: &str| (!s.is_empty()).then(|| s.to_string());
    RecommendRequest {
        content_id: field(&identity.content_id),
        content_type: field(&identity.content_type),
        alt_href: field(&identity.alt_href),
        suggest: suggest.map(|s| vec![s.clone()]),
        observe: observe
            .filter(|_| tags.contains(&Tag::Observe))
            .map(|o| vec![o.clone()]),
    }
}
