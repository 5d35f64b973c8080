//! Search query collection from arguments, the page URL and stored session ids.

use yq_client::MIN_SESSION_ID_LEN;
use yq_types::SearchQuery;

use crate::args::{Args, is_truthy_flag, parse_leading_int};
use crate::dates::normalize_date_with_offset;
use crate::document::Document;
use crate::host::{Host, SESSION_KEY};

/// URL parameters checked for the search text, in order.
const URL_SEARCH_PARAMS: &[&str] = &["s", "search", "query", "q"];

const DEFAULT_ORDER: &str = "relevance";

/// Where the visitor id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdSource {
    Args,
    Stored,
    Global,
    /// Nothing usable; a session id lookup is needed.
    Lookup,
}

/// Value of the first of `keys` present in `args`.
fn search_param<'a>(args: &'a Args, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| args.get(key))
}

fn search_text(args: &Args, document: &Document) -> Option<String> {
    if let Some(text) = search_param(args, &["search", "search_query"]) {
        return Some(text.to_string());
    }

    let from_url = if let Some(param) = args.non_empty("search_param") {
        if let Some(value) = args.get(param) {
            return Some(value.to_string());
        }
        document.query_param(param)
    } else {
        None
    };

    from_url
        .or_else(|| URL_SEARCH_PARAMS.iter().find_map(|p| document.query_param(p)))
        .filter(|text| !text.is_empty())
}

fn usable_session(id: Option<String>) -> Option<String> {
    id.filter(|id| id.len() >= MIN_SESSION_ID_LEN)
}

fn user_id(args: &Args, host: &Host) -> (Option<String>, UserIdSource) {
    if let Some(id) = search_param(args, &["userId", "search_user_id"]) {
        return (Some(id.to_string()), UserIdSource::Args);
    }
    if let Some(id) = usable_session(host.session_store().and_then(|s| s.get(SESSION_KEY))) {
        return (Some(id), UserIdSource::Stored);
    }
    if let Some(id) = usable_session(host.global_session().map(str::to_string)) {
        return (Some(id), UserIdSource::Global);
    }
    (None, UserIdSource::Lookup)
}

/// Build the query for a search handler.
///
/// `explicit` replaces every other source of the search text.
#[must_use]
pub fn collect_query(
    args: &Args,
    explicit: Option<&str>,
    document: &Document,
    host: &Host,
    utc_offset: Option<&str>,
) -> (SearchQuery, UserIdSource) {
    let flag = |keys: &[&str]| search_param(args, keys).map(is_truthy_flag);
    let int = |keys: &[&str]| search_param(args, keys).and_then(parse_leading_int);
    let date = |keys: &[&str]| {
        search_param(args, keys).and_then(|d| normalize_date_with_offset(d, utc_offset))
    };

    let (user_id, source) = user_id(args, host);
    let query = SearchQuery {
        search: explicit
            .map(str::to_string)
            .or_else(|| search_text(args, document)),
        domain: Some(
            search_param(args, &["domain", "search_domain"])
                .unwrap_or_else(|| document.host_name())
                .to_string(),
        ),
        user_id,
        page_number: Some(
            int(&["pageNumber", "search_page_number"])
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(1),
        ),
        order_by: Some(
            search_param(args, &["orderBy", "search_order_by"])
                .unwrap_or(DEFAULT_ORDER)
                .to_string(),
        ),
        start_date: date(&["startDate", "startdate", "search_start_date"]),
        end_date: date(&["endDate", "search_end_date"]),
        max_article_age: int(&["maxArticleAge", "search_max_age"]),
        personalized: flag(&["personalized", "search_personalized"]),
        content_info: flag(&["contentInfo", "search_content_info"]),
        kill_promote_info: flag(&["killPromoteInfo", "search_kp_info"]),
    };
    (query, source)
}
