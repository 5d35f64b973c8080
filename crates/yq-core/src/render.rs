//! Result renderers.
//!
//! Handlers render through the [`RecommendRenderer`] and [`SearchRenderer`]
//! traits. The defaults produce the stock Youneeq markup; a host can register
//! its own implementation under a name and select it with the
//! `display_function` (or `ajax_display_function`) attribute.

use std::fmt::Write as _;
use std::ops::RangeInclusive;
use yq_types::{RecommendResponse, SearchItem, SearchQuery, SearchResponse, SearchType, Story, Tags};

use crate::container::Container;

/// Page counts up to this value show every page link.
const FULL_WINDOW_PAGES: u64 = 10;

pub trait RecommendRenderer: Send + Sync {
    fn render(&self, container: &mut Container, response: &RecommendResponse, tags: &Tags);
}

/// Search handler state visible to a renderer.
#[derive(Debug, Clone, Copy)]
pub struct SearchView<'a> {
    pub query: &'a SearchQuery,
    pub search_type: SearchType,
    pub no_results_msg: &'a str,
    pub next_msg: &'a str,
    pub prev_msg: &'a str,
    pub results_count: u64,
    pub page_count: u64,
    pub page_number: u64,
}

pub trait SearchRenderer: Send + Sync {
    fn render(
        &self,
        container: &mut Container,
        view: &SearchView<'_>,
        response: &SearchResponse,
        tags: &Tags,
    );
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRecommendRenderer;

impl RecommendRenderer for DefaultRecommendRenderer {
    fn render(&self, container: &mut Container, response: &RecommendResponse, _tags: &Tags) {
        for story in response.stories() {
            container.append(&story_block(story));
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSearchRenderer;

impl SearchRenderer for DefaultSearchRenderer {
    fn render(
        &self,
        container: &mut Container,
        view: &SearchView<'_>,
        response: &SearchResponse,
        _tags: &Tags,
    ) {
        if response.is_empty_result() {
            let query = view.query.search.as_deref().unwrap_or_default();
            container.set_text(&view.no_results_msg.replacen("%1", query, 1));
        } else {
            container.clear();
            for item in response.items() {
                container.append(&search_item_block(&item));
            }
        }
        container.append(&page_selector(view));
    }
}

/// Escape text for use in element content and quoted attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markup of one recommended story. Blank fields are left out.
#[must_use]
pub fn story_block(story: &Story) -> String {
    let field = |f: &Option<String>| escape_html(f.as_deref().unwrap_or_default());
    let (id, title, url) = (field(&story.id), field(&story.title), field(&story.url));
    let image = field(&story.image);
    let desc = field(&story.description);

    let mut html = format!(
        r#"<div class="yq-article" data-yq-id="{id}" data-yq-title="{title}" data-yq-url="{url}"><a href="{url}">"#
    );
    if !image.is_empty() {
        let _ = write!(html, r#"<img class="yq-image" src="{image}" alt="{title}" />"#);
    }
    let _ = write!(html, r#"<h3 class="yq-title">{title}</h3></a>"#);
    if !desc.is_empty() {
        let _ = write!(html, r#"<p class="yq-desc">{desc}</p>"#);
    }
    html.push_str("</div>");
    html
}

/// Markup of one search hit: an image anchor or an article block.
#[must_use]
pub fn search_item_block(item: &SearchItem) -> String {
    let id = escape_html(&item.id);
    let title = escape_html(&item.title);
    let url = escape_html(&item.url);
    let image = escape_html(&item.image);
    let text = escape_html(&item.text);

    if item.is_image {
        let mut html = format!(
            r#"<a href="{url}" class="yqs-article-image" data-yq-id="{id}" data-yq-title="{title}" data-yq-url="{url}">"#
        );
        if !image.is_empty() {
            let _ = write!(
                html,
                r#"<img class="yq-image" src="{image}" alt="{title}" title="{text}" />"#
            );
        }
        html.push_str("</a>");
        html
    } else {
        let mut html = format!(
            r#"<div class="yqs-article" data-yq-id="{id}" data-yq-title="{title}" data-yq-url="{url}"><a href="{url}">"#
        );
        if !image.is_empty() {
            let _ = write!(html, r#"<img class="yq-image" src="{image}" alt="{title}" />"#);
        }
        let _ = write!(html, r#"<h3 class="yq-title">{title}</h3></a>"#);
        if !text.is_empty() {
            let _ = write!(html, r#"<p class="yq-desc">{text}</p>"#);
        }
        html.push_str("</div>");
        html
    }
}

/// Visible page numbers: every page when there are at most ten, otherwise ten
/// pages from `page - 4` to `page + 5`, shifted to stay inside `1..=page_count`.
#[must_use]
pub fn page_window(page_count: u64, page_number: u64) -> RangeInclusive<u64> {
    if page_count <= FULL_WINDOW_PAGES {
        return 1..=page_count;
    }

    let count = i128::from(page_count);
    let page = i128::from(page_number);
    let mut first = page - 4;
    let mut last = page + 5;
    if first < 1 {
        last -= first - 1;
        first = 1;
    } else if last > count {
        first -= last - count;
        last = count;
    }

    let clamp = |n: i128| u64::try_from(n.clamp(1, count)).unwrap_or(1);
    clamp(first)..=clamp(last)
}

/// Pagination markup. Empty container when there are no results.
#[must_use]
pub fn page_selector(view: &SearchView<'_>) -> String {
    let mut html = String::from(r#"<div class="yq-search-page-container">"#);

    if view.results_count > 0 {
        let prev = escape_html(view.prev_msg);
        let next = escape_html(view.next_msg);

        if view.page_number == 1 {
            let _ = write!(html, r#"<span class="yq-search-page-prev">{prev}</span> "#);
        } else {
            let _ = write!(html, r##"<a class="yq-search-page-prev" href="#">{prev}</a> "##);
        }

        for page in page_window(view.page_count, view.page_number) {
            if page == view.page_number {
                let _ = write!(
                    html,
                    r#"<span class="yq-search-page-selector selected">{page}</span> "#
                );
            } else {
                let _ = write!(
                    html,
                    r##"<a class="yq-search-page-selector" href="#" data-yq-page="{page}">{page}</a> "##
                );
            }
        }

        if view.page_number == view.page_count {
            let _ = write!(html, r#"<span class="yq-search-page-next">{next}</span>"#);
        } else {
            let _ = write!(html, r##"<a class="yq-search-page-next" href="#">{next}</a>"##);
        }
    }

    html.push_str("</div>");
    html
}
