//! Container state owned by a handler: the element snapshot and rendered markup.

use scraper::{ElementRef, Html};
use tracing::warn;

use crate::document::{Element, selector};
use crate::render::escape_html;

/// Links carrying this class are never tracked.
pub const NO_TRACKING_CLASS: &str = "no-yq-tracking";
const ARTICLE_CLASS: &str = "yq-article";

/// A rendered result link and the story block it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedLink {
    pub href: String,
    pub story_id: String,
    pub story_title: String,
    pub story_url: String,
}

/// A search pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Prev,
    Next,
    Page(u64),
}

#[derive(Debug, Clone)]
pub struct Container {
    element: Element,
    markup: String,
}

impl Container {
    #[must_use]
    pub fn new(element: Element) -> Self {
        Self {
            element,
            markup: String::new(),
        }
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[must_use]
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn append(&mut self, fragment: &str) {
        self.markup.push_str(fragment);
    }

    pub fn clear(&mut self) {
        self.markup.clear();
    }

    /// Replace the content with escaped text.
    pub fn set_text(&mut self, text: &str) {
        self.markup = escape_html(text);
    }

    /// Trackable result links in document order.
    ///
    /// A link is trackable when it is an `a.yq-article` itself or sits inside a
    /// `.yq-article` block, and does not carry `no-yq-tracking`.
    #[must_use]
    pub fn tracked_links(&self) -> Vec<TrackedLink> {
        let Ok(anchors) = selector("a") else {
            return Vec::new();
        };
        let fragment = Html::parse_fragment(&self.markup);

        fragment
            .select(&anchors)
            .filter(|a| !a.value().classes().any(|c| c == NO_TRACKING_CLASS))
            .filter_map(|a| {
                let story = if is_article(&a) {
                    a
                } else {
                    a.ancestors().filter_map(ElementRef::wrap).find(is_article)?
                };
                let data = |name: &str| story.value().attr(name).unwrap_or_default().to_string();
                Some(TrackedLink {
                    href: a.value().attr("href").unwrap_or_default().to_string(),
                    story_id: data("data-yq-id"),
                    story_title: data("data-yq-title"),
                    story_url: data("data-yq-url"),
                })
            })
            .collect()
    }

    /// Pagination controls rendered inside `.yq-search-page-container`.
    #[must_use]
    pub fn page_links(&self) -> Vec<PageLink> {
        let Ok(links) = selector(".yq-search-page-container a") else {
            warn!("Pagination selector failed to parse");
            return Vec::new();
        };
        let fragment = Html::parse_fragment(&self.markup);

        fragment
            .select(&links)
            .filter_map(|a| {
                let el = a.value();
                if el.classes().any(|c| c == "yq-search-page-prev") {
                    Some(PageLink::Prev)
                } else if el.classes().any(|c| c == "yq-search-page-next") {
                    Some(PageLink::Next)
                } else {
                    el.attr("data-yq-page")
                        .and_then(crate::args::parse_leading_int)
                        .and_then(|n| u64::try_from(n).ok())
                        .map(PageLink::Page)
                }
            })
            .collect()
    }
}

fn is_article(element: &ElementRef<'_>) -> bool {
    element.value().classes().any(|c| c == ARTICLE_CLASS)
}
