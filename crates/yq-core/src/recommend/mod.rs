//! Recommendation handlers: one per `#youneeq`, `.youneeq` or
//! `<youneeq-section>` container.

mod builder;
mod handler;

pub use builder::{ContentIdentity, assemble_request, build_observe, build_suggest};
pub use handler::{DisplayMode, RecommendHandler};

use std::fmt;

/// Display function name that turns a handler into a story river feed.
pub const STORY_CACHE_DISPLAY: &str = "yqr_cache_stories";

/// Optional behavior enabled through the `features` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    NoGoogleAnalytics,
    GoogleAnalytics,
    Gigya,
    InfiniteScroll,
    Unknown(String),
}

impl Feature {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "no-google-analytics" => Self::NoGoogleAnalytics,
            "google-analytics" => Self::GoogleAnalytics,
            "gigya" => Self::Gigya,
            "infinite-scroll" => Self::InfiniteScroll,
            other => Self::Unknown(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoGoogleAnalytics => "no-google-analytics",
            Self::GoogleAnalytics => "google-analytics",
            Self::Gigya => "gigya",
            Self::InfiniteScroll => "infinite-scroll",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
