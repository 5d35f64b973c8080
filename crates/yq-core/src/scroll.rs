//! Scroll-triggered loading.
//!
//! A [`ScrollMonitor`] fires once when the container's bottom comes within
//! `offset` pixels of the viewport bottom, then stays silent until the page
//! re-arms it after the cooldown. The [`StoryRiver`] is the page-level
//! variant that appends one cached story per trigger.

use std::time::Duration;
use yq_types::Story;

/// Position and height of an element in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    pub top: i64,
    pub height: i64,
}

/// Current scroll offset and viewport height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollPosition {
    pub scroll_top: i64,
    pub viewport_height: i64,
}

/// Distance between the element's bottom edge and the viewport bottom.
#[must_use]
pub fn remaining_distance(layout: Layout, position: ScrollPosition) -> i64 {
    layout.top + layout.height - position.scroll_top - position.viewport_height
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub offset: i64,
    pub cooldown: Duration,
}

impl ScrollConfig {
    #[must_use]
    pub fn new(offset: i64, cooldown_ms: i64) -> Self {
        Self {
            offset,
            cooldown: Duration::from_millis(u64::try_from(cooldown_ms).unwrap_or(0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollMonitor {
    armed: bool,
    ready: bool,
}

impl Default for ScrollMonitor {
    fn default() -> Self {
        Self {
            armed: false,
            ready: true,
        }
    }
}

impl ScrollMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening. Returns `false` when already armed.
    pub fn arm(&mut self) -> bool {
        !std::mem::replace(&mut self.armed, true)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Handle a scroll event. Returns `true` when the monitor fires; the
    /// caller must schedule [`ScrollMonitor::reset`] after the cooldown.
    pub fn on_scroll(&mut self, layout: Layout, position: ScrollPosition, offset: i64) -> bool {
        if self.armed && self.ready && remaining_distance(layout, position) < offset {
            self.ready = false;
            true
        } else {
            false
        }
    }

    /// End the cooldown.
    pub fn reset(&mut self) {
        self.ready = true;
    }
}

/// What a river trigger should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiverStep {
    /// Fetch this story; `refill` requests a new batch because the cache ran dry.
    Load { story: Story, refill: bool },
    /// Cache empty: request a new batch.
    Refill,
}

/// Cache of not-yet-displayed stories fed by recommend responses.
#[derive(Debug, Clone, Default)]
pub struct StoryRiver {
    cache: Vec<Story>,
    monitor: ScrollMonitor,
    attached: Vec<String>,
}

impl StoryRiver {
    #[must_use]
    pub fn new() -> Self {
        let mut monitor = ScrollMonitor::new();
        monitor.arm();
        Self {
            cache: Vec::new(),
            monitor,
            attached: Vec::new(),
        }
    }

    /// Cache the stories of a response that carry an id.
    pub fn cache_stories<'a, I>(&mut self, stories: I)
    where
        I: IntoIterator<Item = &'a Story>,
    {
        self.cache.extend(
            stories
                .into_iter()
                .filter(|s| s.id.as_deref().is_some_and(|id| !id.is_empty()))
                .cloned(),
        );
    }

    #[must_use]
    pub fn cached(&self) -> &[Story] {
        &self.cache
    }

    pub fn monitor_mut(&mut self) -> &mut ScrollMonitor {
        &mut self.monitor
    }

    /// Consume a trigger. Stories are taken from the end of the cache.
    pub fn next_step(&mut self) -> RiverStep {
        match self.cache.pop() {
            Some(story) => RiverStep::Load {
                story,
                refill: self.cache.is_empty(),
            },
            None => RiverStep::Refill,
        }
    }

    pub fn attach(&mut self, markup: String) {
        self.attached.push(markup);
    }

    /// Markup appended to the river so far.
    #[must_use]
    pub fn attached(&self) -> &[String] {
        &self.attached
    }
}
