//! Append-only registry of the handlers created for a page.

use std::fmt;

use crate::recommend::RecommendHandler;
use crate::search::SearchHandler;

/// Handle to a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceId {
    Recommend(usize),
    Search(usize),
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recommend(n) => write!(f, "recommend#{n}"),
            Self::Search(n) => write!(f, "search#{n}"),
        }
    }
}

/// Handlers in registration order. Entries are never removed.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    recommend: Vec<RecommendHandler>,
    search: Vec<SearchHandler>,
    order: Vec<InstanceId>,
}

impl InstanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next recommend handler will get.
    #[must_use]
    pub fn next_recommend_index(&self) -> usize {
        self.recommend.len()
    }

    #[must_use]
    pub fn next_search_index(&self) -> usize {
        self.search.len()
    }

    pub fn register_recommend(&mut self, handler: RecommendHandler) -> InstanceId {
        let id = InstanceId::Recommend(self.recommend.len());
        self.recommend.push(handler);
        self.order.push(id);
        id
    }

    pub fn register_search(&mut self, handler: SearchHandler) -> InstanceId {
        let id = InstanceId::Search(self.search.len());
        self.search.push(handler);
        self.order.push(id);
        id
    }

    #[must_use]
    pub fn recommend(&self, index: usize) -> Option<&RecommendHandler> {
        self.recommend.get(index)
    }

    pub fn recommend_mut(&mut self, index: usize) -> Option<&mut RecommendHandler> {
        self.recommend.get_mut(index)
    }

    #[must_use]
    pub fn search(&self, index: usize) -> Option<&SearchHandler> {
        self.search.get(index)
    }

    pub fn search_mut(&mut self, index: usize) -> Option<&mut SearchHandler> {
        self.search.get_mut(index)
    }

    pub fn recommend_handlers(&self) -> impl Iterator<Item = &RecommendHandler> {
        self.recommend.iter()
    }

    pub fn search_handlers(&self) -> impl Iterator<Item = &SearchHandler> {
        self.search.iter()
    }

    /// Every handler id in registration order.
    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.order.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        match id {
            InstanceId::Recommend(n) => n < self.recommend.len(),
            InstanceId::Search(n) => n < self.search.len(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
