pub mod args;
pub mod config;
pub mod container;
pub mod dates;
pub mod document;
pub mod host;
pub mod recommend;
pub mod registry;
pub mod render;
pub mod scroll;
pub mod search;
pub mod tracking;

pub(crate) mod dispatch;
pub(crate) mod identity;

mod error;
mod page;

#[cfg(test)]
mod tests;

pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use identity::SyncAttempt;
pub use page::{Discovery, Page, PageUpdate};

pub use yq_types::*;
