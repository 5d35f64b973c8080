//! Search handlers: one per `#youneeq-search`, `.youneeq-search` or
//! `<youneeq-search>` container.

mod handler;
mod query;

pub use handler::{SearchDisplay, SearchHandler};
pub use query::{UserIdSource, collect_query};
