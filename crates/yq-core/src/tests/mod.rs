//! Test module for yq-core
//!
//! This module contains page-level tests for:
//! - Discovery order, opt-outs and first request tags
//! - Request exclusion, full/lite variants and the failure wedge
//! - Infinite scroll throttling and the story river
//! - Click tracking and deferred navigation
//! - Search query collection, identity deferral and pagination
//! - External identity sync
//! - Settings loaded from disk

mod click_tests;
mod page_tests;
mod search_tests;
