//! # HK News Digest
//!
//! A news digest pipeline for Hong Kong headlines: scrape the portal's
//! infinite-scroll headline stream through a WebDriver session, cluster the
//! titles into topics with an LLM behind an authenticated gateway, and render
//! chat-ready MarkdownV2 chunk groups for progressive delivery to
//! subscribers.
//!
//! ## Pipeline
//!
//! 1. **Scrape**: a rate-limited driver loads the stream page, scrolls until
//!    content growth stalls, and extracts headline records from the DOM
//! 2. **Store**: headlines are deduplicated by title and the snapshot is
//!    swapped into place atomically
//! 3. **Summarize**: indexed titles are sent to the model with deterministic
//!    sampling; rate limits are retried with backoff
//! 4. **Enrich**: the model's JSON reply is unwrapped, parsed, escaped for
//!    MarkdownV2, and chunked per topic
//! 5. **Deliver**: each topic is sent as a message that grows by edits, gated
//!    on digest freshness per subscriber
//!
//! The chat transport and the scheduler are collaborator contracts
//! ([`deliver::DeliveryChannel`], [`summarize::TokenProvider`]); this crate
//! does not ship a bot.

pub mod config;
pub mod deliver;
pub mod enrich;
pub mod error;
pub mod models;
pub mod retry;
pub mod scrapers;
pub mod store;
pub mod summarize;
pub mod utils;

pub use error::{Error, Result};
