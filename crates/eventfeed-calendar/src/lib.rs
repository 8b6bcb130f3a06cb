//! Planning Center Calendar feed for EventFeed.
//!
//! Fetches upcoming event occurrences and the tag taxonomy, joins them into
//! flat [`EventView`] records and caches the result per query.

pub mod cache;
pub mod client;
pub mod error;
pub mod query;
pub mod resolve;
pub mod service;
pub mod types;

pub use cache::{CacheEntry, FeedCache};
pub use client::PcoClient;
pub use error::{ErrorBody, FeedError};
pub use query::{CacheKey, FeedQuery, QueryParams};
pub use resolve::resolve;
pub use service::FeedService;
pub use types::{Event, EventView, FeedResponse, Occurrence, OccurrenceGraph, ResolvedTag, Tag, TagGroup};
