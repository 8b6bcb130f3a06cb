//! Cached, tag-enriched feed of upcoming occurrences.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventfeed_core::{Config, Credentials};
use tracing::instrument;

use crate::cache::FeedCache;
use crate::client::PcoClient;
use crate::error::FeedError;
use crate::query::{FeedQuery, QueryParams, DEFAULT_LIMIT, MAX_LIMIT};
use crate::resolve::resolve;
use crate::types::FeedResponse;

pub struct FeedService {
    client: Option<PcoClient>,
    cache: Arc<FeedCache>,
    enrich_tags: bool,
    default_limit: u32,
}

impl FeedService {
    /// Service backed by `client`. Without a client every cache miss fails
    /// with [`FeedError::Configuration`].
    pub fn new(client: Option<PcoClient>, cache: Arc<FeedCache>) -> Self {
        Self {
            client,
            cache,
            enrich_tags: true,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Wire a service from loaded configuration.
    pub fn from_config(
        config: &Config,
        credentials: Option<Credentials>,
        cache: Arc<FeedCache>,
    ) -> Result<Self, FeedError> {
        let client = credentials
            .map(|creds| {
                PcoClient::new(
                    creds,
                    &config.upstream.base_url,
                    config.upstream.timeout_secs.map(Duration::from_secs),
                )
            })
            .transpose()?;

        if client.is_none() {
            tracing::warn!("Upstream credentials not configured; uncached requests will fail");
        }

        Ok(Self::new(client, cache)
            .with_tag_enrichment(config.feed.enrich_tags)
            .with_default_limit(config.feed.default_limit))
    }

    /// Limit used when a request carries no usable `limit`, clamped to
    /// `1..=MAX_LIMIT`.
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Toggle the tag taxonomy fetch. When disabled, events carry no tags.
    pub fn with_tag_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_tags = enabled;
        self
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    pub fn client(&self) -> Option<&PcoClient> {
        self.client.as_ref()
    }

    /// Return the feed for `params`, serving from cache while the entry is
    /// younger than the cache TTL at `now`.
    #[instrument(skip(self, params), fields(key = %params.cache_key()), level = "info")]
    pub async fn get_feed(
        &self,
        params: &QueryParams,
        now: DateTime<Utc>,
    ) -> Result<FeedResponse, FeedError> {
        let key = params.cache_key();

        if let Some(entry) = self.cache.get(&key, now) {
            tracing::debug!(created_at = %entry.created_at, "Serving feed from cache");
            return Ok(FeedResponse::cached(entry.events.clone(), entry.created_at));
        }

        let client = self.client.as_ref().ok_or_else(|| {
            tracing::error!("Missing upstream credentials");
            FeedError::Configuration("missing upstream credentials".to_string())
        })?;

        let query = FeedQuery::with_default_limit(params, self.default_limit);
        tracing::debug!(?query, "Cache miss, fetching upstream");

        let occurrences = client.fetch_occurrences(now, query.limit, query.id.as_deref());
        let (graph, tag_groups) = if self.enrich_tags {
            tokio::try_join!(occurrences, client.fetch_tag_taxonomy())?
        } else {
            (occurrences.await?, Vec::new())
        };

        let events = if self.enrich_tags {
            resolve(&graph.occurrences, &graph.events, &graph.tags, &tag_groups)
        } else {
            resolve(&graph.occurrences, &graph.events, &[], &[])
        };

        tracing::info!(events = events.len(), "Resolved feed");
        self.cache.put(key, events.clone(), now);

        Ok(FeedResponse::fresh(events))
    }
}
