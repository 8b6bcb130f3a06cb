//! Planning Center Calendar API client.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use eventfeed_core::Credentials;
use tracing::instrument;

use crate::error::FeedError;
use crate::types::{Document, OccurrenceGraph, TagGroup};

const USER_AGENT: &str = concat!("eventfeed/", env!("CARGO_PKG_VERSION"));

/// Related records requested alongside occurrences.
const OCCURRENCE_INCLUDES: &str = "event,event.tags";

/// Page size used when walking the tag taxonomy.
const TAXONOMY_PAGE_SIZE: &str = "100";

/// Upper bound on taxonomy pages followed through `links.next`.
const MAX_TAXONOMY_PAGES: usize = 20;

pub struct PcoClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl PcoClient {
    /// Build a client for the API rooted at `base_url`.
    ///
    /// `timeout` bounds each request; `None` keeps the transport default.
    pub fn new(
        credentials: Credentials,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, FeedError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch upcoming occurrences with their events and tags inline.
    ///
    /// With `single_id`, exactly that occurrence is fetched and `now`/`limit`
    /// are ignored. Otherwise occurrences starting at or after `now` are
    /// returned in start order, at most `limit` of them.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_occurrences(
        &self,
        now: DateTime<Utc>,
        limit: u32,
        single_id: Option<&str>,
    ) -> Result<OccurrenceGraph, FeedError> {
        let request = match single_id {
            Some(id) => self
                .client
                .get(format!(
                    "{}/event_instances/{}",
                    self.base_url,
                    urlencoding::encode(id)
                ))
                .query(&[("include", OCCURRENCE_INCLUDES)]),
            None => self
                .client
                .get(format!("{}/event_instances", self.base_url))
                .query(&[
                    (
                        "where[starts_at][gte]",
                        now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    ),
                    ("order", "starts_at".to_string()),
                    ("per_page", limit.to_string()),
                    ("include", OCCURRENCE_INCLUDES.to_string()),
                ]),
        };

        let document: Document = self.send(request).await?;
        let graph = OccurrenceGraph::from_document(document);

        tracing::info!(
            occurrences = graph.occurrences.len(),
            events = graph.events.len(),
            tags = graph.tags.len(),
            "Fetched occurrences"
        );
        Ok(graph)
    }

    /// Fetch every tag group with its member tag ids, following pagination.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_tag_taxonomy(&self) -> Result<Vec<TagGroup>, FeedError> {
        let mut groups = Vec::new();
        let mut pages = 0;
        let mut next = Some(
            self.client
                .get(format!("{}/tag_groups", self.base_url))
                .query(&[("include", "tags"), ("per_page", TAXONOMY_PAGE_SIZE)]),
        );

        while let Some(request) = next.take() {
            pages += 1;
            let document: Document = self.send(request).await?;
            groups.extend(document.data.into_vec().into_iter().map(TagGroup::from));

            next = match document.links.next {
                Some(url) if pages < MAX_TAXONOMY_PAGES => Some(self.client.get(url)),
                Some(_) => {
                    tracing::warn!("Tag taxonomy truncated after {} pages", pages);
                    None
                }
                None => None,
            };
        }

        tracing::info!(groups = groups.len(), pages, "Fetched tag taxonomy");
        Ok(groups)
    }

    /// Authenticate, send and decode a request.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FeedError> {
        let response = request
            .basic_auth(&self.credentials.id, Some(&self.credentials.secret))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| FeedError::UpstreamDecode(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Upstream request failed");
            Err(FeedError::UpstreamStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}
