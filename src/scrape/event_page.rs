//! Event-page processor: the per-node step that turns ids into records.
//!
//! For each node: extract the id, deduplicate against the shared seen
//! set, fetch the event's public page, and recover the embedded event
//! JSON. Every per-node failure is absorbed into a skip; partial
//! accumulation is the expected outcome of a scrape.

use super::{Accumulators, EventRecord, NodeBatch, NodeProcessor};
use crate::extract::extract_json;
use crate::progress::{emit, ProgressSender, ScrapeEvent};
use crate::replay::{RetryOptions, USER_AGENT};
use async_trait::async_trait;
use std::time::Duration;
use tracing::error;

/// Base URL of public event pages.
pub const EVENT_PAGE_BASE: &str = "https://www.facebook.com";
/// Label of the embedded JSON payload carrying event data.
const EVENT_LABEL: &str = "event";
/// Key separating the real event payload from other `"event":` blobs on
/// the page.
const EVENT_MARKER_KEY: &str = "start_timestamp";

/// Fetches public event pages and appends recovered records to the
/// shared accumulators.
pub struct EventPageScraper {
    client: reqwest::Client,
    base_url: String,
    accumulators: Accumulators,
    options: RetryOptions,
    progress: Option<ProgressSender>,
}

impl EventPageScraper {
    pub fn new(
        accumulators: Accumulators,
        options: RetryOptions,
        progress: Option<ProgressSender>,
    ) -> Self {
        Self::with_base_url(EVENT_PAGE_BASE, accumulators, options, progress)
    }

    /// Base-URL override, used by tests to point at a local listener.
    pub fn with_base_url(
        base_url: impl Into<String>,
        accumulators: Accumulators,
        options: RetryOptions,
        progress: Option<ProgressSender>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            accumulators,
            options,
            progress,
        }
    }

    /// Fetch one event page and append its record. Every failure is a
    /// skip, not an error.
    pub async fn scrape_event_by_id(&self, id: &str) {
        let url = format!("{}/events/{id}", self.base_url);
        let Some(html) = self.fetch_page(&url).await else {
            self.skip(Some(id), "page fetch failed");
            return;
        };
        let Some(event) = extract_json(&html, EVENT_LABEL, Some(EVENT_MARKER_KEY)) else {
            self.skip(Some(id), "no embedded event payload");
            return;
        };
        let Some(record) = EventRecord::from_embedded(id, &url, &event) else {
            self.skip(Some(id), "unrecognized event shape");
            return;
        };
        emit(
            &self.progress,
            ScrapeEvent::EventScraped {
                id: record.id.clone(),
                name: record.name.clone(),
            },
        );
        self.accumulators.events.lock().await.push(record);
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        for attempt in 1..=self.options.http_retries {
            let result = self
                .client
                .get(url)
                .timeout(Duration::from_millis(self.options.http_timeout_ms))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            match result {
                Ok(response) => return response.text().await.ok(),
                Err(e) => {
                    if attempt < self.options.http_retries {
                        tokio::time::sleep(Duration::from_millis(
                            self.options.http_retry_delay_ms,
                        ))
                        .await;
                    } else {
                        error!(
                            "event page fetch failed after {} attempts: {e:#}",
                            self.options.http_retries
                        );
                    }
                }
            }
        }
        None
    }

    fn skip(&self, id: Option<&str>, reason: &str) {
        emit(
            &self.progress,
            ScrapeEvent::NodeSkipped {
                id: id.map(str::to_string),
                reason: reason.to_string(),
            },
        );
    }
}

#[async_trait]
impl NodeProcessor for EventPageScraper {
    async fn process(&self, batch: NodeBatch) {
        for node in &batch.nodes {
            let Some(id) = (batch.extract_id)(node) else {
                self.skip(None, "node carries no id");
                continue;
            };
            // insert() is the dedup point: false means this id was
            // already dispatched, possibly by a concurrent batch.
            if !self.accumulators.seen_ids.insert(id.clone()) {
                continue;
            }
            self.scrape_event_by_id(&id).await;
        }
    }
}
