//! Per-node processing and scrape orchestration.
//!
//! The pagination engine hands each page's nodes to a [`NodeProcessor`];
//! the concrete processor here resolves every node to an [`EventRecord`]
//! by scraping the event's public page. [`scrape_source`] is the inbound
//! entry point that wires capture, replay, pagination, and processing
//! together for one source.

pub mod event_page;

pub use event_page::EventPageScraper;

use crate::browser::chromium::ChromiumSession;
use crate::capture;
use crate::engine::{self, PaginateStats};
use crate::progress::ProgressSender;
use crate::replay::{ReplayClient, RetryOptions};
use crate::source::{IdExtractor, SourceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One page's worth of nodes plus the extractor that digs out their ids.
pub struct NodeBatch {
    pub nodes: Vec<Value>,
    pub extract_id: IdExtractor,
}

/// Consumes one page of nodes, deduplicating by extracted id. The engine
/// either awaits a batch inline or spawns it, per the concurrency flag.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    async fn process(&self, batch: NodeBatch);
}

/// Externally owned accumulation state, shared across processor tasks.
#[derive(Clone, Default)]
pub struct Accumulators {
    /// Collected event records, in completion order.
    pub events: Arc<Mutex<Vec<EventRecord>>>,
    /// Ids already dispatched; the dedup point for every node stream.
    pub seen_ids: Arc<DashSet<String>>,
}

/// A single scraped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub url: String,
}

impl EventRecord {
    /// Build a record from the event JSON embedded in a public event
    /// page. `None` when the payload lacks a name, since there is
    /// nothing worth keeping without one.
    pub fn from_embedded(fallback_id: &str, url: &str, event: &Value) -> Option<Self> {
        let name = event.get("name").and_then(Value::as_str)?.to_string();
        let id = match event.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => fallback_id.to_string(),
        };
        Some(Self {
            id,
            name,
            start_time: timestamp_field(event, "start_timestamp"),
            end_time: timestamp_field(event, "end_timestamp"),
            location: event
                .pointer("/event_place/name")
                .and_then(Value::as_str)
                .map(str::to_string),
            url: url.to_string(),
        })
    }
}

fn timestamp_field(event: &Value, key: &str) -> Option<DateTime<Utc>> {
    event
        .get(key)
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .and_then(|t| DateTime::from_timestamp(t, 0))
}

/// Options governing one scrape session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeOptions {
    pub retry: RetryOptions,
    pub concurrent: bool,
}

/// Scrape one source end to end, driving side effects into
/// `accumulators`.
///
/// Launch failure of the capture browser is the only error surfaced to
/// the caller; everything downstream degrades to partial accumulation.
pub async fn scrape_source(
    source: &str,
    kind: SourceKind,
    accumulators: &Accumulators,
    options: &ScrapeOptions,
    progress: Option<ProgressSender>,
) -> Result<PaginateStats> {
    let scraper = Arc::new(EventPageScraper::new(
        accumulators.clone(),
        options.retry,
        progress.clone(),
    ));

    // A single event is resolved from its page alone: no capture, no
    // pagination.
    if kind == SourceKind::SingleEvent {
        if accumulators.seen_ids.insert(source.to_string()) {
            scraper.scrape_event_by_id(source).await;
        }
        return Ok(PaginateStats::default());
    }

    let url = kind.url(source);
    let session = ChromiumSession::launch()
        .await
        .context("cannot start capture browser")?;
    let captured = capture::capture_request(Box::new(session), &url, kind, &progress).await;

    let Some(template) = captured.template else {
        // Nothing to paginate: a source with no events, not a failure.
        return Ok(PaginateStats::default());
    };
    let cookies = captured.cookies.unwrap_or_default();

    let replay = ReplayClient::new(options.retry);
    let stats = engine::paginate(
        kind,
        template,
        cookies,
        &replay,
        scraper,
        options.concurrent,
        &progress,
    )
    .await;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_embedded_payload() {
        let event = json!({
            "id": "123",
            "name": "Rust Meetup",
            "start_timestamp": 1767225600,
            "end_timestamp": 1767232800,
            "event_place": {"name": "Community Hall"}
        });
        let record =
            EventRecord::from_embedded("fallback", "https://example.test/events/123", &event)
                .unwrap();
        assert_eq!(record.id, "123");
        assert_eq!(record.name, "Rust Meetup");
        assert_eq!(record.location.as_deref(), Some("Community Hall"));
        assert_eq!(
            record.start_time.unwrap().timestamp(),
            1_767_225_600
        );
        assert!(record.end_time.is_some());
    }

    #[test]
    fn test_record_requires_a_name() {
        let event = json!({"id": "123", "start_timestamp": 1767225600});
        assert!(EventRecord::from_embedded("123", "url", &event).is_none());
    }

    #[test]
    fn test_record_falls_back_to_caller_id() {
        let event = json!({"name": "Unnamed Venue Party"});
        let record = EventRecord::from_embedded("456", "url", &event).unwrap();
        assert_eq!(record.id, "456");
        assert!(record.start_time.is_none());
        assert!(record.location.is_none());
    }

    #[test]
    fn test_numeric_id_and_zero_timestamp() {
        let event = json!({"id": 789, "name": "N", "end_timestamp": 0});
        let record = EventRecord::from_embedded("x", "url", &event).unwrap();
        assert_eq!(record.id, "789");
        assert!(record.end_time.is_none());
    }

    #[test]
    fn test_record_serialization_skips_absent_fields() {
        let record = EventRecord {
            id: "1".into(),
            name: "N".into(),
            start_time: None,
            end_time: None,
            location: None,
            url: "u".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("start_time"));
        assert!(!json.contains("location"));
    }
}
