// Copyright 2026 fbevents Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for scrape telemetry.
//!
//! Long-running stages emit [`ScrapeEvent`]s through a
//! `tokio::sync::broadcast` channel. The CLI spinner subscribes when the
//! terminal is interactive; with no subscriber, events are silently
//! dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScrapeEvent {
    /// The capture browser is navigating to the source page.
    CaptureStarted { url: String },
    /// A matching GraphQL request was observed and recorded.
    RequestCaptured { url: String, body_bytes: usize },
    /// The scroll budget ran out (or the page stopped growing) with no
    /// matching request: an empty scrape, not a failure.
    CaptureEmpty,
    /// One replay page was fetched and dispatched.
    PageFetched { page: u32, nodes: usize },
    /// One event record was recovered from its public page.
    EventScraped { id: String, name: String },
    /// A node was dropped (duplicate id, missing id, or no embedded data).
    NodeSkipped { id: Option<String>, reason: String },
    /// The scrape finished; accumulators hold the final records.
    ScrapeComplete {
        events: usize,
        pages: u32,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ScrapeEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ScrapeEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, silently ignoring send errors (which occur
/// when no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, event: ScrapeEvent) {
    if let Some(sender) = tx {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = ScrapeEvent::PageFetched { page: 3, nodes: 12 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PageFetched"));
        let parsed: ScrapeEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            ScrapeEvent::PageFetched { page, nodes } => {
                assert_eq!(page, 3);
                assert_eq!(nodes, 12);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_receivers_does_not_panic() {
        let (tx, rx) = channel();
        drop(rx);
        emit(&Some(tx), ScrapeEvent::CaptureEmpty);
        emit(&None, ScrapeEvent::CaptureEmpty);
    }
}
