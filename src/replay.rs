//! Direct replay of the captured GraphQL request over plain HTTP.
//!
//! Once the capture session has produced a request body and cookie
//! string, no browser is needed: each page is fetched by POSTing the
//! (cursor-rotated) body straight at the endpoint with the cookies
//! attached.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

/// The production GraphQL endpoint.
pub const GRAPHQL_ENDPOINT: &str = "https://www.facebook.com/api/graphql/";

/// User agent presented on replay and event-page requests.
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Retry configuration for direct HTTP calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Attempt budget per request.
    pub http_retries: u32,
    /// Per-attempt timeout.
    pub http_timeout_ms: u64,
    /// Fixed delay between attempts.
    pub http_retry_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            http_retries: 3,
            http_timeout_ms: 10_000,
            http_retry_delay_ms: 1_000,
        }
    }
}

/// Supplies one decoded page of results per call.
///
/// Implemented by [`ReplayClient`]; the pagination engine only sees this
/// trait, so scripted payload sequences stand in for the network in
/// tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch and decode the next page, or `None` when the source is
    /// exhausted or unreachable.
    async fn next_page(&self, template: &str, cookies: &str) -> Option<Value>;
}

/// HTTP client that replays a captured request body against the GraphQL
/// endpoint.
pub struct ReplayClient {
    client: reqwest::Client,
    endpoint: String,
    options: RetryOptions,
}

impl ReplayClient {
    pub fn new(options: RetryOptions) -> Self {
        Self::with_endpoint(GRAPHQL_ENDPOINT, options)
    }

    /// Endpoint override, used by tests to point at a local listener.
    pub fn with_endpoint(endpoint: impl Into<String>, options: RetryOptions) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            options,
        }
    }

    async fn attempt(&self, template: &str, cookies: &str) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_millis(self.options.http_timeout_ms))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .header(reqwest::header::COOKIE, cookies)
            .body(template.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl PageSource for ReplayClient {
    /// POST the template and return the payload's `data` envelope.
    ///
    /// A structurally valid response whose serp edge list is explicitly
    /// empty is the definitive end-of-data signal: it returns `None`
    /// immediately without consuming a retry. Transport and decode
    /// failures are retried uniformly up to the attempt budget, then
    /// logged once and absorbed into `None`.
    async fn next_page(&self, template: &str, cookies: &str) -> Option<Value> {
        for attempt in 1..=self.options.http_retries {
            match self.attempt(template, cookies).await {
                Ok(body) => {
                    let serp_edges = body
                        .pointer("/data/serpResponse/results/edges")
                        .and_then(Value::as_array);
                    if serp_edges.is_some_and(Vec::is_empty) {
                        return None;
                    }
                    return body.get("data").cloned();
                }
                Err(e) => {
                    if attempt < self.options.http_retries {
                        tokio::time::sleep(Duration::from_millis(
                            self.options.http_retry_delay_ms,
                        ))
                        .await;
                    } else {
                        error!(
                            "graphql replay failed after {} attempts: {e:#}",
                            self.options.http_retries
                        );
                    }
                }
            }
        }
        None
    }
}
