//! Browser automation boundary.
//!
//! The capture protocol needs only a handful of capabilities from the
//! browsing engine: navigate, click a control by accessible name, nudge
//! the page, scroll, watch outgoing requests, and read the cookie jar.
//! [`BrowserSession`] abstracts those so the capture sequence in
//! [`crate::capture`] stays engine-agnostic and testable against a
//! scripted fake; the Chromium implementation lives in [`chromium`].

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

/// One outgoing network request observed in the page.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Full request URL.
    pub url: String,
    /// Outgoing post body, if the request carried one.
    pub body: Option<String>,
}

/// Why a browser session could not be started at all. Unlike in-session
/// faults (which degrade to an empty capture), launch failure is
/// surfaced to the user: there is nothing to scrape without a browser.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(
        "chromium not found; install google-chrome/chromium or set FBEVENTS_CHROMIUM_PATH"
    )]
    ChromiumNotFound,
    #[error("failed to launch chromium: {0}")]
    Launch(String),
}

/// A live browsing context owned by one capture session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url` and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Activate the control with the given accessible name. Errors when
    /// no such control is present.
    async fn click_by_name(&mut self, name: &str) -> Result<()>;

    /// Click the page body (dismisses focus-trapping overlays).
    async fn click_body(&mut self) -> Result<()>;

    /// Send an Escape keypress to the page.
    async fn press_escape(&mut self) -> Result<()>;

    /// Scroll down by `pixels` and report the resulting document scroll
    /// height.
    async fn scroll_by(&mut self, pixels: i64) -> Result<i64>;

    /// Arm a single-fire watch resolved by the first outgoing request
    /// whose URL contains one of `markers`. The underlying listener
    /// stays attached; the signal fires at most once.
    async fn watch_requests(
        &mut self,
        markers: &[&str],
    ) -> Result<oneshot::Receiver<CapturedRequest>>;

    /// The context's cookie jar as a `; `-joined `name=value` string.
    async fn cookie_header(&mut self) -> Result<String>;

    /// Tear the browser down. Called on every exit path of a capture.
    async fn close(self: Box<Self>) -> Result<()>;
}
