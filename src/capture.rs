//! Capture session: drive the page until one authentic GraphQL request
//! fires, then record its body and the session cookies.
//!
//! The page only issues the interesting request when it lazy-loads more
//! results, so the session scrolls in fixed increments, racing a
//! single-fire request watch against a short timeout on every iteration.
//! Everything that can fail inside the session degrades to an empty
//! capture, because a page with no events is a legitimate outcome, not
//! an error.

use crate::browser::{BrowserSession, CapturedRequest};
use crate::progress::{emit, ProgressSender, ScrapeEvent};
use crate::source::SourceKind;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Fixed pause between UI interactions and scroll iterations.
const STEP_DELAY: Duration = Duration::from_millis(100);
/// Scroll increment per iteration.
const SCROLL_STEP: i64 = 1000;
/// Upper bound on scroll iterations.
const MAX_SCROLLS: u32 = 20;
/// URL fragments identifying the GraphQL endpoint.
const ENDPOINT_MARKERS: [&str; 2] = ["/api/graphql", "graphql?"];

/// The outcome of a capture session: the observed request body and the
/// session cookie string. Both absent when no matching request fired.
#[derive(Debug, Default)]
pub struct Capture {
    pub template: Option<String>,
    pub cookies: Option<String>,
}

/// Run one capture session against `url`. The browser is torn down on
/// every path before this returns.
pub async fn capture_request(
    mut session: Box<dyn BrowserSession>,
    url: &str,
    kind: SourceKind,
    progress: &Option<ProgressSender>,
) -> Capture {
    emit(
        progress,
        ScrapeEvent::CaptureStarted {
            url: url.to_string(),
        },
    );

    let outcome = drive(session.as_mut(), url, kind).await;
    if let Err(e) = session.close().await {
        debug!("browser teardown: {e:#}");
    }

    match outcome {
        Ok(Some((request, cookies))) => {
            emit(
                progress,
                ScrapeEvent::RequestCaptured {
                    url: request.url.clone(),
                    body_bytes: request.body.as_deref().map_or(0, str::len),
                },
            );
            if cookies.is_empty() {
                warn!("captured request carries an empty cookie jar; replay will likely be unauthenticated");
            }
            Capture {
                template: request.body,
                cookies: Some(cookies),
            }
        }
        Ok(None) => {
            emit(progress, ScrapeEvent::CaptureEmpty);
            Capture::default()
        }
        Err(e) => {
            warn!("capture session failed: {e:#}");
            emit(progress, ScrapeEvent::CaptureEmpty);
            Capture::default()
        }
    }
}

async fn drive(
    session: &mut dyn BrowserSession,
    url: &str,
    kind: SourceKind,
) -> Result<Option<(CapturedRequest, String)>> {
    session.navigate(url).await?;
    dismiss_dialogs(session).await;

    if kind == SourceKind::Group {
        // Groups collapse their event list behind a "See more" control.
        if let Err(e) = session.click_by_name("See more").await {
            debug!("see-more expansion skipped: {e:#}");
        }
    }

    let watch = session.watch_requests(&ENDPOINT_MARKERS).await?;
    let Some(request) = scroll_until_request(session, watch).await? else {
        return Ok(None);
    };

    let cookies = session.cookie_header().await?;
    Ok(Some((request, cookies)))
}

/// Best-effort dismissal of the consent dialog and any residual overlay.
/// The dialog is only present in some regions, so every step here is
/// allowed to fail.
async fn dismiss_dialogs(session: &mut dyn BrowserSession) {
    if let Err(e) = session.click_by_name("Decline optional cookies").await {
        debug!("consent dialog not dismissed: {e:#}");
    }
    tokio::time::sleep(STEP_DELAY).await;
    if let Err(e) = session.click_body().await {
        debug!("body click skipped: {e:#}");
    }
    tokio::time::sleep(STEP_DELAY).await;
    if let Err(e) = session.press_escape().await {
        debug!("escape keypress skipped: {e:#}");
    }
}

/// Scroll in fixed increments until the request watch resolves, the
/// document stops growing, or the scroll budget runs out.
async fn scroll_until_request(
    session: &mut dyn BrowserSession,
    mut watch: oneshot::Receiver<CapturedRequest>,
) -> Result<Option<CapturedRequest>> {
    let mut watch_alive = true;
    let mut last_height: i64 = 0;

    for _ in 0..MAX_SCROLLS {
        let height = session.scroll_by(SCROLL_STEP).await?;
        tokio::time::sleep(STEP_DELAY).await;

        if height == last_height {
            // Document stopped growing: nothing further to load.
            return Ok(None);
        }
        last_height = height;

        tokio::select! {
            request = &mut watch, if watch_alive => match request {
                Ok(request) => return Ok(Some(request)),
                Err(_) => watch_alive = false,
            },
            () = tokio::time::sleep(STEP_DELAY) => {}
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted browser: pre-programmed scroll heights, an optional
    /// request that fires after N scrolls, and a call log.
    #[derive(Default)]
    struct FakeState {
        heights: VecDeque<i64>,
        last_height: i64,
        scrolls: u32,
        fire_after_scrolls: Option<u32>,
        request: Option<CapturedRequest>,
        consent_present: bool,
        cookie: String,
        calls: Vec<String>,
        closed: bool,
    }

    struct FakeBrowser {
        state: Arc<Mutex<FakeState>>,
        watch_tx: Option<oneshot::Sender<CapturedRequest>>,
    }

    impl FakeBrowser {
        fn new(state: Arc<Mutex<FakeState>>) -> Self {
            Self {
                state,
                watch_tx: None,
            }
        }
    }

    #[async_trait]
    impl BrowserSession for FakeBrowser {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.state.lock().unwrap().calls.push(format!("navigate:{url}"));
            Ok(())
        }

        async fn click_by_name(&mut self, name: &str) -> Result<()> {
            let mut s = self.state.lock().unwrap();
            s.calls.push(format!("click:{name}"));
            if s.consent_present || name != "Decline optional cookies" {
                Ok(())
            } else {
                anyhow::bail!("no control with accessible name {name:?}")
            }
        }

        async fn click_body(&mut self) -> Result<()> {
            self.state.lock().unwrap().calls.push("click_body".into());
            Ok(())
        }

        async fn press_escape(&mut self) -> Result<()> {
            self.state.lock().unwrap().calls.push("escape".into());
            Ok(())
        }

        async fn scroll_by(&mut self, _pixels: i64) -> Result<i64> {
            let request = {
                let mut s = self.state.lock().unwrap();
                s.scrolls += 1;
                let height = s
                    .heights
                    .pop_front()
                    .unwrap_or(s.last_height + SCROLL_STEP);
                s.last_height = height;
                if s.fire_after_scrolls == Some(s.scrolls) {
                    s.request.take()
                } else {
                    None
                }
            };
            if let Some(request) = request {
                if let Some(tx) = self.watch_tx.take() {
                    let _ = tx.send(request);
                }
            }
            Ok(self.state.lock().unwrap().last_height)
        }

        async fn watch_requests(
            &mut self,
            _markers: &[&str],
        ) -> Result<oneshot::Receiver<CapturedRequest>> {
            let (tx, rx) = oneshot::channel();
            self.watch_tx = Some(tx);
            Ok(rx)
        }

        async fn cookie_header(&mut self) -> Result<String> {
            Ok(self.state.lock().unwrap().cookie.clone())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }

    fn state_with(f: impl FnOnce(&mut FakeState)) -> Arc<Mutex<FakeState>> {
        let mut state = FakeState::default();
        f(&mut state);
        Arc::new(Mutex::new(state))
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_mid_scroll_yields_body_and_cookies() {
        let state = state_with(|s| {
            s.fire_after_scrolls = Some(3);
            s.request = Some(CapturedRequest {
                url: "https://www.facebook.com/api/graphql/".into(),
                body: Some("variables=%7B%7D".into()),
            });
            s.cookie = "datr=x; sb=y".into();
        });
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        let capture =
            capture_request(browser, "https://example.test", SourceKind::Page, &None).await;

        assert_eq!(capture.template.as_deref(), Some("variables=%7B%7D"));
        assert_eq!(capture.cookies.as_deref(), Some("datr=x; sb=y"));
        let s = state.lock().unwrap();
        assert!(s.closed);
        assert_eq!(s.scrolls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_document_height_stops_early() {
        let state = state_with(|s| {
            s.heights = VecDeque::from([2000, 2000]);
        });
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        let capture =
            capture_request(browser, "https://example.test", SourceKind::Page, &None).await;

        assert!(capture.template.is_none());
        assert!(capture.cookies.is_none());
        let s = state.lock().unwrap();
        assert!(s.closed);
        assert!(s.scrolls < MAX_SCROLLS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_budget_exhausts_without_request() {
        // Heights keep growing, so only the iteration cap stops the loop.
        let state = state_with(|_| {});
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        let capture =
            capture_request(browser, "https://example.test", SourceKind::Page, &None).await;

        assert!(capture.template.is_none());
        let s = state.lock().unwrap();
        assert_eq!(s.scrolls, MAX_SCROLLS);
        assert!(s.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_kind_expands_see_more() {
        let state = state_with(|s| {
            s.heights = VecDeque::from([2000, 2000]);
        });
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        capture_request(browser, "https://example.test", SourceKind::Group, &None).await;

        let s = state.lock().unwrap();
        assert!(s.calls.iter().any(|c| c == "click:See more"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_group_kind_skips_see_more() {
        let state = state_with(|s| {
            s.heights = VecDeque::from([2000, 2000]);
        });
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        capture_request(browser, "https://example.test", SourceKind::SearchQuery, &None).await;

        let s = state.lock().unwrap();
        assert!(!s.calls.iter().any(|c| c == "click:See more"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_consent_dialog_is_nonfatal() {
        // consent_present defaults to false, so the consent click errors;
        // the session must still proceed through the overlay nudges.
        let state = state_with(|s| {
            s.heights = VecDeque::from([2000, 2000]);
        });
        let browser = Box::new(FakeBrowser::new(Arc::clone(&state)));

        capture_request(browser, "https://example.test", SourceKind::Page, &None).await;

        let s = state.lock().unwrap();
        assert!(s.calls.iter().any(|c| c == "click_body"));
        assert!(s.calls.iter().any(|c| c == "escape"));
        assert!(s.closed);
    }
}
