//! Chromium-backed [`BrowserSession`] using chromiumoxide.

use super::{BrowserSession, CapturedRequest, LaunchError};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Settle time after navigation, approximating network-idle.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. FBEVENTS_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("FBEVENTS_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A headless Chromium instance with a single page, exclusively owned by
/// one capture session.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
}

impl ChromiumSession {
    /// Launch a fresh headless Chromium with a fixed `en-US` locale.
    pub async fn launch() -> Result<Self, LaunchError> {
        let chrome_path = find_chromium().ok_or(LaunchError::ChromiumNotFound)?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--lang=en-US")
            .build()
            .map_err(LaunchError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| LaunchError::Launch(e.to_string()))?;

        // Drive the CDP message loop for the browser's lifetime.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| LaunchError::Launch(e.to_string()))?;

        Ok(Self { browser, page })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        match tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {NAVIGATION_TIMEOUT:?}"),
        }
        let _ = self.page.wait_for_navigation().await;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn click_by_name(&mut self, name: &str) -> Result<()> {
        let encoded = serde_json::to_string(name).unwrap_or_default();
        let script = format!(
            r#"(() => {{
                const name = {encoded};
                const controls = [...document.querySelectorAll('[role="button"], button')];
                const hit = controls.find(el =>
                    (el.getAttribute('aria-label') || el.textContent || '').trim() === name);
                if (!hit) return false;
                hit.click();
                return true;
            }})()"#
        );
        let found: bool = self
            .page
            .evaluate(script)
            .await
            .context("click script failed")?
            .into_value()
            .unwrap_or(false);
        if !found {
            bail!("no control with accessible name {name:?}");
        }
        Ok(())
    }

    async fn click_body(&mut self) -> Result<()> {
        self.page
            .evaluate("document.body && (document.body.click(), true)")
            .await
            .context("body click failed")?;
        Ok(())
    }

    async fn press_escape(&mut self) -> Result<()> {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key("Escape")
                .code("Escape")
                .windows_virtual_key_code(27)
                .build()
                .map_err(|e| anyhow::anyhow!("bad key event: {e}"))?;
            self.page
                .execute(params)
                .await
                .context("escape keypress failed")?;
        }
        Ok(())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<i64> {
        let script = format!(
            "(() => {{ window.scrollBy(0, {pixels}); return document.body.scrollHeight; }})()"
        );
        let height: i64 = self
            .page
            .evaluate(script)
            .await
            .context("scroll failed")?
            .into_value()
            .map_err(|e| anyhow::anyhow!("bad scroll height: {e:?}"))?;
        Ok(height)
    }

    async fn watch_requests(
        &mut self,
        markers: &[&str],
    ) -> Result<oneshot::Receiver<CapturedRequest>> {
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to attach network listener")?;

        let markers: Vec<String> = markers.iter().map(|m| (*m).to_string()).collect();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut tx = Some(tx);
            while let Some(event) = events.next().await {
                if markers.iter().any(|m| event.request.url.contains(m.as_str())) {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(CapturedRequest {
                            url: event.request.url.clone(),
                            body: event.request.post_data_entries.as_ref().map(
                                |entries| {
                                    entries
                                        .iter()
                                        .filter_map(|e| e.bytes.clone())
                                        .map(String::from)
                                        .collect::<String>()
                                },
                            ),
                        });
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn cookie_header(&mut self) -> Result<String> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .context("failed to read cookies")?;
        Ok(cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        let mut browser = self.browser;
        let _ = browser.close().await;
        Ok(())
    }
}
