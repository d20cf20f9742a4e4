//! Terminal spinner driven by scrape progress events.

use crate::progress::{ProgressReceiver, ScrapeEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Subscribe to the progress channel and animate a spinner until the
/// scrape completes or the channel closes.
pub async fn run(mut rx: ProgressReceiver) {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message("scraping");

    loop {
        match rx.recv().await {
            Ok(ScrapeEvent::CaptureStarted { url }) => {
                bar.set_message(format!("capturing {url}"));
            }
            Ok(ScrapeEvent::RequestCaptured { .. }) => {
                bar.set_message("replaying captured request");
            }
            Ok(ScrapeEvent::CaptureEmpty) => {
                bar.set_message("no protocol request observed");
            }
            Ok(ScrapeEvent::PageFetched { page, nodes }) => {
                bar.set_message(format!("page {page}: {nodes} nodes"));
            }
            Ok(ScrapeEvent::EventScraped { name, .. }) => {
                bar.set_message(format!("scraped {name}"));
            }
            Ok(ScrapeEvent::NodeSkipped { .. }) => {}
            Ok(ScrapeEvent::Warning { message }) => {
                bar.println(format!("warning: {message}"));
            }
            Ok(ScrapeEvent::ScrapeComplete {
                events,
                pages,
                elapsed_ms,
            }) => {
                bar.finish_with_message(format!(
                    "{events} events from {pages} pages in {elapsed_ms}ms"
                ));
                return;
            }
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => {
                bar.finish_and_clear();
                return;
            }
        }
    }
}
