//! `fbevents scrape <source>` — run one scrape session end to end.

use super::spinner;
use crate::progress::{self, ScrapeEvent};
use crate::scrape::{self, Accumulators, ScrapeOptions};
use crate::source::SourceKind;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;

/// Run the scrape command.
pub async fn run(
    source: &str,
    kind: SourceKind,
    options: ScrapeOptions,
    out: Option<&Path>,
    json_output: bool,
    quiet: bool,
) -> Result<()> {
    let accumulators = Accumulators::default();
    let started = Instant::now();

    let (tx, rx) = progress::channel();
    let spinner_task = if quiet || json_output {
        drop(rx);
        None
    } else {
        Some(tokio::spawn(spinner::run(rx)))
    };

    let result = scrape::scrape_source(source, kind, &accumulators, &options, Some(tx.clone())).await;

    let events = accumulators.events.lock().await;
    if let Ok(stats) = &result {
        let _ = tx.send(ScrapeEvent::ScrapeComplete {
            events: events.len(),
            pages: stats.pages,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }
    drop(tx);
    if let Some(task) = spinner_task {
        let _ = task.await;
    }

    let rendered = serde_json::to_string_pretty(&*events)?;
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !quiet {
                eprintln!("wrote {} events to {}", events.len(), path.display());
            }
        }
        None => println!("{rendered}"),
    }

    result.map(|_| ())
}
