//! Pagination engine: replay the captured request until exhaustion.
//!
//! One loop owns the request template for the whole session. Each turn
//! fetches a page, reads it through the source kind's extraction plan,
//! dispatches the node batch to the processor, rewrites the cursor, and
//! decides whether to continue. Termination is decided here and only
//! here: an absent payload or a false has-next-page flag ends the
//! scrape.

use crate::extract::replace_encoded_value;
use crate::progress::{emit, ProgressSender, ScrapeEvent};
use crate::replay::PageSource;
use crate::scrape::{NodeBatch, NodeProcessor};
use crate::source::{read_page, PageSlice, SourceKind};
use std::sync::Arc;
use tracing::debug;

/// Key of the cursor field inside the percent-encoded request body.
const CURSOR_KEY: &str = "cursor";

/// Counters reported after a pagination run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaginateStats {
    pub pages: u32,
    pub nodes: u64,
}

/// Page through `pages` until exhaustion, dispatching every node batch
/// to `processor`.
///
/// In serial mode each batch is awaited before the next fetch; in
/// concurrent mode batches are spawned and all outstanding tasks are
/// joined before this returns.
pub async fn paginate(
    kind: SourceKind,
    template: String,
    cookies: String,
    pages: &dyn PageSource,
    processor: Arc<dyn NodeProcessor>,
    concurrent: bool,
    progress: &Option<ProgressSender>,
) -> PaginateStats {
    let mut stats = PaginateStats::default();
    let Some(plan) = kind.plan() else {
        // SingleEvent is resolved from its page alone, never paginated.
        return stats;
    };

    let mut template = template;
    let mut inflight: Vec<tokio::task::JoinHandle<()>> = Vec::new();
    let mut has_next_page = true;

    while has_next_page {
        let Some(payload) = pages.next_page(&template, &cookies).await else {
            // An absent payload always terminates the loop, regardless
            // of the previous page's has-next-page flag.
            break;
        };

        let PageSlice {
            nodes,
            has_next_page: more,
            end_cursor,
        } = read_page(plan, &payload);

        stats.pages += 1;
        stats.nodes += nodes.len() as u64;
        emit(
            progress,
            ScrapeEvent::PageFetched {
                page: stats.pages,
                nodes: nodes.len(),
            },
        );

        has_next_page = more;
        let batch = NodeBatch {
            nodes,
            extract_id: plan.extract_id,
        };
        if concurrent {
            let processor = Arc::clone(&processor);
            inflight.push(tokio::spawn(async move { processor.process(batch).await }));
        } else {
            processor.process(batch).await;
        }

        template = replace_encoded_value(&template, CURSOR_KEY, &end_cursor);
    }

    for handle in inflight {
        if let Err(e) = handle.await {
            debug!("node processor task aborted: {e}");
        }
    }
    stats
}
