//! Source model: what kind of listing is being scraped, where it lives,
//! and how its GraphQL responses are shaped.
//!
//! Each paginated kind carries a static [`ExtractionPlan`] describing the
//! JSON paths for its node list and page-info block plus the function that
//! digs an event/profile id out of one node. The match in
//! [`SourceKind::plan`] is exhaustive, so a new kind will not compile
//! until its plan exists.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of source being scraped. Determines both the page URL and the
/// response-parsing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// One event, addressed by id. Resolved from its public page alone;
    /// never enters the pagination engine.
    #[value(name = "event")]
    SingleEvent,
    /// A group's upcoming-events listing.
    Group,
    /// A page's hosted-events listing.
    Page,
    /// An events search query.
    #[value(name = "search")]
    SearchQuery,
}

impl SourceKind {
    /// Canonical URL for a source identifier of this kind.
    pub fn url(&self, source: &str) -> String {
        match self {
            Self::SingleEvent => format!("https://www.facebook.com/events/{source}"),
            Self::Group => format!("https://www.facebook.com/groups/{source}/events"),
            Self::Page => format!("https://www.facebook.com/{source}/upcoming_hosted_events"),
            Self::SearchQuery => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(source.as_bytes()).collect();
                format!("https://www.facebook.com/events/search?q={encoded}")
            }
        }
    }

    /// The response-shape plan for this kind, or `None` for
    /// [`SourceKind::SingleEvent`], which is never paginated.
    pub fn plan(&self) -> Option<&'static ExtractionPlan> {
        match self {
            Self::SingleEvent => None,
            Self::Group => Some(&GROUP_PLAN),
            Self::Page => Some(&PAGE_PLAN),
            Self::SearchQuery => Some(&SEARCH_PLAN),
        }
    }
}

/// Extracts the entity id from one edge node. Returns `None` when the
/// node does not carry the expected shape.
pub type IdExtractor = fn(&Value) -> Option<String>;

/// Static description of where one source kind keeps its results.
pub struct ExtractionPlan {
    /// Path from the data envelope to the edge list.
    pub edges: &'static [&'static str],
    /// Path from the data envelope to the page-info block.
    pub page_info: &'static [&'static str],
    /// Per-node id extractor.
    pub extract_id: IdExtractor,
}

static GROUP_PLAN: ExtractionPlan = ExtractionPlan {
    edges: &["node", "upcoming_events", "edges"],
    page_info: &["node", "upcoming_events", "page_info"],
    extract_id: |node| id_at(node, &["node", "id"]),
};

static PAGE_PLAN: ExtractionPlan = ExtractionPlan {
    edges: &["node", "pageItems", "edges"],
    page_info: &["node", "pageItems", "page_info"],
    extract_id: |node| id_at(node, &["node", "node", "id"]),
};

static SEARCH_PLAN: ExtractionPlan = ExtractionPlan {
    edges: &["serpResponse", "results", "edges"],
    page_info: &["serpResponse", "results", "page_info"],
    extract_id: |node| id_at(node, &["rendering_strategy", "view_model", "profile", "id"]),
};

/// One page of results, normalized across source kinds. Every field
/// defaults rather than errors when its path is missing.
#[derive(Debug, Clone, Default)]
pub struct PageSlice {
    pub nodes: Vec<Value>,
    pub has_next_page: bool,
    pub end_cursor: String,
}

/// Read one page out of a data envelope according to `plan`.
pub fn read_page(plan: &ExtractionPlan, payload: &Value) -> PageSlice {
    let nodes = walk(payload, plan.edges)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let info = walk(payload, plan.page_info);
    let has_next_page = info
        .and_then(|i| i.get("has_next_page"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let end_cursor = info
        .and_then(|i| i.get("end_cursor"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    PageSlice {
        nodes,
        has_next_page,
        end_cursor,
    }
}

fn walk<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, segment| v.get(segment))
}

fn id_at(node: &Value, path: &[&str]) -> Option<String> {
    match walk(node, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_shapes() {
        assert_eq!(
            SourceKind::SingleEvent.url("123"),
            "https://www.facebook.com/events/123"
        );
        assert_eq!(
            SourceKind::Group.url("rustmeetup"),
            "https://www.facebook.com/groups/rustmeetup/events"
        );
        assert_eq!(
            SourceKind::Page.url("somevenue"),
            "https://www.facebook.com/somevenue/upcoming_hosted_events"
        );
        assert_eq!(
            SourceKind::SearchQuery.url("live music"),
            "https://www.facebook.com/events/search?q=live+music"
        );
    }

    #[test]
    fn test_single_event_has_no_plan() {
        assert!(SourceKind::SingleEvent.plan().is_none());
        assert!(SourceKind::Group.plan().is_some());
    }

    #[test]
    fn test_read_group_page() {
        let payload = json!({
            "node": {
                "upcoming_events": {
                    "edges": [
                        {"node": {"id": "111"}},
                        {"node": {"id": "222"}}
                    ],
                    "page_info": {"has_next_page": true, "end_cursor": "abc"}
                }
            }
        });
        let plan = SourceKind::Group.plan().unwrap();
        let page = read_page(plan, &payload);
        assert_eq!(page.nodes.len(), 2);
        assert!(page.has_next_page);
        assert_eq!(page.end_cursor, "abc");
        assert_eq!((plan.extract_id)(&page.nodes[0]).as_deref(), Some("111"));
    }

    #[test]
    fn test_read_page_item_id_is_doubly_nested() {
        let node = json!({"node": {"node": {"id": "333"}}});
        let plan = SourceKind::Page.plan().unwrap();
        assert_eq!((plan.extract_id)(&node).as_deref(), Some("333"));
    }

    #[test]
    fn test_read_search_page() {
        let payload = json!({
            "serpResponse": {
                "results": {
                    "edges": [{
                        "rendering_strategy": {
                            "view_model": {"profile": {"id": "444"}}
                        }
                    }],
                    "page_info": {"has_next_page": false, "end_cursor": ""}
                }
            }
        });
        let plan = SourceKind::SearchQuery.plan().unwrap();
        let page = read_page(plan, &payload);
        assert_eq!(page.nodes.len(), 1);
        assert!(!page.has_next_page);
        assert_eq!((plan.extract_id)(&page.nodes[0]).as_deref(), Some("444"));
    }

    #[test]
    fn test_missing_paths_default() {
        let plan = SourceKind::Group.plan().unwrap();
        let page = read_page(plan, &json!({"something": "else"}));
        assert!(page.nodes.is_empty());
        assert!(!page.has_next_page);
        assert!(page.end_cursor.is_empty());

        let page = read_page(plan, &Value::Null);
        assert!(page.nodes.is_empty());
    }

    #[test]
    fn test_malformed_node_yields_no_id() {
        let plan = SourceKind::Group.plan().unwrap();
        assert!((plan.extract_id)(&json!({"node": {}})).is_none());
        assert!((plan.extract_id)(&json!("just a string")).is_none());
    }
}
