//! Embedded-payload recovery utilities.
//!
//! Facebook ships most of its interesting data as JSON blobs embedded in
//! script text, and its GraphQL request bodies as opaque percent-encoded
//! strings. Neither is worth decoding wholesale: `extract_json` pulls one
//! labeled JSON value out of arbitrary surrounding text, and
//! `replace_encoded_value` swaps a single field's value inside the encoded
//! request body without ever decoding it.

use regex::Regex;
use serde_json::Value;

/// Scan `text` for `"key":` and return the first structurally balanced
/// JSON object or array that follows it.
///
/// When `must_contain` is set, occurrences whose parsed value lacks that
/// key are remembered but skipped; if no occurrence satisfies the filter,
/// the first remembered parse is returned. Scalar values after the label
/// are stepped over. An unbalanced span or a parse failure aborts the
/// whole extraction with `None`; a malformed buffer is never scanned
/// past the bad span.
pub fn extract_json(text: &str, key: &str, must_contain: Option<&str>) -> Option<Value> {
    let needle = format!("\"{key}\":");
    let bytes = text.as_bytes();
    let mut search_pos = 0usize;
    let mut fallback: Option<Value> = None;

    while let Some(start) = find_from(bytes, needle.as_bytes(), search_pos) {
        let pos = start + needle.len();
        let open = match bytes.get(pos) {
            Some(b'{') => b'{',
            Some(b'[') => b'[',
            // Scalar value: step past it and keep scanning.
            _ => {
                search_pos = pos + 1;
                continue;
            }
        };
        let close = if open == b'{' { b'}' } else { b']' };

        let mut level = 1usize;
        let mut i = pos + 1;
        while i < bytes.len() && level > 0 {
            if bytes[i] == open {
                level += 1;
            } else if bytes[i] == close {
                level -= 1;
            }
            i += 1;
        }
        if level != 0 {
            return None;
        }
        search_pos = i;

        // `pos` sits on the opening delimiter and `i` just past the
        // matching close, so the slice is exactly the candidate span.
        let parsed: Value = match serde_json::from_str(&text[pos..i]) {
            Ok(v) => v,
            Err(_) => return None,
        };

        match must_contain {
            None => return Some(parsed),
            Some(filter) if parsed.get(filter).is_some() => return Some(parsed),
            Some(_) => {
                if fallback.is_none() {
                    fallback = Some(parsed);
                }
            }
        }
    }

    // Filter was set but never satisfied: first accumulated match, if any.
    fallback
}

/// Rewrite the value of a percent-encoded `"key":"value"` triple inside an
/// otherwise opaque request body.
///
/// Matches the literal encoded quote/colon/comma framing
/// (`<key>%22%3A%22<value>%22%2C%22`) and substitutes every occurrence.
/// The body is never decoded; zero matches returns it unchanged.
pub fn replace_encoded_value(body: &str, key: &str, new_value: &str) -> String {
    let pattern = format!("({}%22%3A%22)[^%]*(%22%2C%22)", regex::escape(key));
    let Ok(re) = Regex::new(&pattern) else {
        return body.to_string();
    };
    re.replace_all(body, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps[1], new_value, &caps[2])
    })
    .into_owned()
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
