//! Channel listing and item page parsing.
//!
//! Both pages embed their data in inline `<script>` payloads. The listing
//! page carries one renderer object per item (newest first); the item page
//! carries the description as a JSON string literal.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use channelwatch_shared::{ChannelWatchError, Result};

use crate::extractors::{CoreFields, ExtractorChain};

/// Marker identifying the script that carries item metadata.
pub const ITEM_MARKER: &str = "\"videoRenderer\"";

/// Marker identifying the script that carries the item description.
pub const DESCRIPTION_MARKER: &str = "\"description\":{\"simpleText\":\"";

/// Word limit for stored descriptions.
pub const DESCRIPTION_WORD_LIMIT: usize = 100;

/// Number of description words appended to the title to form a search query.
pub const QUERY_DESCRIPTION_WORDS: usize = 20;

static SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector"));
static PAYLOAD_FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""videoRenderer":(\{.+?\})\}"#).expect("payload regex"));
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""description":\{"simpleText":"((?:[^"\\]|\\.)*)""#).expect("description regex")
});

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// `<site>/channel/<channel_id>/videos`
pub fn listing_url(site_base: &str, channel_id: &str) -> Result<String> {
    let mut url = parse_base(site_base)?;
    url.path_segments_mut()
        .map_err(|_| ChannelWatchError::validation(format!("invalid site URL: {site_base}")))?
        .pop_if_empty()
        .extend(["channel", channel_id, "videos"]);
    Ok(url.to_string())
}

/// `<site>/watch?v=<item_id>`
pub fn item_url(site_base: &str, item_id: &str) -> Result<String> {
    let mut url = parse_base(site_base)?;
    url.path_segments_mut()
        .map_err(|_| ChannelWatchError::validation(format!("invalid site URL: {site_base}")))?
        .pop_if_empty()
        .push("watch");
    url.query_pairs_mut().append_pair("v", item_id);
    Ok(url.to_string())
}

fn parse_base(site_base: &str) -> Result<Url> {
    Url::parse(site_base)
        .map_err(|e| ChannelWatchError::validation(format!("invalid site URL {site_base}: {e}")))
}

// ---------------------------------------------------------------------------
// Listing page
// ---------------------------------------------------------------------------

/// Text content of every inline `<script>` in document order.
pub fn script_texts(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&SCRIPT_SEL)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Locate the first item renderer object on a listing page.
pub fn find_item_payload(html: &str) -> Option<String> {
    script_texts(html)
        .into_iter()
        .filter(|script| script.contains(ITEM_MARKER))
        .find_map(|script| locate_payload(&script))
}

/// Balanced-brace scan first; the non-greedy pattern if the object never closes.
fn locate_payload(script: &str) -> Option<String> {
    balanced_object_after(script, ITEM_MARKER).or_else(|| {
        PAYLOAD_FALLBACK_RE
            .captures(script)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Return the JSON object that follows `marker` and its colon, scanning
/// braces while skipping over string literals.
fn balanced_object_after(text: &str, marker: &str) -> Option<String> {
    let after_marker = text.find(marker)? + marker.len();
    let rest = text[after_marker..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    if !rest.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Braces and quotes are ASCII, so byte offsets are valid char boundaries
    for (i, b) in rest.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(rest[..=i].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract the newest item's required fields from a listing page.
///
/// Fails with [`ChannelWatchError::Parse`] when no payload exists or any
/// required field is missing.
pub fn parse_listing(html: &str, chain: &ExtractorChain) -> Result<CoreFields> {
    let payload = find_item_payload(html)
        .ok_or_else(|| ChannelWatchError::parse("no item payload found on listing page"))?;

    let fields = chain.extract(&payload);
    let missing = fields.missing();
    fields.into_complete().ok_or_else(|| {
        ChannelWatchError::parse(format!(
            "extraction incomplete, missing {}",
            missing.join(", ")
        ))
    })
}

// ---------------------------------------------------------------------------
// Item page
// ---------------------------------------------------------------------------

/// Extract and normalize the description from an item page.
///
/// Returns an empty string when the page has no description.
pub fn extract_description(html: &str) -> String {
    let raw = script_texts(html)
        .into_iter()
        .filter(|script| script.contains(DESCRIPTION_MARKER))
        .find_map(|script| {
            DESCRIPTION_RE
                .captures(&script)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        });

    let Some(raw) = raw else {
        return String::new();
    };

    let decoded = unescape_json_str(&raw).unwrap_or_else(|| raw.replace("\\n", " "));
    truncate_words(&decoded.replace('\n', " "), DESCRIPTION_WORD_LIMIT)
}

/// Keep the first `max_words` whitespace-separated words, appending `...`
/// only when words were dropped.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out = words
        .iter()
        .take(max_words)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > max_words {
        out.push_str("...");
    }
    out
}

/// Title followed by the first few words of the description.
pub fn build_query(title: &str, description: &str) -> String {
    let words: Vec<&str> = description
        .split_whitespace()
        .take(QUERY_DESCRIPTION_WORDS)
        .collect();
    format!("{title} {}", words.join(" ")).trim().to_string()
}

/// Decode the contents of a JSON string literal (without its quotes).
pub fn unescape_json_str(raw: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).ok()
}
