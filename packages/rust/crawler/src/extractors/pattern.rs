//! Pattern extractor: independent regex matches over the raw payload text.
//!
//! Works on fragments that are not valid JSON, e.g. the object cut short by
//! the non-greedy fallback locator.

use std::sync::LazyLock;

use regex::Regex;

use super::{FieldExtractor, ItemFields, present};
use crate::listing::unescape_json_str;

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""videoId":"([^"]*)""#).expect("item id regex"));
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""title":\{"runs":\[\{"text":"((?:[^"\\]|\\.)*)""#).expect("title regex")
});
static THUMBNAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""thumbnail":\{"thumbnails":\[\{"url":"((?:[^"\\]|\\.)*)""#)
        .expect("thumbnail regex")
});

/// Regex-based fallback extractor.
pub struct PatternExtractor;

impl PatternExtractor {
    fn capture(re: &Regex, payload: &str) -> Option<String> {
        let raw = re.captures(payload)?.get(1)?.as_str();
        present(Some(unescape_json_str(raw).unwrap_or_else(|| raw.to_string())))
    }
}

impl FieldExtractor for PatternExtractor {
    fn extract(&self, payload: &str) -> ItemFields {
        ItemFields {
            item_id: Self::capture(&ITEM_ID_RE, payload),
            title: Self::capture(&TITLE_RE, payload),
            thumbnail_url: Self::capture(&THUMBNAIL_RE, payload),
        }
    }

    fn name(&self) -> &str {
        "pattern"
    }
}
