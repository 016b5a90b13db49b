//! Field extractor trait and the ordered extractor chain.
//!
//! Each extractor looks at the raw item payload and reports whichever of the
//! required fields it could find. The chain runs extractors in priority order
//! and later extractors only fill fields that are still missing.

mod pattern;
mod structured;

pub use pattern::PatternExtractor;
pub use structured::StructuredExtractor;

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Partially extracted item metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFields {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Item metadata with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreFields {
    pub item_id: String,
    pub title: String,
    pub thumbnail_url: String,
}

impl ItemFields {
    /// Fill any missing field from `other`. Present fields are never replaced.
    pub fn fill_from(&mut self, other: ItemFields) {
        if self.item_id.is_none() {
            self.item_id = other.item_id;
        }
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.thumbnail_url.is_none() {
            self.thumbnail_url = other.thumbnail_url;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.item_id.is_some() && self.title.is_some() && self.thumbnail_url.is_some()
    }

    /// Names of the required fields that are still absent.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.item_id.is_none() {
            missing.push("item_id");
        }
        if self.title.is_none() {
            missing.push("title");
        }
        if self.thumbnail_url.is_none() {
            missing.push("thumbnail_url");
        }
        missing
    }

    /// Convert to [`CoreFields`] only when all three fields are present.
    pub fn into_complete(self) -> Option<CoreFields> {
        Some(CoreFields {
            item_id: self.item_id?,
            title: self.title?,
            thumbnail_url: self.thumbnail_url?,
        })
    }
}

/// Keep only non-empty strings.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A single strategy for pulling item fields out of a payload.
pub trait FieldExtractor: Send + Sync {
    /// Report whichever fields this strategy can find.
    fn extract(&self, payload: &str) -> ItemFields;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Holds registered extractors in priority order.
pub struct ExtractorChain {
    extractors: Vec<Box<dyn FieldExtractor>>,
}

impl ExtractorChain {
    /// Structured parse first, pattern matching as the fallback.
    pub fn new() -> Self {
        Self {
            extractors: vec![Box::new(StructuredExtractor), Box::new(PatternExtractor)],
        }
    }

    /// Run extractors until every field is filled or the chain is exhausted.
    pub fn extract(&self, payload: &str) -> ItemFields {
        let mut fields = ItemFields::default();
        for extractor in &self.extractors {
            if fields.is_complete() {
                break;
            }
            let found = extractor.extract(payload);
            tracing::trace!(
                extractor = extractor.name(),
                item_id = found.item_id.is_some(),
                title = found.title.is_some(),
                thumbnail = found.thumbnail_url.is_some(),
                "extractor pass"
            );
            fields.fill_from(found);
        }
        fields
    }
}

impl Default for ExtractorChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"videoId":"abc123","thumbnail":{"thumbnails":[{"url":"https://i.ytimg.com/vi/abc123/hq.jpg","width":168}]},"title":{"runs":[{"text":"Launch Video"}],"accessibility":{}}}"#;

    #[test]
    fn structured_payload_fills_everything() {
        let fields = ExtractorChain::new().extract(PAYLOAD);
        assert_eq!(
            fields.into_complete(),
            Some(CoreFields {
                item_id: "abc123".into(),
                title: "Launch Video".into(),
                thumbnail_url: "https://i.ytimg.com/vi/abc123/hq.jpg".into(),
            })
        );
    }

    #[test]
    fn pattern_fills_gaps_when_payload_is_not_json() {
        // Truncated object from the non-greedy fallback pattern
        let truncated = r#"{"videoId":"xyz","thumbnail":{"thumbnails":[{"url":"https://img/x.jpg""#;
        let fields = ExtractorChain::new().extract(truncated);
        assert_eq!(fields.item_id.as_deref(), Some("xyz"));
        assert_eq!(fields.thumbnail_url.as_deref(), Some("https://img/x.jpg"));
        assert_eq!(fields.title, None);
        assert_eq!(fields.missing(), vec!["title"]);
        assert!(fields.into_complete().is_none());
    }

    #[test]
    fn fill_from_never_overwrites() {
        let mut fields = ItemFields {
            item_id: Some("first".into()),
            ..Default::default()
        };
        fields.fill_from(ItemFields {
            item_id: Some("second".into()),
            title: Some("t".into()),
            thumbnail_url: None,
        });
        assert_eq!(fields.item_id.as_deref(), Some("first"));
        assert_eq!(fields.title.as_deref(), Some("t"));
        assert!(!fields.is_complete());
    }

    #[test]
    fn empty_payload_has_nothing() {
        let fields = ExtractorChain::new().extract("");
        assert_eq!(fields, ItemFields::default());
        assert_eq!(fields.missing().len(), 3);
    }
}
