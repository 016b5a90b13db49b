//! Structured extractor: parses the payload as JSON and walks known paths.

use serde_json::Value;

use super::{FieldExtractor, ItemFields, present};

/// Reads fields from a well-formed item renderer object.
pub struct StructuredExtractor;

impl FieldExtractor for StructuredExtractor {
    fn extract(&self, payload: &str) -> ItemFields {
        let Ok(value) = serde_json::from_str::<Value>(payload) else {
            return ItemFields::default();
        };

        let item_id = value.get("videoId").and_then(Value::as_str).map(String::from);

        // Newer payloads use runs, older ones a single simpleText
        let title = value
            .pointer("/title/runs/0/text")
            .or_else(|| value.pointer("/title/simpleText"))
            .and_then(Value::as_str)
            .map(String::from);

        let thumbnail_url = value
            .pointer("/thumbnail/thumbnails/0/url")
            .and_then(Value::as_str)
            .map(String::from);

        ItemFields {
            item_id: present(item_id),
            title: present(title),
            thumbnail_url: present(thumbnail_url),
        }
    }

    fn name(&self) -> &str {
        "structured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_simple_text_title() {
        let payload = r#"{"videoId":"v9","title":{"simpleText":"Plain"},"thumbnail":{"thumbnails":[]}}"#;
        let fields = StructuredExtractor.extract(payload);
        assert_eq!(fields.item_id.as_deref(), Some("v9"));
        assert_eq!(fields.title.as_deref(), Some("Plain"));
        assert_eq!(fields.thumbnail_url, None);
    }

    #[test]
    fn decodes_escapes_in_title() {
        let payload = r#"{"videoId":"v1","title":{"runs":[{"text":"Tom & \"Jerry\""}]}}"#;
        let fields = StructuredExtractor.extract(payload);
        assert_eq!(fields.title.as_deref(), Some("Tom & \"Jerry\""));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let payload = r#"{"videoId":"","title":{"runs":[{"text":"  "}]}}"#;
        assert_eq!(StructuredExtractor.extract(payload), ItemFields::default());
    }

    #[test]
    fn invalid_json_yields_nothing() {
        assert_eq!(StructuredExtractor.extract("{not json"), ItemFields::default());
    }
}
