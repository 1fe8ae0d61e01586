//! Schema version extraction.
//!
//! A schema document declares its version in the top-level
//! `$schemaVersion` field. Extraction never fails hard: content without a
//! usable version yields [`Extraction::Skipped`] so the caller can move on
//! to the next commit.

use serde_json::Value;

use crate::error::SkipReason;

/// Field that carries the published version of a schema document.
pub const VERSION_FIELD: &str = "$schemaVersion";

/// Result of reading a schema document at one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Parsed { version: String },
    Skipped { reason: SkipReason },
}

impl Extraction {
    pub fn version(&self) -> Option<&str> {
        match self {
            Extraction::Parsed { version } => Some(version),
            Extraction::Skipped { .. } => None,
        }
    }
}

/// Extracts the declared version from raw schema content.
pub fn extract_version(content: &[u8]) -> Extraction {
    // Some historical schemas carry a UTF-8 BOM.
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

    let doc: Value = match serde_json::from_slice(content) {
        Ok(v) => v,
        Err(e) => {
            return Extraction::Skipped {
                reason: SkipReason::MalformedContent(e.to_string()),
            }
        }
    };

    let Some(obj) = doc.as_object() else {
        return Extraction::Skipped {
            reason: SkipReason::MalformedContent("schema root is not an object".to_string()),
        };
    };

    match obj.get(VERSION_FIELD).and_then(Value::as_str).map(str::trim) {
        Some(v) if !v.is_empty() => Extraction::Parsed {
            version: v.to_string(),
        },
        _ => Extraction::Skipped {
            reason: SkipReason::NoVersionField,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_schema_version() {
        let content = br#"{
            "$schema": "http://json-schema.org/schema#",
            "$schemaVersion": "0.1.2",
            "title": "Smart Data Models - Weather observed"
        }"#;
        assert_eq!(
            extract_version(content),
            Extraction::Parsed {
                version: "0.1.2".to_string()
            }
        );
    }

    #[test]
    fn missing_field_is_skipped() {
        let result = extract_version(br#"{"title": "no version"}"#);
        assert_eq!(
            result,
            Extraction::Skipped {
                reason: SkipReason::NoVersionField
            }
        );
    }

    #[test]
    fn empty_or_non_string_field_is_skipped() {
        assert_eq!(
            extract_version(br#"{"$schemaVersion": "  "}"#).version(),
            None
        );
        assert_eq!(extract_version(br#"{"$schemaVersion": 3}"#).version(), None);
    }

    #[test]
    fn nested_field_does_not_count() {
        let result = extract_version(br#"{"properties": {"$schemaVersion": "1.0.0"}}"#);
        assert_eq!(result.version(), None);
    }

    #[test]
    fn malformed_content_is_skipped() {
        match extract_version(b"{ not json") {
            Extraction::Skipped {
                reason: SkipReason::MalformedContent(_),
            } => {}
            other => panic!("unexpected: {:?}", other),
        }
        match extract_version(b"[1, 2]") {
            Extraction::Skipped {
                reason: SkipReason::MalformedContent(_),
            } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn tolerates_byte_order_mark() {
        let mut content = b"\xEF\xBB\xBF".to_vec();
        content.extend_from_slice(br#"{"$schemaVersion": "0.0.1"}"#);
        assert_eq!(extract_version(&content).version(), Some("0.0.1"));
    }
}
