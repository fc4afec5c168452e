//! Audio manifest parsing.
//!
//! [`ReadiumManifestParser`] reads Readium Web Publication Manifest JSON.
//! Structural problems are errors; tolerable oddities are warnings. Metadata
//! keys outside the core vocabulary survive only when they belong to a
//! declared extension namespace (`namespace:key`).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Metadata keys every manifest may carry.
const CORE_METADATA_KEYS: &[&str] = &[
    "@type",
    "identifier",
    "title",
    "subtitle",
    "author",
    "narrator",
    "publisher",
    "language",
    "duration",
    "modified",
    "published",
    "description",
    "subject",
    "encrypted",
];

/// A warning or error located in the manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// JSON path, e.g. `readingOrder[2].href`.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl ParseIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of a parse, carrying warnings either way.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T> {
    /// Parsed.
    Success {
        /// Parsed value.
        result: T,
        /// Non-fatal issues.
        warnings: Vec<ParseIssue>,
    },
    /// Not parsed.
    Failure {
        /// Fatal issues; never empty.
        errors: Vec<ParseIssue>,
        /// Non-fatal issues.
        warnings: Vec<ParseIssue>,
    },
}

/// One playable segment or auxiliary resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestLink {
    /// Resource address, possibly relative.
    pub href: String,
    /// Declared media type.
    pub content_type: Option<String>,
    /// Title of the segment.
    pub title: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Encryption scheme from `properties.encrypted.scheme`.
    pub encryption_scheme: Option<String>,
}

/// A parsed audiobook manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioManifest {
    /// Publication identifier.
    pub identifier: Option<String>,
    /// Publication title.
    pub title: String,
    /// Total duration in seconds, when declared.
    pub duration: Option<f64>,
    /// Publication-wide encryption scheme from `metadata.encrypted.scheme`.
    pub encryption_scheme: Option<String>,
    /// Playable segments in order.
    pub reading_order: Vec<ManifestLink>,
    /// Other links (cover, self, license).
    pub links: Vec<ManifestLink>,
    /// Metadata of declared extensions, keyed `namespace:key`.
    pub extensions: BTreeMap<String, Value>,
}

/// Turns manifest bytes into an [`AudioManifest`].
pub trait ManifestParser: Send + Sync {
    /// Parses `data`, preserving metadata of the declared `extensions`.
    fn parse(&self, data: &[u8], extensions: &[String]) -> ParseResult<AudioManifest>;
}

/// Parser for Readium Web Publication Manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadiumManifestParser;

impl ManifestParser for ReadiumManifestParser {
    fn parse(&self, data: &[u8], extensions: &[String]) -> ParseResult<AudioManifest> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let document: Value = match serde_json::from_slice(data) {
            Ok(value) => value,
            Err(e) => {
                return ParseResult::Failure {
                    errors: vec![ParseIssue::new("$", format!("invalid JSON: {e}"))],
                    warnings,
                };
            }
        };
        let Some(root) = document.as_object() else {
            return ParseResult::Failure {
                errors: vec![ParseIssue::new("$", "manifest is not a JSON object")],
                warnings,
            };
        };

        let empty = Map::new();
        let metadata = match root.get("metadata") {
            Some(Value::Object(metadata)) => metadata,
            Some(_) => {
                errors.push(ParseIssue::new("metadata", "must be an object"));
                &empty
            }
            None => {
                errors.push(ParseIssue::new("metadata", "missing"));
                &empty
            }
        };

        let title = metadata.get("title").and_then(localized_string);
        if title.is_none() && root.get("metadata").is_some_and(Value::is_object) {
            errors.push(ParseIssue::new("metadata.title", "missing or not a string"));
        }

        let mut extension_values = BTreeMap::new();
        for (key, value) in metadata {
            if CORE_METADATA_KEYS.contains(&key.as_str()) {
                continue;
            }
            let namespace = key.split_once(':').map(|(namespace, _)| namespace);
            match namespace {
                Some(namespace) if extensions.iter().any(|ext| ext == namespace) => {
                    extension_values.insert(key.clone(), value.clone());
                }
                _ => warnings.push(ParseIssue::new(
                    format!("metadata.{key}"),
                    "unknown metadata key ignored",
                )),
            }
        }

        let reading_order = match root.get("readingOrder") {
            Some(Value::Array(items)) if !items.is_empty() => {
                parse_links("readingOrder", items, &mut errors)
            }
            Some(Value::Array(_)) => {
                errors.push(ParseIssue::new("readingOrder", "must not be empty"));
                Vec::new()
            }
            Some(_) => {
                errors.push(ParseIssue::new("readingOrder", "must be an array"));
                Vec::new()
            }
            None => {
                errors.push(ParseIssue::new("readingOrder", "missing"));
                Vec::new()
            }
        };

        let links = match root.get("links") {
            Some(Value::Array(items)) => {
                // broken auxiliary links are tolerated
                let mut link_errors = Vec::new();
                let links = parse_links("links", items, &mut link_errors);
                warnings.extend(link_errors);
                links
            }
            Some(_) => {
                warnings.push(ParseIssue::new("links", "not an array; ignored"));
                Vec::new()
            }
            None => Vec::new(),
        };

        if !errors.is_empty() {
            return ParseResult::Failure { errors, warnings };
        }

        ParseResult::Success {
            result: AudioManifest {
                identifier: metadata
                    .get("identifier")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                title: title.unwrap_or_default(),
                duration: metadata.get("duration").and_then(Value::as_f64),
                encryption_scheme: metadata.get("encrypted").and_then(encryption_scheme),
                reading_order,
                links,
                extensions: extension_values,
            },
            warnings,
        }
    }
}

/// Accepts a plain string or a language map (first value wins).
fn localized_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.values().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn encryption_scheme(value: &Value) -> Option<String> {
    value.get("scheme").and_then(Value::as_str).map(str::to_string)
}

fn parse_links(section: &str, items: &[Value], errors: &mut Vec<ParseIssue>) -> Vec<ManifestLink> {
    let mut links = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(href) = item.get("href").and_then(Value::as_str) else {
            errors.push(ParseIssue::new(
                format!("{section}[{index}].href"),
                "missing or not a string",
            ));
            continue;
        };
        links.push(ManifestLink {
            href: href.to_string(),
            content_type: item.get("type").and_then(Value::as_str).map(str::to_string),
            title: item.get("title").and_then(Value::as_str).map(str::to_string),
            duration: item.get("duration").and_then(Value::as_f64),
            encryption_scheme: item
                .get("properties")
                .and_then(|properties| properties.get("encrypted"))
                .and_then(encryption_scheme),
        });
    }
    links
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "metadata": {
            "identifier": "urn:isbn:9780000000001",
            "title": {"en": "The Audio Book"},
            "duration": 3600.5,
            "findaway:fulfillmentId": "42",
            "mystery": true
        },
        "readingOrder": [
            {"href": "part1.mp3", "type": "audio/mpeg", "duration": 1800.0},
            {"href": "part2.mp3", "type": "audio/mpeg", "duration": 1800.5,
             "properties": {"encrypted": {"scheme": "http://example.org/drm"}}}
        ],
        "links": [{"rel": "cover"}, {"href": "cover.jpg", "type": "image/jpeg"}]
    }"#;

    fn parse(data: &str, extensions: &[&str]) -> ParseResult<AudioManifest> {
        let extensions: Vec<String> = extensions.iter().map(|e| (*e).to_string()).collect();
        ReadiumManifestParser.parse(data.as_bytes(), &extensions)
    }

    #[test]
    fn test_parses_reading_order_and_metadata() {
        let ParseResult::Success { result, warnings } = parse(MANIFEST, &["findaway"]) else {
            panic!("expected success");
        };
        assert_eq!(result.title, "The Audio Book");
        assert_eq!(result.identifier.as_deref(), Some("urn:isbn:9780000000001"));
        assert_eq!(result.reading_order.len(), 2);
        assert_eq!(
            result.reading_order[1].encryption_scheme.as_deref(),
            Some("http://example.org/drm")
        );
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.extensions["findaway:fulfillmentId"], "42");
        // "mystery" plus the href-less link
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_undeclared_extension_is_warning_and_dropped() {
        let ParseResult::Success { result, warnings } = parse(MANIFEST, &[]) else {
            panic!("expected success");
        };
        assert!(result.extensions.is_empty());
        assert!(
            warnings
                .iter()
                .any(|w| w.path == "metadata.findaway:fulfillmentId")
        );
    }

    #[test]
    fn test_missing_reading_order_is_error() {
        let ParseResult::Failure { errors, .. } = parse(r#"{"metadata": {"title": "x"}}"#, &[])
        else {
            panic!("expected failure");
        };
        assert_eq!(errors, vec![ParseIssue::new("readingOrder", "missing")]);
    }

    #[test]
    fn test_every_structural_error_reported() {
        let ParseResult::Failure { errors, .. } =
            parse(r#"{"metadata": {}, "readingOrder": [{"type": "audio/mpeg"}]}"#, &[])
        else {
            panic!("expected failure");
        };
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["metadata.title", "readingOrder[0].href"]);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            parse("not json", &[]),
            ParseResult::Failure { .. }
        ));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        assert_eq!(parse(MANIFEST, &["findaway"]), parse(MANIFEST, &["findaway"]));
    }
}
