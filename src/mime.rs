//! MIME type parsing and the content types the borrow pipeline knows about.
//!
//! Support checks compare *full types* (`type/subtype`, lower-cased) and ignore
//! parameters. Parameters are kept because some vendor types are only
//! distinguishable by them (e.g. `profile=audiobook`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EPUB publications.
pub const EPUB: &str = "application/epub+zip";
/// PDF publications.
pub const PDF: &str = "application/pdf";
/// HTML documents (login pages, web-only content).
pub const HTML: &str = "text/html";
/// Generic binary payloads; accepted in place of any expected book type.
pub const OCTET_STREAM: &str = "application/octet-stream";
/// OPDS 2 publication documents returned by loan requests.
pub const OPDS_PUBLICATION: &str = "application/opds-publication+json";
/// Short-lived bearer token documents that point at the real content.
pub const BEARER_TOKEN: &str = "application/vnd.librarysimplified.bearer-token+json";
/// Adobe ACSM fulfillment tokens.
pub const ADOBE_ACSM: &str = "application/vnd.adobe.adept+xml";
/// Readium audiobook manifests.
pub const AUDIOBOOK_MANIFEST: &str = "application/audiobook+json";
/// Findaway audiobook license documents.
pub const FINDAWAY_AUDIOBOOK: &str = "application/vnd.librarysimplified.findaway.license+json";
/// Feedbooks audiobook manifests.
pub const FEEDBOOKS_AUDIOBOOK: &str = "application/audiobook+json;profile=feedbooks";
/// OverDrive circulation documents; audiobooks carry `profile=audiobook`.
pub const OVERDRIVE_AUDIOBOOK: &str = "application/vnd.overdrive.circulation.api+json";

/// Error returned when a MIME type string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MIME type '{input}': {reason}")]
pub struct MimeTypeError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// A parsed MIME type with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MimeType {
    media_type: String,
    subtype: String,
    parameters: BTreeMap<String, String>,
}

impl MimeType {
    /// Parses a MIME type such as `application/epub+zip` or
    /// `application/vnd.overdrive.circulation.api+json; profile=audiobook`.
    ///
    /// # Errors
    ///
    /// Returns [`MimeTypeError`] when the `type/subtype` pair is missing or empty.
    pub fn parse(input: &str) -> Result<Self, MimeTypeError> {
        let mut sections = input.split(';');
        let essence = sections.next().map_or("", str::trim);
        let Some((media_type, subtype)) = essence.split_once('/') else {
            return Err(MimeTypeError {
                input: input.to_string(),
                reason: "missing '/' separator",
            });
        };
        let media_type = media_type.trim().to_ascii_lowercase();
        let subtype = subtype.trim().to_ascii_lowercase();
        if media_type.is_empty() || subtype.is_empty() {
            return Err(MimeTypeError {
                input: input.to_string(),
                reason: "empty type or subtype",
            });
        }

        let parameters = sections
            .filter_map(|section| {
                let (name, value) = section.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().trim_matches('"').to_string();
                (!name.is_empty()).then_some((name, value))
            })
            .collect();

        Ok(Self {
            media_type,
            subtype,
            parameters,
        })
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn full_type(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    /// Returns the value of a parameter, if present.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true if the full type equals `full_type` (case-insensitive).
    #[must_use]
    pub fn is(&self, full_type: &str) -> bool {
        self.full_type().eq_ignore_ascii_case(full_type)
    }

    /// Returns true for the OverDrive audiobook vendor type.
    #[must_use]
    pub fn is_vendor_audiobook(&self) -> bool {
        self.is(OVERDRIVE_AUDIOBOOK) && self.parameter("profile") == Some("audiobook")
    }

    /// Returns true for any manifest type the audio fulfillment pipeline accepts.
    #[must_use]
    pub fn is_audio_manifest(&self) -> bool {
        self.is(AUDIOBOOK_MANIFEST) || self.is(FINDAWAY_AUDIOBOOK) || self.is_vendor_audiobook()
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for MimeType {
    type Err = MimeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MimeType {
    type Error = MimeTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MimeType> for String {
    fn from(value: MimeType) -> Self {
        value.to_string()
    }
}

/// Normalizes a declared content type to the full-type form used in support sets.
///
/// Unparseable values are lower-cased and kept verbatim so they never match a
/// real path element by accident.
#[must_use]
pub fn normalize_full_type(value: &str) -> String {
    MimeType::parse(value).map_or_else(|_| value.trim().to_ascii_lowercase(), |m| m.full_type())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_type() {
        let mime = MimeType::parse("application/epub+zip").unwrap();
        assert_eq!(mime.full_type(), EPUB);
        assert_eq!(mime.to_string(), EPUB);
    }

    #[test]
    fn test_parse_lowercases_and_keeps_parameters() {
        let mime =
            MimeType::parse("Application/VND.OverDrive.Circulation.API+JSON; Profile=\"audiobook\"")
                .unwrap();
        assert_eq!(mime.full_type(), OVERDRIVE_AUDIOBOOK);
        assert_eq!(mime.parameter("profile"), Some("audiobook"));
        assert!(mime.is_vendor_audiobook());
        assert!(mime.is_audio_manifest());
    }

    #[test]
    fn test_overdrive_without_profile_is_not_audio() {
        let mime = MimeType::parse(OVERDRIVE_AUDIOBOOK).unwrap();
        assert!(!mime.is_vendor_audiobook());
        assert!(!mime.is_audio_manifest());
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        let err = MimeType::parse("epub").unwrap_err();
        assert!(err.to_string().contains("missing '/'"));
    }

    #[test]
    fn test_parse_rejects_empty_subtype() {
        assert!(MimeType::parse("application/").is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let mime = MimeType::parse(FEEDBOOKS_AUDIOBOOK).unwrap();
        let json = serde_json::to_string(&mime).unwrap();
        assert_eq!(json, "\"application/audiobook+json;profile=feedbooks\"");
        let back: MimeType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mime);
    }

    #[test]
    fn test_normalize_full_type_strips_parameters() {
        assert_eq!(normalize_full_type("Application/PDF; charset=x"), PDF);
        assert_eq!(normalize_full_type("garbage"), "garbage");
    }
}
