//! Catalog entry model: what a library feed tells us about a publication.
//!
//! Entries are exchanged as JSON. The same shape is used for feed entries
//! handed to a borrow and for the refreshed entry a loan request returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::mime::MimeType;

/// The relation an acquisition offer declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionRelation {
    /// Borrow from the library.
    Borrow,
    /// Purchase.
    Buy,
    /// Generic acquisition of content already on loan.
    Generic,
    /// Freely available content.
    OpenAccess,
    /// A preview sample.
    Sample,
    /// Subscription-gated content.
    Subscribe,
}

/// A further content-type transformation required before final content is reached.
///
/// A leaf of the indirect tree has no children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectOffer {
    /// Content type produced at this step.
    #[serde(rename = "type")]
    pub content_type: MimeType,
    /// Further transformations, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indirect: Vec<IndirectOffer>,
}

impl IndirectOffer {
    /// Creates a leaf indirect offer.
    #[must_use]
    pub fn leaf(content_type: MimeType) -> Self {
        Self {
            content_type,
            indirect: Vec::new(),
        }
    }

    /// Creates an indirect offer with children.
    #[must_use]
    pub fn with_children(content_type: MimeType, indirect: Vec<IndirectOffer>) -> Self {
        Self {
            content_type,
            indirect,
        }
    }
}

/// One declared way of obtaining a publication's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionOffer {
    /// Relation of the offer.
    pub relation: AcquisitionRelation,
    /// Address to request.
    pub target: Url,
    /// Content type immediately available at `target`.
    #[serde(rename = "type")]
    pub content_type: MimeType,
    /// Transformations needed after the first request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indirect: Vec<IndirectOffer>,
}

/// Circulation state of a publication as the library reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// Open access; no loan needed.
    OpenAccess,
    /// Copies are available to borrow.
    #[default]
    Available,
    /// A hold is in place and the patron is waiting in line.
    Reserved {
        /// Position in the hold queue, if reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<u32>,
    },
    /// A held copy is ready to be borrowed.
    Ready,
    /// On loan to the patron.
    Loaned {
        /// End of the loan period, if reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<DateTime<Utc>>,
    },
    /// Neither borrowable nor holdable.
    Unavailable,
}

/// A publication entry from a catalog feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Feed-stable identifier; book IDs are derived from it.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Author names in feed order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Circulation state.
    #[serde(default)]
    pub availability: Availability,
    /// Acquisition offers in feed order.
    #[serde(default)]
    pub acquisitions: Vec<AcquisitionOffer>,
    /// Full-size cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<Url>,
    /// Thumbnail image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Url>,
}

impl CatalogEntry {
    /// Parses an entry from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the document is not a
    /// valid entry.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns the loan end date when the entry is on loan.
    #[must_use]
    pub fn loan_expiry(&self) -> Option<DateTime<Utc>> {
        match &self.availability {
            Availability::Loaned { until } => *until,
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ENTRY_JSON: &str = r#"{
        "id": "urn:uuid:1234",
        "title": "A Tale",
        "authors": ["Someone"],
        "availability": {"state": "loaned", "until": "2030-01-01T00:00:00Z"},
        "acquisitions": [{
            "relation": "borrow",
            "target": "https://library.example/borrow/1",
            "type": "application/opds-publication+json",
            "indirect": [{"type": "application/epub+zip"}]
        }]
    }"#;

    #[test]
    fn test_entry_from_json() {
        let entry = CatalogEntry::from_json(ENTRY_JSON.as_bytes()).unwrap();
        assert_eq!(entry.id, "urn:uuid:1234");
        assert_eq!(entry.acquisitions.len(), 1);
        let offer = &entry.acquisitions[0];
        assert_eq!(offer.relation, AcquisitionRelation::Borrow);
        assert_eq!(offer.indirect.len(), 1);
        assert!(offer.indirect[0].indirect.is_empty());
        assert!(entry.loan_expiry().is_some());
    }

    #[test]
    fn test_entry_defaults_to_available() {
        let entry = CatalogEntry::from_json(br#"{"id": "x", "title": "t"}"#).unwrap();
        assert_eq!(entry.availability, Availability::Available);
        assert!(entry.acquisitions.is_empty());
        assert!(entry.loan_expiry().is_none());
    }

    #[test]
    fn test_reserved_position_parses() {
        let entry = CatalogEntry::from_json(
            br#"{"id": "x", "title": "t", "availability": {"state": "reserved", "position": 3}}"#,
        )
        .unwrap();
        assert_eq!(
            entry.availability,
            Availability::Reserved { position: Some(3) }
        );
    }

    #[test]
    fn test_invalid_content_type_rejected() {
        let result = CatalogEntry::from_json(
            br#"{"id": "x", "title": "t", "acquisitions": [{"relation": "borrow", "target": "https://a.example/", "type": "nonsense"}]}"#,
        );
        assert!(result.is_err());
    }
}
