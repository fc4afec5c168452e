//! Linear acquisition paths derived from acquisition offer trees.

use std::collections::HashSet;

use url::Url;

use crate::catalog::{AcquisitionOffer, AcquisitionRelation, IndirectOffer};
use crate::mime::MimeType;

/// One step of an acquisition path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    /// Content type expected at this step.
    pub content_type: MimeType,
    /// Address to request, when known up front.
    ///
    /// Only the first element of a path carries the offer's real target.
    /// Later elements are `None`; a subtask may discover the address at run time.
    pub target: Option<Url>,
}

impl PathElement {
    /// Creates a path element.
    #[must_use]
    pub fn new(content_type: MimeType, target: Option<Url>) -> Self {
        Self {
            content_type,
            target,
        }
    }
}

/// An immutable, non-empty, linear route from an offer to final content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPath {
    relation: AcquisitionRelation,
    elements: Vec<PathElement>,
    final_content_type: MimeType,
}

impl AcquisitionPath {
    /// Builds a path from a non-empty element list. Returns `None` for an empty list.
    #[must_use]
    pub fn from_elements(relation: AcquisitionRelation, elements: Vec<PathElement>) -> Option<Self> {
        let final_content_type = elements.last()?.content_type.clone();
        Some(Self {
            relation,
            elements,
            final_content_type,
        })
    }

    /// Linearizes a single offer: one path per leaf of its indirect tree.
    ///
    /// An offer with no indirect children yields exactly one single-element path.
    #[must_use]
    pub fn linearize(offer: &AcquisitionOffer) -> Vec<AcquisitionPath> {
        let root = PathElement::new(offer.content_type.clone(), Some(offer.target.clone()));
        let mut paths = Vec::new();

        if offer.indirect.is_empty() {
            paths.push(Self {
                relation: offer.relation,
                final_content_type: root.content_type.clone(),
                elements: vec![root],
            });
            return paths;
        }

        let mut prefix = vec![root];
        for child in &offer.indirect {
            walk(offer.relation, &mut prefix, child, &mut paths);
        }
        paths
    }

    /// Relation of the offer this path came from.
    #[must_use]
    pub fn relation(&self) -> AcquisitionRelation {
        self.relation
    }

    /// Elements in execution order.
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Content type of the last element.
    #[must_use]
    pub fn final_content_type(&self) -> &MimeType {
        &self.final_content_type
    }

    /// Returns true if every element's full type is in `supported`.
    #[must_use]
    pub fn is_supported_by(&self, supported: &HashSet<String>) -> bool {
        self.elements
            .iter()
            .all(|element| supported.contains(&element.content_type.full_type()))
    }
}

fn walk(
    relation: AcquisitionRelation,
    prefix: &mut Vec<PathElement>,
    node: &IndirectOffer,
    paths: &mut Vec<AcquisitionPath>,
) {
    prefix.push(PathElement::new(node.content_type.clone(), None));
    if node.indirect.is_empty() {
        paths.push(AcquisitionPath {
            relation,
            elements: prefix.clone(),
            final_content_type: node.content_type.clone(),
        });
    } else {
        for child in &node.indirect {
            walk(relation, prefix, child, paths);
        }
    }
    prefix.pop();
}

/// Linearizes every offer, preserving offer order and depth-first leaf order.
#[must_use]
pub fn linearize(offers: &[AcquisitionOffer]) -> Vec<AcquisitionPath> {
    offers.iter().flat_map(AcquisitionPath::linearize).collect()
}
