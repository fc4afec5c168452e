//! Picks the acquisition path a borrow will follow.

use std::collections::HashSet;

use tracing::debug;

use super::path::{AcquisitionPath, linearize};
use crate::catalog::CatalogEntry;

/// Returns the first fully supported path in original offer order.
///
/// A path is supported when every element's full content type is in
/// `supported_types`. There is no further ranking: the first survivor wins.
/// `None` is an expected outcome for entries the client cannot handle.
#[must_use]
#[tracing::instrument(skip(supported_types, entry), fields(entry_id = %entry.id))]
pub fn pick_best(
    supported_types: &HashSet<String>,
    entry: &CatalogEntry,
) -> Option<AcquisitionPath> {
    let paths = linearize(&entry.acquisitions);
    debug!(candidates = paths.len(), "linearized acquisition paths");

    let chosen = paths
        .into_iter()
        .find(|path| path.is_supported_by(supported_types));

    match &chosen {
        Some(path) => debug!(
            final_type = %path.final_content_type(),
            elements = path.elements().len(),
            "selected acquisition path"
        ),
        None => debug!("no fully supported acquisition path"),
    }
    chosen
}
