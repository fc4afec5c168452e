//! Content packaged with the client instead of fetched over the network.

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

/// URL scheme of bundled content targets.
pub const BUNDLED_SCHEME: &str = "simplified-bundled";

/// Maps bundled targets onto local files.
pub trait BundledContentResolver: Send + Sync {
    /// Returns the local file for `target`, if it is bundled.
    fn resolve(&self, target: &Url) -> Option<PathBuf>;
}

/// Resolver over a fixed name-to-file table.
///
/// `simplified-bundled:name` resolves to the file registered for `name`.
#[derive(Debug, Default, Clone)]
pub struct StaticBundledContent {
    files: HashMap<String, PathBuf>,
}

impl StaticBundledContent {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        self.files.insert(name.into(), file.into());
        self
    }
}

impl BundledContentResolver for StaticBundledContent {
    fn resolve(&self, target: &Url) -> Option<PathBuf> {
        if target.scheme() != BUNDLED_SCHEME {
            return None;
        }
        self.files.get(target.path().trim_start_matches('/')).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_only_bundled_scheme() {
        let bundled = StaticBundledContent::new().with_file("help.epub", "/opt/help.epub");
        let hit = Url::parse("simplified-bundled:help.epub").unwrap();
        let miss = Url::parse("https://cdn.example/help.epub").unwrap();
        assert_eq!(bundled.resolve(&hit), Some(PathBuf::from("/opt/help.epub")));
        assert_eq!(bundled.resolve(&miss), None);
        assert_eq!(
            bundled.resolve(&Url::parse("simplified-bundled:other").unwrap()),
            None
        );
    }
}
