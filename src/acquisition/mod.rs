//! Acquisition path model and selection.
//!
//! A catalog entry declares acquisition offers, each possibly requiring a tree
//! of indirect content-type transformations. This module flattens those trees
//! into linear [`AcquisitionPath`]s and picks the one a borrow will execute.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use borrow_core::acquisition::pick_best;
//! use borrow_core::catalog::CatalogEntry;
//!
//! let entry = CatalogEntry::from_json(br#"{
//!     "id": "urn:x", "title": "X",
//!     "acquisitions": [{"relation": "open_access",
//!                       "target": "https://a.example/x.epub",
//!                       "type": "application/epub+zip"}]
//! }"#).unwrap();
//! let supported: HashSet<String> = ["application/epub+zip".to_string()].into();
//! assert!(pick_best(&supported, &entry).is_some());
//! ```

mod path;
mod selector;

pub use path::{AcquisitionPath, PathElement, linearize};
pub use selector::pick_best;
