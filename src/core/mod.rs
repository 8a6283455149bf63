pub mod engine;
pub mod error;
pub mod protocol;
pub mod rules;
pub mod scanner;
pub mod tags;

use std::collections::BTreeMap;

/// Aggregate tag usage: namespace to tag to occurrence count.
///
/// `BTreeMap` keeps iteration lexicographic, so any projection of the index
/// is deterministic without re-sorting. Built once per successful scan and
/// replaced wholesale, never merged.
pub type TagIndex = BTreeMap<String, BTreeMap<String, usize>>;

pub use engine::{apply_changes, preview_changes, RemovalMatcher};
pub use error::CoreError;
pub use scanner::scan_directory;
