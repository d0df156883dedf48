use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A physical input file contributing to a dataset, identified by path,
/// mtime (epoch milliseconds) and content hash. Two loads presenting the
/// same source set are a no-op for the loader.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub time: i64,
    pub hash: String,
}

impl SourceFile {
    #[must_use]
    pub fn new(name: impl Into<String>, time: i64, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time,
            hash: hash.into(),
        }
    }

    /// Order-insensitive set equality between two source lists.
    #[must_use]
    pub fn same_set(a: &[SourceFile], b: &[SourceFile]) -> bool {
        a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
    }
}
