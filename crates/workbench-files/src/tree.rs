//! The set of files known to exist in the current workspace.

use std::collections::BTreeSet;

/// Known file paths, used to validate persisted tab ids at hydration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    paths: BTreeSet<String>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from file paths. Leading `./` and `/` are stripped.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    pub fn insert(&mut self, path: &str) -> bool {
        self.paths.insert(normalize(path).to_string())
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(normalize(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(normalize(path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches("./").trim_start_matches('/')
}
