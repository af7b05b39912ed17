use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

/// A filesystem path at the top of a project tree.
///
/// Source and destination roots are both `ProjectRoot`s; relocation rewrites
/// every dependency by swapping the source prefix for the destination prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRoot {
    path: Utf8PathBuf,
}

impl ProjectRoot {
    pub fn new<P: Into<Utf8PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Name of the project, taken from the final path segment.
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    /// True if `path` lies inside this root (component-wise, so `/proj` does
    /// not contain `/project`).
    pub fn contains(&self, path: &Utf8Path) -> bool {
        path.starts_with(&self.path)
    }

    /// Re-root `path` from this root onto `dest`.
    ///
    /// Returns `None` when `path` is not inside this root.
    pub fn remap(&self, path: &Utf8Path, dest: &ProjectRoot) -> Option<Utf8PathBuf> {
        let relative = path.strip_prefix(&self.path).ok()?;
        if relative.as_str().is_empty() {
            return Some(dest.path.clone());
        }
        Some(dest.path.join(relative))
    }

    /// The root a project with this name would have inside `parent`.
    pub fn under(&self, parent: &Utf8Path) -> ProjectRoot {
        ProjectRoot::new(parent.join(self.name()))
    }
}

impl std::fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Category a recorded dependency falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyCategory {
    /// Exists on disk inside the project root
    Valid,
    /// Nested scene file
    Reference,
    /// Exists on disk but outside the project root
    Invalid,
    /// Recorded but missing on disk
    Nonexistent,
}

impl DependencyCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DependencyCategory::Valid => "valid",
            DependencyCategory::Reference => "references",
            DependencyCategory::Invalid => "invalid",
            DependencyCategory::Nonexistent => "nonexistent",
        }
    }
}

/// Every file dependency of the active scene, split into four disjoint sets.
///
/// Rebuilt on every relocation request and never persisted. The insertion
/// methods keep the sets disjoint: a path already claimed by `references`
/// is never filed anywhere else, and adding a reference evicts the path from
/// the file-usage categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    valid: BTreeSet<Utf8PathBuf>,
    references: BTreeSet<Utf8PathBuf>,
    invalid: BTreeSet<Utf8PathBuf>,
    nonexistent: BTreeSet<Utf8PathBuf>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a path under `category`, keeping the four sets disjoint.
    ///
    /// Returns false if the path was already recorded and nothing changed.
    pub fn insert(&mut self, category: DependencyCategory, path: Utf8PathBuf) -> bool {
        match category {
            DependencyCategory::Reference => {
                self.valid.remove(&path);
                self.invalid.remove(&path);
                self.nonexistent.remove(&path);
                self.references.insert(path)
            }
            _ if self.category_of(&path).is_some() => false,
            DependencyCategory::Valid => self.valid.insert(path),
            DependencyCategory::Invalid => self.invalid.insert(path),
            DependencyCategory::Nonexistent => self.nonexistent.insert(path),
        }
    }

    pub fn category_of(&self, path: &Utf8Path) -> Option<DependencyCategory> {
        if self.references.contains(path) {
            Some(DependencyCategory::Reference)
        } else if self.valid.contains(path) {
            Some(DependencyCategory::Valid)
        } else if self.invalid.contains(path) {
            Some(DependencyCategory::Invalid)
        } else if self.nonexistent.contains(path) {
            Some(DependencyCategory::Nonexistent)
        } else {
            None
        }
    }

    pub fn valid(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.valid
    }

    pub fn references(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.references
    }

    pub fn invalid(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.invalid
    }

    pub fn nonexistent(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.nonexistent
    }

    /// True if relocating with this set would leave a broken dependency graph.
    pub fn has_broken_paths(&self) -> bool {
        !self.invalid.is_empty() || !self.nonexistent.is_empty()
    }

    pub fn len(&self) -> usize {
        self.valid.len() + self.references.len() + self.invalid.len() + self.nonexistent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All recorded paths, in category order.
    pub fn iter(&self) -> impl Iterator<Item = (DependencyCategory, &Utf8PathBuf)> {
        self.valid
            .iter()
            .map(|p| (DependencyCategory::Valid, p))
            .chain(self.references.iter().map(|p| (DependencyCategory::Reference, p)))
            .chain(self.invalid.iter().map(|p| (DependencyCategory::Invalid, p)))
            .chain(self.nonexistent.iter().map(|p| (DependencyCategory::Nonexistent, p)))
    }
}
