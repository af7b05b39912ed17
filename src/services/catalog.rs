//! Dependency classification for project relocation.

use crate::host::{HostError, PathRegistry, ReferenceRegistry, SceneContext};
use crate::models::{DependencyCategory, DependencySet, ProjectRoot};
use camino::{Utf8Path, Utf8PathBuf};

/// Classifies every file dependency of the active scene.
///
/// Pure over the host's reported path lists; the only outside input is
/// whether each file exists on disk.
pub struct PathCatalog;

impl PathCatalog {
    /// Classify the active scene's dependencies against `project`.
    ///
    /// A host reporting no dependency directories yields an empty file-usage
    /// classification rather than an error.
    pub fn classify<H>(
        host: &H,
        ctx: &SceneContext,
        project: &ProjectRoot,
    ) -> Result<DependencySet, HostError>
    where
        H: PathRegistry + ReferenceRegistry + ?Sized,
    {
        let mut usages = Vec::new();
        for dir in host.list_directories(ctx)? {
            for file in host.list_files(ctx, &dir)? {
                usages.push(dir.join(file));
            }
        }

        let references: Vec<Utf8PathBuf> = host
            .list_references(ctx)?
            .into_iter()
            .map(|r| r.file)
            .collect();

        let deps = Self::classify_paths(&usages, &references, project, |p| p.exists());

        tracing::info!(
            "Classified {} dependencies of {}: {} valid, {} references, {} invalid, {} nonexistent",
            deps.len(),
            ctx.scene_file,
            deps.valid().len(),
            deps.references().len(),
            deps.invalid().len(),
            deps.nonexistent().len()
        );
        Ok(deps)
    }

    /// Classification over plain path lists with an injected existence check.
    ///
    /// File usages are filed as valid, invalid or nonexistent; every reference
    /// is filed under references regardless of location and takes precedence
    /// over a file usage of the same path.
    pub fn classify_paths<F>(
        usages: &[Utf8PathBuf],
        references: &[Utf8PathBuf],
        project: &ProjectRoot,
        exists: F,
    ) -> DependencySet
    where
        F: Fn(&Utf8Path) -> bool,
    {
        let mut deps = DependencySet::new();

        for path in references {
            deps.insert(DependencyCategory::Reference, path.clone());
        }

        for path in usages {
            let category = if !exists(path.as_path()) {
                DependencyCategory::Nonexistent
            } else if project.contains(path) {
                DependencyCategory::Valid
            } else {
                DependencyCategory::Invalid
            };
            if deps.insert(category, path.clone()) {
                tracing::debug!("{}: {}", category.label(), path);
            }
        }

        deps
    }

    /// References that cannot be relocated: missing on disk or outside the
    /// project root.
    pub fn unrelocatable_references<F>(
        deps: &DependencySet,
        project: &ProjectRoot,
        exists: F,
    ) -> Vec<Utf8PathBuf>
    where
        F: Fn(&Utf8Path) -> bool,
    {
        deps.references()
            .iter()
            .filter(|r| !exists(r.as_path()) || !project.contains(r.as_path()))
            .cloned()
            .collect()
    }
}
