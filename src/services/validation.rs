//! Run-aborting validation errors and upfront checks.
//!
//! Everything here runs before a relocation or propagation touches the
//! filesystem or the host scene. A failure means nothing was mutated.

use crate::models::{DependencySet, FarmSettings};
use crate::services::naming::NamingError;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use thiserror::Error;

/// Fatal, pre-mutation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cannot relocate a project with broken dependencies:{}", broken_listing(.invalid, .nonexistent, .references))]
    BrokenDependencies {
        /// On disk but outside the project root
        invalid: Vec<Utf8PathBuf>,
        nonexistent: Vec<Utf8PathBuf>,
        /// References that are missing or outside the project root
        references: Vec<Utf8PathBuf>,
    },

    #[error("Scene {scene} is not inside the project {root}")]
    SceneOutsideProject { scene: Utf8PathBuf, root: Utf8PathBuf },

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("Asset list unavailable: {0}")]
    AssetRegistry(String),

    #[error("Lighting config {0} does not exist")]
    MissingDocument(Utf8PathBuf),

    #[error("Lighting config {path} could not be read: {reason}")]
    UnreadableDocument { path: Utf8PathBuf, reason: String },

    #[error("This machine ({hostname}) is not in a lab with render farm access. Allowed labs: {}", .allowed.join(", "))]
    FarmAccess { hostname: String, allowed: Vec<String> },

    #[error("Render drive {0} is not mapped")]
    RenderDriveMissing(Utf8PathBuf),
}

fn broken_listing(
    invalid: &[Utf8PathBuf],
    nonexistent: &[Utf8PathBuf],
    references: &[Utf8PathBuf],
) -> String {
    let mut out = String::new();
    let groups = [
        ("Outside the project", invalid),
        ("Missing files", nonexistent),
        ("Unrelocatable references", references),
    ];
    for (title, paths) in groups {
        if paths.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}:", title));
        for path in paths {
            out.push_str(&format!("\n\t{}", path));
        }
    }
    out
}

impl ValidationError {
    /// Total number of offending paths, for broken-dependency failures.
    pub fn broken_path_count(&self) -> usize {
        match self {
            ValidationError::BrokenDependencies {
                invalid,
                nonexistent,
                references,
            } => invalid.len() + nonexistent.len() + references.len(),
            _ => 0,
        }
    }
}

/// Fail if `deps` (plus any unrelocatable references) would leave the
/// relocated project broken.
pub fn check_dependencies(
    deps: &DependencySet,
    bad_references: &[Utf8PathBuf],
) -> Result<(), ValidationError> {
    if !deps.has_broken_paths() && bad_references.is_empty() {
        return Ok(());
    }
    Err(ValidationError::BrokenDependencies {
        invalid: deps.invalid().iter().cloned().collect(),
        nonexistent: deps.nonexistent().iter().cloned().collect(),
        references: bad_references.to_vec(),
    })
}

/// Lab a machine belongs to, from its hostname.
///
/// Lab machines are named `{lab}PC{nn}`, sometimes with an `X-` prefix.
pub fn lab_of(hostname: &str) -> Option<String> {
    let upper = hostname.trim().to_uppercase();
    let name = upper.strip_prefix("X-").unwrap_or(&upper);
    let (lab, _) = name.split_once("PC")?;
    if lab.is_empty() {
        None
    } else {
        Some(lab.to_string())
    }
}

/// Gate farm submissions on the machine's lab and the render drive.
pub fn check_farm_access<F>(
    hostname: &str,
    farm: &FarmSettings,
    drive_exists: F,
) -> Result<String, ValidationError>
where
    F: Fn(&Utf8Path) -> bool,
{
    let allowed: BTreeSet<String> = farm.allowed_labs.iter().map(|l| l.to_uppercase()).collect();
    let lab = lab_of(hostname)
        .filter(|lab| allowed.contains(lab))
        .ok_or_else(|| ValidationError::FarmAccess {
            hostname: hostname.to_string(),
            allowed: farm.allowed_labs.clone(),
        })?;

    if !drive_exists(&farm.render_drive) {
        return Err(ValidationError::RenderDriveMissing(farm.render_drive.clone()));
    }

    tracing::info!("Farm access granted for {} (lab {})", hostname, lab);
    Ok(lab)
}
