//! Project relocation: copy a classified project into a destination root and
//! repoint every path inside the copies.
//!
//! The procedure runs against the host's single active document, so each
//! step hands the [`SceneContext`] it got back from the host to the next one:
//!
//! 1. Classify and validate dependencies. Any broken path aborts here, before
//!    a single write.
//! 2. A scene already inside the destination only gets the project switch
//!    and its output directory.
//! 3. Copy the workspace file, valid dependencies, references and the scene.
//! 4. Switch the host project to the destination root.
//! 5. Open, rewrite and save each reference copy, one at a time.
//! 6. Reopen the scene copy, unload loaded references, rewrite, reload them,
//!    create the output directory and save.

use crate::host::{HostError, PathRegistry, ReferenceRegistry, SceneContext, SceneHost};
use crate::metrics::Metrics;
use crate::models::{CopyFailurePolicy, PipelineSettings, ProjectRoot, RunPhase, RunReport};
use crate::services::catalog::PathCatalog;
use crate::services::references::ReferenceUnloadGuard;
use crate::services::rewriter::PathRewriter;
use crate::services::validation::{ValidationError, check_dependencies};
use crate::state::{InvalidTransition, RunStateManager};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File, FileTimes};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Workspace rule naming the render output directory
const IMAGES_RULE: &str = "images";

/// Errors that stop a relocation
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to copy {source_path} to {dest_path}: {source}")]
    Copy {
        source_path: Utf8PathBuf,
        dest_path: Utf8PathBuf,
        source: io::Error,
    },

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir { path: Utf8PathBuf, source: io::Error },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// What a single [`ProjectMirror::copy`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination was not older than the source
    SkippedNewer,
}

/// Caller-supplied parameters of one relocation.
#[derive(Debug, Clone)]
pub struct RelocationOptions {
    pub source_root: ProjectRoot,
    pub dest_root: ProjectRoot,
    pub policy: CopyFailurePolicy,
    /// Output directory name used when the workspace has no images rule
    pub images_dir: String,
    /// Workspace definition file name, relative to the project root
    pub workspace_file: String,
}

impl RelocationOptions {
    pub fn new(source_root: ProjectRoot, dest_root: ProjectRoot, settings: &PipelineSettings) -> Self {
        Self {
            source_root,
            dest_root,
            policy: settings.copy_failure_policy,
            images_dir: settings.images_dir.clone(),
            workspace_file: settings.workspace_file.clone(),
        }
    }
}

/// Default destination for a user's copy of `source`:
/// `{renderfarm_dir}/{user}/{project name}`.
pub fn default_destination(settings: &PipelineSettings, user: &str, source: &ProjectRoot) -> ProjectRoot {
    source.under(&settings.renderfarm_dir.join(user))
}

/// Copies projects into a destination root and drives the relocation.
pub struct ProjectMirror {
    metrics: Arc<Metrics>,
    state: RunStateManager,
}

impl ProjectMirror {
    pub fn new(metrics: Arc<Metrics>, state: RunStateManager) -> Self {
        Self { metrics, state }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Copy one file, creating parent directories as needed.
    ///
    /// With `skip_if_newer`, an existing destination whose modification time
    /// is not older than the source is left alone. The source's modification
    /// time is carried over, so copying twice in a row skips the second time.
    pub fn copy(
        &self,
        source: &Utf8Path,
        dest: &Utf8Path,
        skip_if_newer: bool,
    ) -> Result<CopyOutcome, MirrorError> {
        let copy_err = |e: io::Error| MirrorError::Copy {
            source_path: source.to_path_buf(),
            dest_path: dest.to_path_buf(),
            source: e,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(copy_err)?;
        }

        if dest.exists() {
            if skip_if_newer && !is_older(dest, source).map_err(copy_err)? {
                tracing::info!("Skipping {} (destination is up to date)", dest);
                self.metrics.record_skipped();
                return Ok(CopyOutcome::SkippedNewer);
            }
            fs::remove_file(dest).map_err(copy_err)?;
        }

        fs::copy(source, dest).map_err(copy_err)?;
        preserve_times(source, dest).map_err(copy_err)?;

        tracing::info!("Copied {} -> {}", source, dest);
        self.metrics.record_copied();
        Ok(CopyOutcome::Copied)
    }

    /// Relocate the project of the active scene `ctx`.
    ///
    /// Validation failures and host failures come back as errors; a run that
    /// gets through validation returns a report with any recoverable issues.
    pub fn relocate<H>(
        &self,
        host: &mut H,
        ctx: SceneContext,
        options: &RelocationOptions,
    ) -> Result<RunReport, MirrorError>
    where
        H: SceneHost + PathRegistry + ReferenceRegistry + ?Sized,
    {
        self.state.begin_run("Relocating project")?;
        tracing::info!(
            "Relocating {} from {} to {}",
            ctx.scene_file,
            options.source_root,
            options.dest_root
        );

        match self.run_relocation(host, ctx, options) {
            Ok(report) => {
                self.state.finish(&report)?;
                self.metrics.log_summary();
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Relocation aborted: {}", e);
                self.state.finish(&RunReport::aborted(&e))?;
                Err(e)
            }
        }
    }

    fn run_relocation<H>(
        &self,
        host: &mut H,
        ctx: SceneContext,
        options: &RelocationOptions,
    ) -> Result<RunReport, MirrorError>
    where
        H: SceneHost + PathRegistry + ReferenceRegistry + ?Sized,
    {
        let source = &options.source_root;
        let dest = &options.dest_root;
        let mut report = RunReport::new();

        // 1. Validate before any write, against the project the scene is in
        let in_place = dest.contains(&ctx.scene_file);
        let scene_root = if in_place {
            ProjectRoot::new(ctx.project_root.clone())
        } else {
            source.clone()
        };
        let deps = PathCatalog::classify(&*host, &ctx, &scene_root)?;
        let bad_references = PathCatalog::unrelocatable_references(&deps, &scene_root, |p| p.exists());
        check_dependencies(&deps, &bad_references)?;

        // 2. Already relocated
        if in_place {
            return self.finish_in_place(host, ctx, options, report);
        }

        let scene_copy = source.remap(&ctx.scene_file, dest).ok_or_else(|| {
            ValidationError::SceneOutsideProject {
                scene: ctx.scene_file.clone(),
                root: source.path().to_path_buf(),
            }
        })?;

        // 3. Copy
        self.state.transition(RunPhase::Copying)?;
        let total = deps.valid().len() + deps.references().len() + 1;
        self.state.set_total(total);

        let workspace = source.path().join(&options.workspace_file);
        if workspace.exists() {
            let workspace_copy = dest.path().join(&options.workspace_file);
            if self.copy_with_policy(&workspace, &workspace_copy, options.policy, &mut report)? {
                host.source_workspace(&ctx, &workspace_copy)?;
            }
        }

        for path in deps.valid() {
            self.state.advance(path.as_str());
            if let Some(target) = source.remap(path, dest) {
                self.copy_with_policy(path, &target, options.policy, &mut report)?;
            }
        }

        let mut reference_copies = Vec::new();
        for path in deps.references() {
            self.state.advance(path.as_str());
            let Some(target) = source.remap(path, dest) else {
                continue;
            };
            if self.copy_with_policy(path, &target, options.policy, &mut report)? {
                reference_copies.push(target);
            }
        }

        self.state.advance(ctx.scene_file.as_str());
        self.copy_with_policy(&ctx.scene_file, &scene_copy, options.policy, &mut report)?;

        // 4. Switch project
        let mut ctx = host.set_project(&ctx, dest.path())?;

        // 5. References, one document at a time
        self.state.transition(RunPhase::Rewriting)?;
        self.state.set_total(reference_copies.len() + 1);
        for reference in &reference_copies {
            self.state.advance(reference.as_str());
            ctx = host.open_scene(reference, true)?;
            let outcome = PathRewriter::resolve(host, &ctx, source.path(), dest.path(), &self.metrics)?;
            outcome.warnings().for_each(|w| report.warn(w));
            host.save_scene(&ctx)?;
        }

        // 6. Main scene, with loaded references held unloaded while rewriting
        self.state.advance(scene_copy.as_str());
        ctx = host.open_scene(&scene_copy, true)?;
        let mut unloaded = ReferenceUnloadGuard::acquire(host, &ctx)?;
        let outcome =
            PathRewriter::resolve(&mut *unloaded, &ctx, source.path(), dest.path(), &self.metrics)?;
        unloaded.release()?;
        outcome.warnings().for_each(|w| report.warn(w));

        ensure_output_dir(&*host, &ctx, dest, &options.images_dir)?;
        host.save_scene(&ctx)?;

        tracing::info!("Relocated {} to {}", options.source_root, scene_copy);
        report.scene_file = Some(scene_copy);
        Ok(report)
    }

    /// The scene is already in the destination: only the project switch and
    /// the output directory are needed.
    fn finish_in_place<H>(
        &self,
        host: &mut H,
        ctx: SceneContext,
        options: &RelocationOptions,
        mut report: RunReport,
    ) -> Result<RunReport, MirrorError>
    where
        H: SceneHost + ?Sized,
    {
        tracing::info!("{} is already under {}", ctx.scene_file, options.dest_root);
        let ctx = if ctx.project_root.as_path() == options.dest_root.path() {
            ctx
        } else {
            host.set_project(&ctx, options.dest_root.path())?
        };
        ensure_output_dir(&*host, &ctx, &options.dest_root, &options.images_dir)?;
        report.scene_file = Some(ctx.scene_file);
        Ok(report)
    }

    /// Copy under the failure policy. Returns whether the file was copied or
    /// was already up to date.
    fn copy_with_policy(
        &self,
        source: &Utf8Path,
        dest: &Utf8Path,
        policy: CopyFailurePolicy,
        report: &mut RunReport,
    ) -> Result<bool, MirrorError> {
        match self.copy(source, dest, true) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.metrics.record_copy_failure();
                match policy {
                    CopyFailurePolicy::Strict => Err(e),
                    CopyFailurePolicy::Lenient => {
                        report.error(e.to_string());
                        Ok(false)
                    }
                }
            }
        }
    }
}

/// True if `path` was modified before `than`.
fn is_older(path: &Utf8Path, than: &Utf8Path) -> io::Result<bool> {
    let path_time = fs::metadata(path)?.modified()?;
    let than_time = fs::metadata(than)?.modified()?;
    Ok(path_time < than_time)
}

fn preserve_times(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    let modified = meta.modified()?;
    let accessed = meta.accessed().unwrap_or(modified);
    let times = FileTimes::new().set_modified(modified).set_accessed(accessed);

    // Read-only copies cannot be opened for writing; owners may still set times
    let file = File::options()
        .write(true)
        .open(dest)
        .or_else(|_| File::open(dest))?;
    file.set_times(times)
}

/// Create the render output directory of `root`, honouring the workspace's
/// images rule when it has one.
pub fn ensure_output_dir<H>(
    host: &H,
    ctx: &SceneContext,
    root: &ProjectRoot,
    images_dir: &str,
) -> Result<Utf8PathBuf, MirrorError>
where
    H: SceneHost + ?Sized,
{
    let rule = host
        .output_rule(ctx, IMAGES_RULE)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| images_dir.to_string());
    let path = root.path().join(rule);

    fs::create_dir_all(&path).map_err(|source| MirrorError::OutputDir {
        path: path.clone(),
        source,
    })?;
    tracing::debug!("Output directory {}", path);
    Ok(path)
}
