//! Host application capability interface.
//!
//! The 3D host keeps a single "active document". Rather than reach for it
//! implicitly, every call that depends on it takes a [`SceneContext`] handle,
//! and every call that changes it returns the new handle. Hosts reject a
//! handle that no longer matches the active document with
//! [`HostError::StaleContext`].
//!
//! The traits are deliberately narrow:
//!
//! - [`SceneHost`]: open/save documents, switch project, workspace rules
//! - [`PathRegistry`]: file-path records of the active document
//! - [`ReferenceRegistry`]: nested scene references and their load state
//! - [`LightingHost`]: light rig, render layer and light-link commands
//!
//! Adapters over the real host implement these; tests use in-memory fakes.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Handle to the host's active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneContext {
    pub scene_file: Utf8PathBuf,
    pub project_root: Utf8PathBuf,
}

impl SceneContext {
    pub fn new<S: Into<Utf8PathBuf>, P: Into<Utf8PathBuf>>(scene_file: S, project_root: P) -> Self {
        Self {
            scene_file: scene_file.into(),
            project_root: project_root.into(),
        }
    }
}

/// Errors reported by a host adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Host command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Stale scene context: expected {expected}, active document is {active}")]
    StaleContext {
        expected: Utf8PathBuf,
        active: Utf8PathBuf,
    },

    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Record {0} is protected and cannot be edited")]
    Protected(String),

    #[error("File {0} not found")]
    FileNotFound(Utf8PathBuf),
}

/// A nested scene reference in the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHandle {
    /// Reference node name
    pub node: String,
    /// Referenced scene file
    pub file: Utf8PathBuf,
    pub loaded: bool,
}

/// A material found in the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialInfo {
    pub name: String,
    /// True if the material comes from a referenced file
    pub referenced: bool,
    /// Shading groups the material drives
    pub shading_engines: Vec<String>,
}

/// A render layer found in the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    /// True if the layer comes from a referenced file
    pub referenced: bool,
}

/// Document and project control.
pub trait SceneHost {
    /// The active document.
    fn current(&self) -> SceneContext;

    /// Open `file`, making it the active document. With `force`, unsaved
    /// changes in the previous document are discarded.
    fn open_scene(&mut self, file: &Utf8Path, force: bool) -> Result<SceneContext, HostError>;

    /// Save the active document in place.
    fn save_scene(&mut self, ctx: &SceneContext) -> Result<(), HostError>;

    /// Switch the active project root.
    fn set_project(&mut self, ctx: &SceneContext, root: &Utf8Path)
    -> Result<SceneContext, HostError>;

    /// Evaluate a workspace definition file so the host sets up
    /// project-specific directories for the active project.
    fn source_workspace(&mut self, ctx: &SceneContext, file: &Utf8Path) -> Result<(), HostError>;

    /// Directory the workspace maps a file rule (such as `images`) to, if any.
    fn output_rule(&self, ctx: &SceneContext, rule: &str) -> Option<String>;
}

/// File-path records of the active document.
#[cfg_attr(test, mockall::automock)]
pub trait PathRegistry {
    /// Distinct directories holding recorded file usages.
    fn list_directories(&self, ctx: &SceneContext) -> Result<Vec<Utf8PathBuf>, HostError>;

    /// File names recorded under `dir`.
    fn list_files(&self, ctx: &SceneContext, dir: &Utf8Path) -> Result<Vec<String>, HostError>;

    /// Identifiers of every path-reference record (node attribute, etc).
    fn list_path_records(&self, ctx: &SceneContext) -> Result<Vec<String>, HostError>;

    /// Full path currently stored in `record`.
    fn record_path(&self, ctx: &SceneContext, record: &str) -> Result<Utf8PathBuf, HostError>;

    /// Store `path` in `record`.
    fn set_record_path(
        &mut self,
        ctx: &SceneContext,
        record: &str,
        path: &Utf8Path,
    ) -> Result<(), HostError>;
}

/// Nested scene references of the active document.
pub trait ReferenceRegistry {
    fn list_references(&self, ctx: &SceneContext) -> Result<Vec<ReferenceHandle>, HostError>;

    fn load_reference(&mut self, ctx: &SceneContext, node: &str) -> Result<(), HostError>;

    fn unload_reference(&mut self, ctx: &SceneContext, node: &str) -> Result<(), HostError>;
}

/// Lighting commands against the active document.
///
/// Node paths are long DAG paths (`|group|ns:child`). Override and light-link
/// directives are opaque strings produced and consumed by the host.
pub trait LightingHost {
    fn node_exists(&self, ctx: &SceneContext, path: &str) -> Result<bool, HostError>;

    /// Materials in the active document, local and referenced.
    fn local_materials(&self, ctx: &SceneContext) -> Result<Vec<MaterialInfo>, HostError>;

    /// Write `nodes` (and nothing else) to a container file.
    fn export_nodes(
        &mut self,
        ctx: &SceneContext,
        nodes: &[String],
        file: &Utf8Path,
    ) -> Result<(), HostError>;

    /// Bring the contents of a container file into the active document.
    fn import_file(&mut self, ctx: &SceneContext, file: &Utf8Path) -> Result<(), HostError>;

    fn set_current_layer(&mut self, ctx: &SceneContext, layer: &str) -> Result<(), HostError>;

    fn list_render_layers(&self, ctx: &SceneContext) -> Result<Vec<LayerInfo>, HostError>;

    fn layer_members(&self, ctx: &SceneContext, layer: &str) -> Result<Vec<String>, HostError>;

    /// Create a render layer. Returns the name the host actually gave it.
    fn create_render_layer(&mut self, ctx: &SceneContext, name: &str) -> Result<String, HostError>;

    fn set_layer_members(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
        members: &[String],
    ) -> Result<(), HostError>;

    /// Override directives recorded on `layer`.
    fn export_layer_overrides(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
    ) -> Result<Vec<String>, HostError>;

    /// Apply override directives to `layer`. Directives touching `skipped`
    /// namespaces are left out by the host; the returned strings describe
    /// what was not applied.
    fn apply_layer_overrides(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
        directives: &[String],
        skipped: &std::collections::BTreeSet<String>,
    ) -> Result<Vec<String>, HostError>;

    /// Light-linking directives describing the active document.
    fn export_light_links(&mut self, ctx: &SceneContext) -> Result<Vec<String>, HostError>;

    /// Evaluate a batch of directives in one go.
    fn run_directives(&mut self, ctx: &SceneContext, batch: &str) -> Result<(), HostError>;

    /// Long names of nodes whose short name ends with `suffix`.
    fn list_nodes_with_suffix(
        &self,
        ctx: &SceneContext,
        suffix: &str,
    ) -> Result<Vec<String>, HostError>;

    /// Rename a node, returning its new long name.
    fn rename_node(
        &mut self,
        ctx: &SceneContext,
        long_name: &str,
        new_short_name: &str,
    ) -> Result<String, HostError>;
}
