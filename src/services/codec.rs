//! Lighting config documents and the archive they live in.
//!
//! A shot's lighting setup is stored as two sibling files:
//!
//! ```text
//! {base}/references_lookdev/lightrigs/{seq}_{shot}/{seq}_{shot}_{rig}_v{version}.json
//! {base}/references_lookdev/lightrigs/{seq}_{shot}/{seq}_{shot}_{rig}_v{version}.ma
//! ```
//!
//! The document holds the light links and render layers; the container
//! holds the light rig group and the local materials it needs.

use crate::host::{HostError, LightingHost, SceneContext};
use crate::models::{
    DEFAULT_RENDER_LAYER, LightLinks, PipelineSettings, RenderLayerRecord, RunWarning,
    ShotLightingConfig,
};
use crate::services::deformers::DeformerRenameGuard;
use crate::services::naming::{NamingError, ShotId, parse_shot_file, version_number};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::io;
use std::sync::LazyLock;
use thiserror::Error;

/// Light rig archive directory, relative to an archive base
pub const LIGHT_RIG_DIR: &str = "references_lookdev/lightrigs";

static SHOT_DIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d\d_\d\d\d$").expect("Invalid shot dir regex"));

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error on {path}: {source}")]
    Io { path: Utf8PathBuf, source: io::Error },

    #[error("Failed to parse lighting config {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize lighting config: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Which archive a document is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveSource {
    /// The working archive
    #[default]
    Sandbox,
    /// The shared, synced archive
    Archive,
}

impl ArchiveSource {
    pub fn base_dir(self, settings: &PipelineSettings) -> &Utf8Path {
        match self {
            ArchiveSource::Sandbox => &settings.sandbox_dir,
            ArchiveSource::Archive => &settings.archive_dir,
        }
    }
}

/// File naming and directory structure of a lighting archive.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    base: Utf8PathBuf,
    rig_name: String,
    container_extension: String,
    document_extension: String,
}

impl ArchiveLayout {
    pub fn new<P: Into<Utf8PathBuf>>(base: P, settings: &PipelineSettings) -> Self {
        Self {
            base: base.into(),
            rig_name: settings.light_rig_name.clone(),
            container_extension: settings.container_extension.clone(),
            document_extension: settings.document_extension.clone(),
        }
    }

    pub fn from_source(source: ArchiveSource, settings: &PipelineSettings) -> Self {
        Self::new(source.base_dir(settings), settings)
    }

    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    pub fn rig_dir(&self) -> Utf8PathBuf {
        self.base.join(LIGHT_RIG_DIR)
    }

    pub fn shot_dir(&self, shot: &ShotId) -> Utf8PathBuf {
        self.rig_dir().join(shot.to_string())
    }

    fn file_stem(&self, shot: &ShotId, version: &str) -> String {
        format!("{}_{}_v{}", shot, self.rig_name, version)
    }

    pub fn container_path(&self, shot: &ShotId, version: &str) -> Utf8PathBuf {
        self.shot_dir(shot).join(format!(
            "{}.{}",
            self.file_stem(shot, version),
            self.container_extension
        ))
    }

    pub fn document_path(&self, shot: &ShotId, version: &str) -> Utf8PathBuf {
        self.shot_dir(shot).join(format!(
            "{}.{}",
            self.file_stem(shot, version),
            self.document_extension
        ))
    }

    /// The container file sitting next to `document`.
    pub fn container_for_document(&self, document: &Utf8Path) -> Utf8PathBuf {
        container_for_document(document, &self.container_extension)
    }

    /// Shots that have at least one document, sorted.
    ///
    /// A missing archive directory yields an empty list.
    pub fn list_shots(&self) -> Result<Vec<String>, CodecError> {
        let rig_dir = self.rig_dir();
        if !rig_dir.is_dir() {
            tracing::debug!("Light rig archive {} does not exist", rig_dir);
            return Ok(Vec::new());
        }

        let mut shots = Vec::new();
        for name in list_dir_names(&rig_dir)? {
            if !SHOT_DIR_PATTERN.is_match(&name) {
                continue;
            }
            if !self.documents_in(&rig_dir.join(&name))?.is_empty() {
                shots.push(name);
            }
        }
        shots.sort();
        Ok(shots)
    }

    /// Documents of `shot`, sorted so the newest version comes last.
    ///
    /// Versions compare as numbers, so `v10` sorts after `v9`.
    pub fn list_documents(&self, shot: &str) -> Result<Vec<Utf8PathBuf>, CodecError> {
        let shot_dir = self.rig_dir().join(shot);
        if !shot_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut documents = self.documents_in(&shot_dir)?;
        documents.sort_by(|a, b| (version_number(a), a).cmp(&(version_number(b), b)));
        Ok(documents)
    }

    fn documents_in(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, CodecError> {
        Ok(list_dir_names(dir)?
            .into_iter()
            .map(|name| dir.join(name))
            .filter(|path| path.extension() == Some(self.document_extension.as_str()))
            .collect())
    }
}

/// Sibling container of a lighting config document.
pub fn container_for_document(document: &Utf8Path, container_extension: &str) -> Utf8PathBuf {
    document.with_extension(container_extension)
}

fn list_dir_names(dir: &Utf8Path) -> Result<Vec<String>, CodecError> {
    let io_err = |source| CodecError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Path of `file` relative to whichever archive base it lives under, with a
/// leading separator. Paths outside both bases are returned unchanged.
pub fn archive_relative(file: &Utf8Path, settings: &PipelineSettings) -> String {
    [&settings.archive_dir, &settings.sandbox_dir]
        .into_iter()
        .filter(|base| !base.as_str().is_empty())
        .find_map(|base| file.strip_prefix(base).ok())
        .map(|relative| format!("/{}", relative))
        .unwrap_or_else(|| file.to_string())
}

/// Which sections an export writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub light_rig: bool,
    pub light_links: bool,
    pub render_layers: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            light_rig: true,
            light_links: true,
            render_layers: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub document: Utf8PathBuf,
    /// Container file, if the light rig was exported
    pub container: Option<Utf8PathBuf>,
    pub config: ShotLightingConfig,
    pub warnings: Vec<RunWarning>,
}

/// Reads, writes and exports lighting config documents.
pub struct LightingConfigCodec;

impl LightingConfigCodec {
    pub fn read_document(path: &Utf8Path) -> Result<ShotLightingConfig, CodecError> {
        let content = fs::read_to_string(path).map_err(|source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CodecError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_document(path: &Utf8Path, config: &ShotLightingConfig) -> Result<(), CodecError> {
        let io_err = |source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(config).map_err(CodecError::Serialize)?;
        fs::write(path, content).map_err(io_err)?;
        tracing::info!("Lighting config written: {}", path);
        Ok(())
    }

    /// Export the lighting setup of the active scene into `layout`.
    ///
    /// The document and container are named after the scene's shot and
    /// version, so the scene must follow the shot file convention.
    pub fn export<H>(
        host: &mut H,
        ctx: &SceneContext,
        layout: &ArchiveLayout,
        settings: &PipelineSettings,
        options: ExportOptions,
    ) -> Result<ExportOutcome, CodecError>
    where
        H: LightingHost + ?Sized,
    {
        let parsed = parse_shot_file(&ctx.scene_file)?;
        let version = parsed.version(&ctx.scene_file)?;
        let document = layout.document_path(&parsed.shot, version);
        let container = layout.container_path(&parsed.shot, version);

        let mut config = ShotLightingConfig::default();
        let mut warnings = Vec::new();

        host.set_current_layer(ctx, DEFAULT_RENDER_LAYER)?;

        let mut exported_container = None;
        if options.light_rig {
            if host.node_exists(ctx, &settings.light_rig_name)? {
                Self::export_light_rig(host, ctx, &container, settings)?;
                config.lrig_main = Some(archive_relative(&container, settings));
                exported_container = Some(container);
            } else {
                let warning = RunWarning::Skipped {
                    what: settings.light_rig_name.clone(),
                    reason: "light rig group does not exist".to_string(),
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        if options.light_links {
            tracing::info!("Exporting light links");
            config.light_links = Some(LightLinks {
                mel_commands: host.export_light_links(ctx)?,
            });
        }

        if options.render_layers {
            let mut guard = DeformerRenameGuard::acquire(host, ctx)?;
            config.render_layers = Some(Self::export_render_layers(&mut *guard, ctx)?);
        }

        Self::write_document(&document, &config)?;
        Ok(ExportOutcome {
            document,
            container: exported_container,
            config,
            warnings,
        })
    }

    /// Write the light rig group plus the local, non-standard materials and
    /// their shading engines to `container`.
    fn export_light_rig<H>(
        host: &mut H,
        ctx: &SceneContext,
        container: &Utf8Path,
        settings: &PipelineSettings,
    ) -> Result<(), CodecError>
    where
        H: LightingHost + ?Sized,
    {
        let mut selection = Vec::new();
        for material in host.local_materials(ctx)? {
            if material.referenced || settings.standard_materials.contains(&material.name) {
                continue;
            }
            if material.shading_engines.is_empty() {
                continue;
            }
            tracing::debug!("Exporting material {}", material.name);
            selection.extend(material.shading_engines);
            selection.push(material.name);
        }
        selection.push(settings.light_rig_name.clone());

        if let Some(parent) = container.parent() {
            fs::create_dir_all(parent).map_err(|source| CodecError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        host.export_nodes(ctx, &selection, container)?;
        tracing::info!("Exported {} to {}", settings.light_rig_name, container);
        Ok(())
    }

    fn export_render_layers<H>(
        host: &mut H,
        ctx: &SceneContext,
    ) -> Result<IndexMap<String, RenderLayerRecord>, CodecError>
    where
        H: LightingHost + ?Sized,
    {
        let mut layers = IndexMap::new();
        for layer in host.list_render_layers(ctx)? {
            if layer.referenced || layer.name == DEFAULT_RENDER_LAYER {
                continue;
            }
            tracing::info!("Exporting render layer {}", layer.name);
            let members = host.layer_members(ctx, &layer.name)?;
            host.set_current_layer(ctx, &layer.name)?;
            let adjustments = host.export_layer_overrides(ctx, &layer.name)?;
            layers.insert(layer.name, RenderLayerRecord { members, adjustments });
        }
        Ok(layers)
    }
}
