//! In-memory host shared by the integration tests.
//!
//! `MemoryHost` implements every host capability trait over plain maps and
//! records each mutating call in [`MemoryHost::mutations`], so tests can check
//! both the order of side effects and that an aborted run made none.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use shotkit::host::{
    HostError, LayerInfo, LightingHost, MaterialInfo, PathRegistry, ReferenceHandle,
    ReferenceRegistry, SceneContext, SceneHost,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;

/// A side effect performed on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Opened(Utf8PathBuf),
    Saved(Utf8PathBuf),
    ProjectSet(Utf8PathBuf),
    WorkspaceSourced(Utf8PathBuf),
    RecordSet {
        scene: Utf8PathBuf,
        record: String,
        path: Utf8PathBuf,
    },
    Unloaded(String),
    Loaded(String),
    Exported { file: Utf8PathBuf, nodes: Vec<String> },
    Imported(Utf8PathBuf),
    CurrentLayer(String),
    LayerCreated(String),
    MembersSet { layer: String, members: Vec<String> },
    OverridesApplied { layer: String, directives: Vec<String> },
    DirectivesRun(String),
    Renamed { from: String, to: String },
}

/// Path records and references of one scene document.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    /// Directory -> file names recorded under it
    pub directories: BTreeMap<Utf8PathBuf, Vec<String>>,
    /// Path-reference record -> stored path
    pub records: BTreeMap<String, Utf8PathBuf>,
    pub references: Vec<ReferenceHandle>,
}

impl SceneData {
    pub fn with_usage(mut self, file: &Utf8Path) -> Self {
        let dir = file.parent().map(Utf8Path::to_path_buf).unwrap_or_default();
        let name = file.file_name().unwrap_or_default().to_string();
        self.directories.entry(dir).or_default().push(name);
        self
    }

    pub fn with_record(mut self, record: &str, path: &Utf8Path) -> Self {
        self.records.insert(record.to_string(), path.to_path_buf());
        self
    }

    pub fn with_reference(mut self, node: &str, file: &Utf8Path, loaded: bool) -> Self {
        self.references.push(ReferenceHandle {
            node: node.to_string(),
            file: file.to_path_buf(),
            loaded,
        });
        self
    }
}

#[derive(Debug)]
pub struct MemoryHost {
    pub active: SceneContext,
    pub scenes: HashMap<Utf8PathBuf, SceneData>,
    pub mutations: Vec<Mutation>,
    pub output_rules: HashMap<String, String>,
    /// Records that refuse edits
    pub protected_records: BTreeSet<String>,
    /// Scenes whose path records cannot be listed
    pub unlistable_scenes: BTreeSet<Utf8PathBuf>,

    // Lighting state of the active document
    pub nodes: BTreeSet<String>,
    pub materials: Vec<MaterialInfo>,
    pub layers: Vec<LayerInfo>,
    pub members: BTreeMap<String, Vec<String>>,
    pub overrides: BTreeMap<String, Vec<String>>,
    pub light_links: Vec<String>,
}

impl MemoryHost {
    pub fn new(scene_file: &Utf8Path, project_root: &Utf8Path) -> Self {
        Self {
            active: SceneContext::new(scene_file, project_root),
            scenes: HashMap::new(),
            mutations: Vec::new(),
            output_rules: HashMap::new(),
            protected_records: BTreeSet::new(),
            unlistable_scenes: BTreeSet::new(),
            nodes: BTreeSet::new(),
            materials: Vec::new(),
            layers: Vec::new(),
            members: BTreeMap::new(),
            overrides: BTreeMap::new(),
            light_links: Vec::new(),
        }
    }

    pub fn with_scene(mut self, file: &Utf8Path, data: SceneData) -> Self {
        self.scenes.insert(file.to_path_buf(), data);
        self
    }

    pub fn with_nodes(mut self, nodes: &[&str]) -> Self {
        self.nodes.extend(nodes.iter().map(|n| n.to_string()));
        self
    }

    pub fn scene(&self, file: &Utf8Path) -> Option<&SceneData> {
        self.scenes.get(file)
    }

    pub fn record(&self, scene: &Utf8Path, record: &str) -> Option<&Utf8PathBuf> {
        self.scenes.get(scene)?.records.get(record)
    }

    /// Position of the first mutation matching `pred`.
    pub fn position(&self, pred: impl Fn(&Mutation) -> bool) -> Option<usize> {
        self.mutations.iter().position(pred)
    }

    pub fn created_layers(&self) -> Vec<String> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::LayerCreated(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn check(&self, ctx: &SceneContext) -> Result<(), HostError> {
        if *ctx == self.active {
            Ok(())
        } else {
            Err(HostError::StaleContext {
                expected: ctx.scene_file.clone(),
                active: self.active.scene_file.clone(),
            })
        }
    }

    fn active_data(&self) -> Result<&SceneData, HostError> {
        self.scenes
            .get(&self.active.scene_file)
            .ok_or_else(|| HostError::FileNotFound(self.active.scene_file.clone()))
    }

    fn active_data_mut(&mut self) -> Result<&mut SceneData, HostError> {
        let file = self.active.scene_file.clone();
        self.scenes
            .get_mut(&file)
            .ok_or(HostError::FileNotFound(file))
    }
}

impl SceneHost for MemoryHost {
    fn current(&self) -> SceneContext {
        self.active.clone()
    }

    /// A copy that was never registered picks up the data of the registered
    /// scene with the same file name.
    fn open_scene(&mut self, file: &Utf8Path, _force: bool) -> Result<SceneContext, HostError> {
        if !file.exists() {
            return Err(HostError::FileNotFound(file.to_path_buf()));
        }
        if !self.scenes.contains_key(file) {
            let copied_from = self
                .scenes
                .iter()
                .find(|(path, _)| path.file_name() == file.file_name())
                .map(|(_, data)| data.clone())
                .unwrap_or_default();
            self.scenes.insert(file.to_path_buf(), copied_from);
        }

        self.active = SceneContext::new(file, self.active.project_root.clone());
        self.mutations.push(Mutation::Opened(file.to_path_buf()));
        Ok(self.active.clone())
    }

    fn save_scene(&mut self, ctx: &SceneContext) -> Result<(), HostError> {
        self.check(ctx)?;
        self.mutations.push(Mutation::Saved(ctx.scene_file.clone()));
        Ok(())
    }

    fn set_project(&mut self, ctx: &SceneContext, root: &Utf8Path) -> Result<SceneContext, HostError> {
        self.check(ctx)?;
        self.active = SceneContext::new(ctx.scene_file.clone(), root);
        self.mutations.push(Mutation::ProjectSet(root.to_path_buf()));
        Ok(self.active.clone())
    }

    fn source_workspace(&mut self, ctx: &SceneContext, file: &Utf8Path) -> Result<(), HostError> {
        self.check(ctx)?;
        self.mutations.push(Mutation::WorkspaceSourced(file.to_path_buf()));
        Ok(())
    }

    fn output_rule(&self, _ctx: &SceneContext, rule: &str) -> Option<String> {
        self.output_rules.get(rule).cloned()
    }
}

impl PathRegistry for MemoryHost {
    fn list_directories(&self, ctx: &SceneContext) -> Result<Vec<Utf8PathBuf>, HostError> {
        self.check(ctx)?;
        Ok(self.active_data()?.directories.keys().cloned().collect())
    }

    fn list_files(&self, ctx: &SceneContext, dir: &Utf8Path) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        Ok(self
            .active_data()?
            .directories
            .get(dir)
            .cloned()
            .unwrap_or_default())
    }

    fn list_path_records(&self, ctx: &SceneContext) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        if self.unlistable_scenes.contains(&ctx.scene_file) {
            return Err(HostError::CommandFailed {
                command: "filePathEditor".to_string(),
                message: format!("cannot list records of {}", ctx.scene_file),
            });
        }
        Ok(self.active_data()?.records.keys().cloned().collect())
    }

    fn record_path(&self, ctx: &SceneContext, record: &str) -> Result<Utf8PathBuf, HostError> {
        self.check(ctx)?;
        self.active_data()?
            .records
            .get(record)
            .cloned()
            .ok_or_else(|| HostError::NodeNotFound(record.to_string()))
    }

    fn set_record_path(
        &mut self,
        ctx: &SceneContext,
        record: &str,
        path: &Utf8Path,
    ) -> Result<(), HostError> {
        self.check(ctx)?;
        if self.protected_records.contains(record) {
            return Err(HostError::Protected(record.to_string()));
        }
        self.active_data_mut()?
            .records
            .insert(record.to_string(), path.to_path_buf());
        self.mutations.push(Mutation::RecordSet {
            scene: ctx.scene_file.clone(),
            record: record.to_string(),
            path: path.to_path_buf(),
        });
        Ok(())
    }
}

impl ReferenceRegistry for MemoryHost {
    fn list_references(&self, ctx: &SceneContext) -> Result<Vec<ReferenceHandle>, HostError> {
        self.check(ctx)?;
        Ok(self.active_data()?.references.clone())
    }

    fn load_reference(&mut self, ctx: &SceneContext, node: &str) -> Result<(), HostError> {
        self.check(ctx)?;
        set_loaded(self.active_data_mut()?, node, true)?;
        self.mutations.push(Mutation::Loaded(node.to_string()));
        Ok(())
    }

    fn unload_reference(&mut self, ctx: &SceneContext, node: &str) -> Result<(), HostError> {
        self.check(ctx)?;
        set_loaded(self.active_data_mut()?, node, false)?;
        self.mutations.push(Mutation::Unloaded(node.to_string()));
        Ok(())
    }
}

fn set_loaded(data: &mut SceneData, node: &str, loaded: bool) -> Result<(), HostError> {
    let reference = data
        .references
        .iter_mut()
        .find(|r| r.node == node)
        .ok_or_else(|| HostError::NodeNotFound(node.to_string()))?;
    reference.loaded = loaded;
    Ok(())
}

impl LightingHost for MemoryHost {
    fn node_exists(&self, ctx: &SceneContext, path: &str) -> Result<bool, HostError> {
        self.check(ctx)?;
        Ok(self.nodes.contains(path))
    }

    fn local_materials(&self, ctx: &SceneContext) -> Result<Vec<MaterialInfo>, HostError> {
        self.check(ctx)?;
        Ok(self.materials.clone())
    }

    fn export_nodes(
        &mut self,
        ctx: &SceneContext,
        nodes: &[String],
        file: &Utf8Path,
    ) -> Result<(), HostError> {
        self.check(ctx)?;
        fs::write(file, nodes.join("\n")).map_err(|e| HostError::CommandFailed {
            command: "export".to_string(),
            message: e.to_string(),
        })?;
        self.mutations.push(Mutation::Exported {
            file: file.to_path_buf(),
            nodes: nodes.to_vec(),
        });
        Ok(())
    }

    fn import_file(&mut self, ctx: &SceneContext, file: &Utf8Path) -> Result<(), HostError> {
        self.check(ctx)?;
        if !file.exists() {
            return Err(HostError::FileNotFound(file.to_path_buf()));
        }
        self.mutations.push(Mutation::Imported(file.to_path_buf()));
        Ok(())
    }

    fn set_current_layer(&mut self, ctx: &SceneContext, layer: &str) -> Result<(), HostError> {
        self.check(ctx)?;
        let known = layer == shotkit::models::DEFAULT_RENDER_LAYER
            || self.layers.iter().any(|l| l.name == layer);
        if !known {
            return Err(HostError::NodeNotFound(layer.to_string()));
        }
        self.mutations.push(Mutation::CurrentLayer(layer.to_string()));
        Ok(())
    }

    fn list_render_layers(&self, ctx: &SceneContext) -> Result<Vec<LayerInfo>, HostError> {
        self.check(ctx)?;
        Ok(self.layers.clone())
    }

    fn layer_members(&self, ctx: &SceneContext, layer: &str) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        self.members
            .get(layer)
            .cloned()
            .ok_or_else(|| HostError::NodeNotFound(layer.to_string()))
    }

    fn create_render_layer(&mut self, ctx: &SceneContext, name: &str) -> Result<String, HostError> {
        self.check(ctx)?;
        let mut created = name.to_string();
        while self.layers.iter().any(|l| l.name == created) {
            created.push('1');
        }
        self.layers.push(LayerInfo {
            name: created.clone(),
            referenced: false,
        });
        self.members.insert(created.clone(), Vec::new());
        self.mutations.push(Mutation::LayerCreated(created.clone()));
        Ok(created)
    }

    fn set_layer_members(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
        members: &[String],
    ) -> Result<(), HostError> {
        self.check(ctx)?;
        if let Some(missing) = members.iter().find(|m| !self.nodes.contains(*m)) {
            return Err(HostError::NodeNotFound(missing.clone()));
        }
        self.members.insert(layer.to_string(), members.to_vec());
        self.mutations.push(Mutation::MembersSet {
            layer: layer.to_string(),
            members: members.to_vec(),
        });
        Ok(())
    }

    fn export_layer_overrides(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
    ) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        Ok(self.overrides.get(layer).cloned().unwrap_or_default())
    }

    fn apply_layer_overrides(
        &mut self,
        ctx: &SceneContext,
        layer: &str,
        directives: &[String],
        skipped: &BTreeSet<String>,
    ) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        let (not_applied, applied): (Vec<String>, Vec<String>) = directives
            .iter()
            .cloned()
            .partition(|d| skipped.iter().any(|ns| d.contains(ns.as_str())));

        self.overrides.insert(layer.to_string(), applied.clone());
        self.mutations.push(Mutation::OverridesApplied {
            layer: layer.to_string(),
            directives: applied,
        });
        Ok(not_applied)
    }

    fn export_light_links(&mut self, ctx: &SceneContext) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        Ok(self.light_links.clone())
    }

    fn run_directives(&mut self, ctx: &SceneContext, batch: &str) -> Result<(), HostError> {
        self.check(ctx)?;
        self.mutations.push(Mutation::DirectivesRun(batch.to_string()));
        Ok(())
    }

    fn list_nodes_with_suffix(
        &self,
        ctx: &SceneContext,
        suffix: &str,
    ) -> Result<Vec<String>, HostError> {
        self.check(ctx)?;
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.rsplit('|').next().is_some_and(|short| short.ends_with(suffix)))
            .cloned()
            .collect())
    }

    fn rename_node(
        &mut self,
        ctx: &SceneContext,
        long_name: &str,
        new_short_name: &str,
    ) -> Result<String, HostError> {
        self.check(ctx)?;
        if !self.nodes.remove(long_name) {
            return Err(HostError::NodeNotFound(long_name.to_string()));
        }
        let renamed = match long_name.rsplit_once('|') {
            Some((parent, _)) => format!("{}|{}", parent, new_short_name),
            None => new_short_name.to_string(),
        };
        self.nodes.insert(renamed.clone());
        self.mutations.push(Mutation::Renamed {
            from: long_name.to_string(),
            to: renamed.clone(),
        });
        Ok(renamed)
    }
}

/// UTF-8 path of a temp directory.
pub fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir is not UTF-8")
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Utf8Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, contents).expect("write fixture file");
}
