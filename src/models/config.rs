use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Pipeline configuration from shotkit.yaml
///
/// Holds archive locations, naming conventions and relocation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub settings: PipelineSettings,

    #[serde(default)]
    pub farm: FarmSettings,
}

/// What to do when a single file fails to copy during relocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyFailurePolicy {
    /// Abort the whole relocation on the first failure
    #[default]
    Strict,
    /// Record the failure and keep copying
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Working lighting archive base
    #[serde(default)]
    pub sandbox_dir: Utf8PathBuf,

    /// Shared lighting archive base
    #[serde(default)]
    pub archive_dir: Utf8PathBuf,

    /// Per-user render roots live under this directory
    #[serde(default)]
    pub renderfarm_dir: Utf8PathBuf,

    #[serde(default = "default_workspace_file")]
    pub workspace_file: String,

    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    #[serde(default)]
    pub copy_failure_policy: CopyFailurePolicy,

    #[serde(default = "default_light_rig_name")]
    pub light_rig_name: String,

    /// Assets whose light links are never propagated
    #[serde(default = "default_large_assets")]
    pub large_assets: Vec<String>,

    /// Built-in materials left out of the light rig container
    #[serde(default = "default_standard_materials")]
    pub standard_materials: Vec<String>,

    #[serde(default = "default_container_extension")]
    pub container_extension: String,

    #[serde(default = "default_document_extension")]
    pub document_extension: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sandbox_dir: Utf8PathBuf::new(),
            archive_dir: Utf8PathBuf::new(),
            renderfarm_dir: Utf8PathBuf::new(),
            workspace_file: default_workspace_file(),
            images_dir: default_images_dir(),
            copy_failure_policy: CopyFailurePolicy::default(),
            light_rig_name: default_light_rig_name(),
            large_assets: default_large_assets(),
            standard_materials: default_standard_materials(),
            container_extension: default_container_extension(),
            document_extension: default_document_extension(),
        }
    }
}

fn default_workspace_file() -> String {
    "workspace.mel".to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_light_rig_name() -> String {
    "lrig_main".to_string()
}

fn default_large_assets() -> Vec<String> {
    vec!["prop_deck".to_string()]
}

fn default_standard_materials() -> Vec<String> {
    vec!["lambert1".to_string(), "particleCloud1".to_string()]
}

fn default_container_extension() -> String {
    "ma".to_string()
}

fn default_document_extension() -> String {
    "json".to_string()
}

/// Render farm access rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Labs whose machines may submit to the farm
    #[serde(default = "default_allowed_labs")]
    pub allowed_labs: Vec<String>,

    /// Network drive the farm reads from
    #[serde(default = "default_render_drive")]
    pub render_drive: Utf8PathBuf,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            allowed_labs: default_allowed_labs(),
            render_drive: default_render_drive(),
        }
    }
}

fn default_allowed_labs() -> Vec<String> {
    vec!["DUDL1383".to_string(), "KNOY340".to_string()]
}

fn default_render_drive() -> Utf8PathBuf {
    Utf8PathBuf::from("J:")
}

/// Raw asset lists per shot, from shot_assets.yaml
///
/// Asset names may carry `#` wildcards for instance numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShotAssetTable {
    #[serde(default)]
    pub shots: IndexMap<String, Vec<String>>,
}
