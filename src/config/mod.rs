use crate::models::{PipelineConfig, ShotAssetTable};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Prefix of environment variables overriding `shotkit.yaml`
/// (`SHOTKIT__SETTINGS__IMAGES_DIR=renders`)
pub const ENV_PREFIX: &str = "SHOTKIT";

const ENV_SEPARATOR: &str = "__";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two configuration files:
/// - Pipeline config (`shotkit.yaml`): archive locations, naming conventions, relocation policy
/// - Shot asset registry (`shot_assets.yaml`): raw asset list per shot id
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    pipeline_config_path: Utf8PathBuf,
    asset_registry_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it does not exist yet.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            pipeline_config_path: config_dir.join("shotkit.yaml"),
            asset_registry_path: config_dir.join("shot_assets.yaml"),
            config_dir,
        })
    }

    /// Load the pipeline configuration.
    ///
    /// Layers, lowest priority first: built-in defaults, `shotkit.yaml` (optional),
    /// then `SHOTKIT__`-prefixed environment variables.
    pub fn load_pipeline_config(&self) -> Result<PipelineConfig> {
        self.load_pipeline_config_with(Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("settings.large_assets")
            .with_list_parse_key("settings.standard_materials")
            .with_list_parse_key("farm.allowed_labs")
    }

    fn load_pipeline_config_with(&self, environment: Environment) -> Result<PipelineConfig> {
        if !self.pipeline_config_path.exists() {
            tracing::warn!(
                "Pipeline config file not found at {}, using defaults",
                self.pipeline_config_path
            );
        }

        let settings = Config::builder()
            .add_source(
                File::from(self.pipeline_config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment)
            .build()
            .with_context(|| {
                format!("Failed to read pipeline config: {}", self.pipeline_config_path)
            })?;

        let config: PipelineConfig = settings.try_deserialize().with_context(|| {
            format!("Failed to parse pipeline config: {}", self.pipeline_config_path)
        })?;

        tracing::info!("Loaded pipeline config from {}", self.pipeline_config_path);
        Ok(config)
    }

    /// Save the pipeline configuration file.
    pub fn save_pipeline_config(&self, config: &PipelineConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize pipeline config to YAML")?;

        fs::write(&self.pipeline_config_path, yaml_string).with_context(|| {
            format!("Failed to write pipeline config: {}", self.pipeline_config_path)
        })?;

        tracing::info!("Saved pipeline config to {}", self.pipeline_config_path);
        Ok(())
    }

    /// Load the shot asset registry.
    ///
    /// # Returns
    /// The loaded table, or an empty one if the file doesn't exist
    pub fn load_asset_registry(&self) -> Result<ShotAssetTable> {
        if !self.asset_registry_path.exists() {
            tracing::warn!(
                "Shot asset registry not found at {}, no shots are known",
                self.asset_registry_path
            );
            return Ok(ShotAssetTable::default());
        }

        let file_contents = fs::read_to_string(&self.asset_registry_path).with_context(|| {
            format!("Failed to read shot asset registry: {}", self.asset_registry_path)
        })?;

        let table: ShotAssetTable = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse shot asset registry: {}", self.asset_registry_path)
        })?;

        tracing::info!(
            "Loaded {} shots from {}",
            table.shots.len(),
            self.asset_registry_path
        );
        Ok(table)
    }

    /// Save the shot asset registry.
    pub fn save_asset_registry(&self, table: &ShotAssetTable) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(table)
            .context("Failed to serialize shot asset registry to YAML")?;

        fs::write(&self.asset_registry_path, yaml_string).with_context(|| {
            format!("Failed to write shot asset registry: {}", self.asset_registry_path)
        })?;

        tracing::info!("Saved shot asset registry to {}", self.asset_registry_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn pipeline_config_path(&self) -> &Utf8Path {
        &self.pipeline_config_path
    }

    pub fn asset_registry_path(&self) -> &Utf8Path {
        &self.asset_registry_path
    }
}
