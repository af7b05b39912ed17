//! shotkit - Render-farm project relocation and shot-to-shot lighting propagation
//!
//! Command-line entry point for the operations that do not need a running 3D
//! host: browsing the lighting archive, inspecting lighting config documents,
//! diffing shot assets and checking render farm access.
//!
//! Relocation and propagation run inside the host through the library API
//! ([`shotkit::ProjectMirror`], [`shotkit::PropagationEngine`]).
//!
//! # Configuration Files
//!
//! Expected in the config directory (`--config-dir`, default `shotkit/`):
//! - `shotkit.yaml`: archive locations, naming conventions, relocation policy
//! - `shot_assets.yaml`: raw asset list per shot
//!
//! Any setting can be overridden with `SHOTKIT__`-prefixed environment variables.

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use shotkit::logging::LogFormat;
use shotkit::models::{PipelineConfig, ShotLightingConfig};
use shotkit::services::{
    ArchiveLayout, ArchiveSource, AssetNamespaceResolver, LightingConfigCodec, ShotId,
    check_farm_access,
};
use shotkit::{APP_NAME, ConfigManager, VERSION};

#[derive(Parser, Debug)]
#[command(name = "shotkit", version, about = "Render-farm relocation and lighting propagation tools", long_about = None)]
struct Cli {
    /// Directory holding shotkit.yaml and shot_assets.yaml
    #[arg(long, value_name = "DIR", default_value = "shotkit", global = true)]
    config_dir: Utf8PathBuf,

    /// Log at debug level and echo log lines to the console
    #[arg(long, global = true)]
    debug: bool,

    /// Directory for rotating log files
    #[arg(long, value_name = "DIR", default_value = "logs", global = true)]
    log_dir: Utf8PathBuf,

    /// Write log files as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List shots that have lighting config documents
    Shots {
        /// Browse the shared archive instead of the sandbox
        #[arg(long)]
        archive: bool,
    },

    /// List the lighting config documents of a shot, newest last
    Configs {
        /// Shot id such as 01_010
        shot: String,

        /// Browse the shared archive instead of the sandbox
        #[arg(long)]
        archive: bool,
    },

    /// Summarise a lighting config document
    Show {
        #[arg(value_name = "DOCUMENT")]
        document: Utf8PathBuf,
    },

    /// Compare the assets of two shots
    Diff {
        #[arg(value_name = "SOURCE_SHOT")]
        source: String,

        #[arg(value_name = "DEST_SHOT")]
        dest: String,
    },

    /// Check whether this machine may submit to the render farm
    CheckFarm {
        /// Hostname to check (default: COMPUTERNAME or HOSTNAME)
        #[arg(long)]
        hostname: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    let _guard = shotkit::logging::setup_logging_with_console(
        cli.log_dir.as_str(),
        APP_NAME,
        cli.debug,
        cli.debug,
        format,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let config = config_manager.load_pipeline_config()?;

    match cli.command {
        Commands::Shots { archive } => list_shots(&config, source_of(archive)),
        Commands::Configs { shot, archive } => list_configs(&config, source_of(archive), &shot),
        Commands::Show { document } => show_document(&document),
        Commands::Diff { source, dest } => diff_shots(&config_manager, &source, &dest),
        Commands::CheckFarm { hostname } => check_farm(&config, hostname),
    }
}

fn source_of(archive: bool) -> ArchiveSource {
    if archive {
        ArchiveSource::Archive
    } else {
        ArchiveSource::Sandbox
    }
}

fn list_shots(config: &PipelineConfig, source: ArchiveSource) -> Result<()> {
    let layout = ArchiveLayout::from_source(source, &config.settings);
    let shots = layout
        .list_shots()
        .with_context(|| format!("Failed to list shots under {}", layout.base()))?;

    if shots.is_empty() {
        println!("No shots with lighting configs under {}", layout.rig_dir());
    }
    for shot in shots {
        println!("{}", shot);
    }
    Ok(())
}

fn list_configs(config: &PipelineConfig, source: ArchiveSource, shot: &str) -> Result<()> {
    let shot: ShotId = shot.parse()?;
    let layout = ArchiveLayout::from_source(source, &config.settings);
    let documents = layout
        .list_documents(&shot.to_string())
        .with_context(|| format!("Failed to list lighting configs of shot {}", shot))?;

    if documents.is_empty() {
        println!("No lighting configs for shot {}", shot);
    }
    for document in documents {
        println!("{}", document);
    }
    Ok(())
}

fn show_document(document: &Utf8PathBuf) -> Result<()> {
    let config = LightingConfigCodec::read_document(document)?;
    print!("{}", describe(&config));
    Ok(())
}

fn describe(config: &ShotLightingConfig) -> String {
    let mut out = String::new();
    let sections = config.sections();
    if sections.is_empty() {
        out.push_str("Sections: none\n");
    } else {
        out.push_str(&format!("Sections: {}\n", sections.join(", ")));
    }

    if let Some(lrig) = &config.lrig_main {
        out.push_str(&format!("Light rig: {}\n", lrig));
    }

    if config.light_links.is_some() {
        out.push_str(&format!(
            "Light link directives: {}\n",
            config.light_link_directives().len()
        ));
    }

    for (name, record) in config.render_layers.iter().flatten() {
        out.push_str(&format!(
            "Render layer {}: {} members, {} adjustments\n",
            name,
            record.members.len(),
            record.unique_adjustments().len()
        ));
    }
    out
}

fn diff_shots(config_manager: &ConfigManager, source: &str, dest: &str) -> Result<()> {
    let source: ShotId = source.parse()?;
    let dest: ShotId = dest.parse()?;
    let table = config_manager.load_asset_registry()?;

    let diff = AssetNamespaceResolver::new(&table).diff_shots(&source, &dest)?;

    if diff.is_empty() {
        println!("Shots {} and {} have the same assets", source, dest);
        return Ok(());
    }
    for asset in &diff.skipped {
        println!("- {} (skipped, not in {})", asset, dest);
    }
    for asset in &diff.added {
        println!("+ {} (new in {})", asset, dest);
    }
    Ok(())
}

fn check_farm(config: &PipelineConfig, hostname: Option<String>) -> Result<()> {
    let hostname = match hostname
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| std::env::var("HOSTNAME").ok())
    {
        Some(hostname) => hostname,
        None => bail!("Cannot determine hostname, pass --hostname"),
    };

    let lab = check_farm_access(&hostname, &config.farm, |drive| drive.exists())?;
    println!("{} (lab {}) may submit to the render farm", hostname, lab);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use indexmap::IndexMap;
    use shotkit::models::{LightLinks, RenderLayerRecord};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["shotkit", "shots", "--archive", "--debug"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config_dir, Utf8PathBuf::from("shotkit"));
        assert!(matches!(cli.command, Commands::Shots { archive: true }));
    }

    #[test]
    fn test_describe_lists_layers() {
        let mut layers = IndexMap::new();
        layers.insert(
            "keyLayer".to_string(),
            RenderLayerRecord {
                members: vec!["|char_hero_01:body".to_string()],
                adjustments: vec!["a".to_string(), "a".to_string()],
            },
        );
        let config = ShotLightingConfig {
            lrig_main: None,
            light_links: Some(LightLinks {
                mel_commands: vec!["lightlink -l key -o body;".to_string()],
            }),
            render_layers: Some(layers),
        };

        let text = describe(&config);
        assert!(text.contains("Light link directives: 1"));
        assert!(text.contains("Render layer keyLayer: 1 members, 1 adjustments"));
    }
}
