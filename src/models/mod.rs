//! Data models for shotkit.
//!
//! - [`PipelineConfig`]: archive locations, naming conventions and relocation policy from `shotkit.yaml`
//! - [`ShotAssetTable`]: raw per-shot asset lists from `shot_assets.yaml`
//! - [`DependencySet`] / [`ProjectRoot`]: classified file dependencies of a project
//! - [`ShotLightingConfig`]: the lighting config document exchanged between shots
//! - [`RunReport`]: end-of-run summary with accumulated warnings and errors
//! - [`RunState`]: progress of the current run, owned by [`RunStateManager`](crate::state::RunStateManager)

pub mod config;
pub mod dependency;
pub mod lighting;
pub mod report;
pub mod run_state;

pub use config::{CopyFailurePolicy, FarmSettings, PipelineConfig, PipelineSettings, ShotAssetTable};
pub use dependency::{DependencyCategory, DependencySet, ProjectRoot};
pub use lighting::{DEFAULT_RENDER_LAYER, LightLinks, RenderLayerRecord, ShotLightingConfig};
pub use report::{RunReport, RunStatus, RunWarning};
pub use run_state::{RunPhase, RunState};
