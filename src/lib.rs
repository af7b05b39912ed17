// shotkit - Render-farm project relocation and shot-to-shot lighting propagation
//
// This is the library crate containing the core pipeline logic and data structures.
// The binary crate (main.rs) provides a command-line entry point for the
// host-independent operations.

pub mod config;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use host::{HostError, SceneContext};
pub use metrics::Metrics;
pub use models::{
    DependencySet, PipelineConfig, ProjectRoot, RunReport, RunStatus, ShotAssetTable,
    ShotLightingConfig,
};
pub use services::{
    LightingConfigCodec, PathCatalog, PathRewriter, ProjectMirror, PropagationEngine,
};
pub use state::{RunStateManager, StateChange};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
