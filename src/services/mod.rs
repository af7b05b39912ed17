//! Services module - Core pipeline logic for project relocation and lighting propagation.
//!
//! The services are **host-agnostic**: everything that needs the 3D application goes
//! through the capability traits in [`crate::host`], so the same code runs against the
//! real host adapter and against in-memory fakes in tests.
//!
//! # Components
//!
//! Project relocation:
//! - [`PathCatalog`]: classifies every file dependency of the active scene into a
//!   [`DependencySet`](crate::models::DependencySet)
//! - [`ProjectMirror`]: copies a classified project into a destination root
//!   (skip-if-newer) and drives the full relocation procedure
//! - [`PathRewriter`]: repoints every path-reference record of the active scene,
//!   collecting the records it could not rewrite
//! - [`ReferenceUnloadGuard`]: keeps loaded references unloaded while the main scene
//!   is rewritten
//!
//! Lighting propagation:
//! - [`AssetNamespaceResolver`]: expands `#` wildcards in shot asset lists and diffs
//!   two shots' inventories
//! - [`LightingConfigCodec`] / [`ArchiveLayout`]: reads, writes and exports lighting
//!   config documents and locates them in the archive
//! - [`PropagationEngine`]: validates, then imports light rig, light links and render
//!   layers, filtered by the asset diff
//! - [`DeformerRenameGuard`]: keeps cache deformers uniquely named while render layers
//!   are exported or imported
//!
//! Shared:
//! - [`naming`]: the string grammar for shots, namespaces and directives
//! - [`validation`]: run-aborting [`ValidationError`]s and the farm access gate
//!
//! # Failure model
//!
//! Only validation aborts a run, and it always runs before the first write. Anything
//! that goes wrong with a single file, record, directive or member afterwards is
//! recorded in the [`RunReport`](crate::models::RunReport) and the run carries on
//! (copy failures follow the configured
//! [`CopyFailurePolicy`](crate::models::CopyFailurePolicy)).
//!
//! # Usage Example
//!
//! ```ignore
//! use shotkit::services::{PropagationEngine, PropagationOptions};
//!
//! let engine = PropagationEngine::new(&asset_table, settings, metrics, state);
//! let mut options = PropagationOptions::new(document);
//! options.include_light_links = false;
//!
//! let report = engine.run(&mut host, &host.current(), &options);
//! println!("{}", report.summary());
//! ```

pub mod assets;
pub mod catalog;
pub mod codec;
pub mod deformers;
pub mod mirror;
pub mod naming;
pub mod propagation;
pub mod references;
pub mod rewriter;
pub mod validation;

pub use assets::{AssetDiff, AssetInventory, AssetNamespaceResolver, ShotAssetRegistry, enumerate};
pub use catalog::PathCatalog;
pub use codec::{
    ArchiveLayout, ArchiveSource, CodecError, ExportOptions, ExportOutcome, LightingConfigCodec,
};
pub use deformers::DeformerRenameGuard;
pub use mirror::{CopyOutcome, MirrorError, ProjectMirror, RelocationOptions, default_destination};
pub use naming::{NamingError, ShotId};
pub use propagation::{
    LinkFilterOutcome, PropagationEngine, PropagationOptions, filter_light_links, select_members,
};
pub use references::ReferenceUnloadGuard;
pub use rewriter::{PathRewriter, RewriteOutcome};
pub use validation::{ValidationError, check_farm_access};
