//! Propagation of a lighting setup from one shot to another.
//!
//! A run validates everything it needs up front (both shot ids, the
//! document, the two asset lists) and only then touches the host. The
//! asset diff computed during validation gates every import step:
//!
//! 1. Light rig: import the container next to the document.
//! 2. Light links: drop directives that point at skipped or large assets,
//!    then run the survivors as one batch.
//! 3. Render layers: with deformers uniquely named, rebuild each layer from
//!    the members that exist in this shot and apply its overrides.
//!
//! Per-item failures become warnings or errors in the [`RunReport`]; only
//! validation aborts the run.

use crate::host::{HostError, LightingHost, SceneContext};
use crate::metrics::Metrics;
use crate::models::{
    DEFAULT_RENDER_LAYER, PipelineSettings, RenderLayerRecord, RunPhase, RunReport, RunWarning,
    ShotLightingConfig,
};
use crate::services::assets::{AssetDiff, AssetNamespaceResolver, ShotAssetRegistry};
use crate::services::codec::{LightingConfigCodec, container_for_document};
use crate::services::deformers::DeformerRenameGuard;
use crate::services::naming::{
    BLOCK_CLOSE, ShotId, directive_asset, is_else_branch, member_namespace, parse_document_shot,
    parse_shot_file,
};
use crate::services::validation::ValidationError;
use crate::state::RunStateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Caller options for one propagation run.
#[derive(Debug, Clone)]
pub struct PropagationOptions {
    /// Lighting config document exported from the source shot
    pub document: Utf8PathBuf,
    pub include_light_rig: bool,
    pub include_light_links: bool,
    pub include_render_layers: bool,
    /// Only rebuild these layers, if set
    pub layer_filter: Option<BTreeSet<String>>,
}

impl PropagationOptions {
    /// Import every section of `document`.
    pub fn new<P: Into<Utf8PathBuf>>(document: P) -> Self {
        Self {
            document: document.into(),
            include_light_rig: true,
            include_light_links: true,
            include_render_layers: true,
            layer_filter: None,
        }
    }

    fn wants_layer(&self, layer: &str) -> bool {
        self.layer_filter
            .as_ref()
            .is_none_or(|filter| filter.contains(layer))
    }

    fn section_count(&self) -> usize {
        [
            self.include_light_rig,
            self.include_light_links,
            self.include_render_layers,
        ]
        .into_iter()
        .filter(|included| *included)
        .count()
    }
}

/// Light-link directives left after asset filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilterOutcome {
    /// Directives to run, in their original order
    pub batch: Vec<String>,
    pub dropped: Vec<String>,
}

impl LinkFilterOutcome {
    /// The surviving directives as one script.
    pub fn script(&self) -> String {
        self.batch.join("\n")
    }
}

/// Drop directives that reference a skipped asset or one of `large_assets`.
///
/// A directive is matched both by its literal asset identifier and by that
/// identifier with its instance number turned back into wildcards, against
/// the skipped namespaces and their raw registry patterns. An else-branch
/// directive that is dropped, or that follows a dropped directive, is
/// replaced by a bare block close. That is a line-level rewrite only: the
/// braces of the resulting script are not re-counted and need not balance.
pub fn filter_light_links(
    directives: &[String],
    diff: &AssetDiff,
    large_assets: &[String],
) -> LinkFilterOutcome {
    let mut outcome = LinkFilterOutcome::default();
    let mut previous_dropped = false;

    for directive in directives {
        let drop = directive_asset(directive).is_some_and(|asset| {
            asset.matches_any(&diff.skipped)
                || asset.matches_any(&diff.skipped_patterns)
                || large_assets.iter().any(|large| asset.matches_name(large))
        });

        if is_else_branch(directive) && (drop || previous_dropped) {
            outcome.batch.push(BLOCK_CLOSE.to_string());
        } else if !drop {
            outcome.batch.push(directive.clone());
        }
        if drop {
            tracing::debug!("Dropping light link: {}", directive);
            outcome.dropped.push(directive.clone());
        }
        previous_dropped = drop;
    }

    outcome
}

/// Members of `record` that can be added to the layer in this shot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSelection {
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
    /// Namespaces of dropped members that do not exist in this scene
    pub missing_namespaces: BTreeSet<String>,
}

/// Split a layer's members into those to keep and those to drop.
///
/// A member is dropped if it does not exist in this scene or if its
/// owning namespace belongs to a skipped asset. Duplicates are kept once.
pub fn select_members<F>(record: &RenderLayerRecord, diff: &AssetDiff, exists: F) -> MemberSelection
where
    F: Fn(&str) -> bool,
{
    let mut selection = MemberSelection::default();
    let mut seen = HashSet::new();

    for member in &record.members {
        if !seen.insert(member.as_str()) {
            continue;
        }
        let namespace = member_namespace(member);
        if !exists(member) {
            if let Some(namespace) = namespace {
                selection.missing_namespaces.insert(namespace);
            }
            selection.dropped.push(member.clone());
        } else if namespace.as_deref().is_some_and(|ns| diff.is_skipped(ns)) {
            selection.dropped.push(member.clone());
        } else {
            selection.kept.push(member.clone());
        }
    }

    selection
}

/// Everything a run needs, established before any mutation.
struct ValidatedRun {
    current_shot: ShotId,
    source_shot: ShotId,
    config: ShotLightingConfig,
    diff: AssetDiff,
}

/// Drives lighting propagation into the active scene.
pub struct PropagationEngine<'a, R: ShotAssetRegistry + ?Sized> {
    registry: &'a R,
    settings: PipelineSettings,
    metrics: Arc<Metrics>,
    state: RunStateManager,
}

impl<'a, R: ShotAssetRegistry + ?Sized> PropagationEngine<'a, R> {
    pub fn new(
        registry: &'a R,
        settings: PipelineSettings,
        metrics: Arc<Metrics>,
        state: RunStateManager,
    ) -> Self {
        Self {
            registry,
            settings,
            metrics,
            state,
        }
    }

    pub fn state(&self) -> &RunStateManager {
        &self.state
    }

    /// Propagate `options.document` into the scene `ctx` refers to.
    pub fn run<H>(&self, host: &mut H, ctx: &SceneContext, options: &PropagationOptions) -> RunReport
    where
        H: LightingHost + ?Sized,
    {
        if let Err(e) = self.state.begin_run("Propagating lighting") {
            return RunReport::aborted(e);
        }

        let validated = match self.validate(ctx, &options.document) {
            Ok(validated) => validated,
            Err(e) => {
                tracing::error!("Propagation aborted: {}", e);
                let report = RunReport::aborted(&e);
                self.finish(&report);
                return report;
            }
        };

        let mut report = RunReport::new();
        report.scene_file = Some(ctx.scene_file.clone());
        tracing::info!(
            "Propagating lighting setup from {} to {}",
            validated.source_shot,
            validated.current_shot
        );
        if let Some(warning) = validated.diff.warning() {
            report.warn(warning);
        }

        // A handle the host no longer recognises stops the run before any import
        match host.set_current_layer(ctx, DEFAULT_RENDER_LAYER) {
            Ok(()) => {}
            Err(e @ HostError::StaleContext { .. }) => {
                tracing::error!("Propagation aborted: {}", e);
                let report = RunReport::aborted(&e);
                self.finish(&report);
                return report;
            }
            Err(e) => report.error(format!("Could not select {}: {}", DEFAULT_RENDER_LAYER, e)),
        }

        if let Err(e) = self.state.transition(RunPhase::Importing) {
            report.error(e.to_string());
            return report;
        }
        self.state.set_total(options.section_count());

        // Light rig first: links and overrides may point at rig nodes
        if options.include_light_rig {
            self.state.advance("light rig");
            self.import_light_rig(host, ctx, &options.document, &validated.config, &mut report);
        }
        if options.include_light_links {
            self.state.advance("light links");
            self.import_light_links(host, ctx, &validated, &mut report);
        }
        if options.include_render_layers {
            self.state.advance("render layers");
            self.import_render_layers(host, ctx, &validated, options, &mut report);
        }

        tracing::info!("Propagation complete");
        self.metrics.log_summary();
        self.finish(&report);
        report
    }

    fn finish(&self, report: &RunReport) {
        if let Err(e) = self.state.finish(report) {
            tracing::error!("{}", e);
        }
    }

    fn validate(&self, ctx: &SceneContext, document: &Utf8Path) -> Result<ValidatedRun, ValidationError> {
        let current_shot = parse_shot_file(&ctx.scene_file)?.shot;
        let source_shot = parse_document_shot(document, &self.settings.light_rig_name)?;

        if !document.is_file() {
            return Err(ValidationError::MissingDocument(document.to_path_buf()));
        }
        let config = LightingConfigCodec::read_document(document).map_err(|e| {
            ValidationError::UnreadableDocument {
                path: document.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let diff = AssetNamespaceResolver::new(self.registry)
            .diff_shots(&source_shot, &current_shot)
            .map_err(|e| ValidationError::AssetRegistry(format!("{:#}", e)))?;

        Ok(ValidatedRun {
            current_shot,
            source_shot,
            config,
            diff,
        })
    }

    fn import_light_rig<H>(
        &self,
        host: &mut H,
        ctx: &SceneContext,
        document: &Utf8Path,
        config: &ShotLightingConfig,
        report: &mut RunReport,
    ) where
        H: LightingHost + ?Sized,
    {
        if config.lrig_main.is_none() {
            report.warn(RunWarning::Skipped {
                what: "light rig".to_string(),
                reason: format!("no light rig recorded in {}", document),
            });
            return;
        }

        let container = container_for_document(document, &self.settings.container_extension);
        if !container.is_file() {
            report.warn(RunWarning::Skipped {
                what: "light rig".to_string(),
                reason: format!("{} does not exist", container),
            });
            return;
        }

        match host.import_file(ctx, &container) {
            Ok(()) => tracing::info!("Light rig imported from {}", container),
            Err(e) => report.error(format!("Light rig import failed: {}", e)),
        }
    }

    fn import_light_links<H>(
        &self,
        host: &mut H,
        ctx: &SceneContext,
        run: &ValidatedRun,
        report: &mut RunReport,
    ) where
        H: LightingHost + ?Sized,
    {
        let Some(links) = &run.config.light_links else {
            report.warn(RunWarning::Skipped {
                what: "light links".to_string(),
                reason: "none recorded in the lighting config".to_string(),
            });
            return;
        };

        let outcome = filter_light_links(&links.mel_commands, &run.diff, &self.settings.large_assets);
        self.metrics.record_directives_dropped(outcome.dropped.len());
        for directive in &outcome.dropped {
            self.state.skip_item(directive, "references an asset missing from this shot");
            report.warn(RunWarning::DroppedDirective {
                directive: directive.clone(),
            });
        }

        if outcome.batch.is_empty() {
            return;
        }
        match host.run_directives(ctx, &outcome.script()) {
            Ok(()) => tracing::info!("Applied {} light links", outcome.batch.len()),
            Err(e) => report.error(format!("Light links failed: {}", e)),
        }
    }

    fn import_render_layers<H>(
        &self,
        host: &mut H,
        ctx: &SceneContext,
        run: &ValidatedRun,
        options: &PropagationOptions,
        report: &mut RunReport,
    ) where
        H: LightingHost + ?Sized,
    {
        if run.config.render_layers.is_none() {
            report.warn(RunWarning::Skipped {
                what: "render layers".to_string(),
                reason: "none recorded in the lighting config".to_string(),
            });
            return;
        }

        let mut guard = match DeformerRenameGuard::acquire(host, ctx) {
            Ok(guard) => guard,
            Err(e) => {
                report.error(format!("Could not rename deformers: {}", e));
                return;
            }
        };

        let mut missing_namespaces = BTreeSet::new();
        for (layer, record) in run.config.importable_layers() {
            if !options.wants_layer(layer) {
                tracing::debug!("Layer {} not requested", layer);
                continue;
            }

            let selection = select_members(record, &run.diff, |member| {
                guard.node_exists(ctx, member).unwrap_or_else(|e| {
                    tracing::warn!("Could not look up {}: {}", member, e);
                    false
                })
            });
            for member in &selection.dropped {
                self.metrics.record_member_dropped();
                report.warn(RunWarning::DroppedMember {
                    layer: layer.clone(),
                    member: member.clone(),
                });
            }
            missing_namespaces.extend(selection.missing_namespaces);

            if selection.kept.is_empty() {
                self.state.skip_item(layer, "no members exist in this shot");
                report.warn(RunWarning::Skipped {
                    what: format!("render layer {}", layer),
                    reason: "no members exist in this shot".to_string(),
                });
                continue;
            }

            if let Err(e) = self.build_layer(&mut *guard, ctx, layer, record, &selection.kept, &run.diff, report) {
                report.error(format!("Render layer {} failed: {}", layer, e));
            }
        }

        for namespace in missing_namespaces {
            report.warn(RunWarning::ObservedSkip { namespace });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_layer<H>(
        &self,
        host: &mut H,
        ctx: &SceneContext,
        layer: &str,
        record: &RenderLayerRecord,
        members: &[String],
        diff: &AssetDiff,
        report: &mut RunReport,
    ) -> Result<(), HostError>
    where
        H: LightingHost + ?Sized,
    {
        let created = host.create_render_layer(ctx, layer)?;
        tracing::info!("Creating render layer {}", created);
        self.metrics.record_layer_created();

        host.set_current_layer(ctx, &created)?;
        host.set_layer_members(ctx, &created, members)?;

        let not_applied =
            host.apply_layer_overrides(ctx, &created, &record.unique_adjustments(), &diff.skipped)?;
        for directive in not_applied {
            report.warn(RunWarning::Skipped {
                what: format!("override on {}", created),
                reason: directive,
            });
        }
        Ok(())
    }
}
