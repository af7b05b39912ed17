//! Path-reference rewriting inside the active scene.

use crate::host::{HostError, PathRegistry, SceneContext};
use crate::metrics::Metrics;
use crate::models::RunWarning;
use crate::services::naming::rewrite_directory;
use camino::Utf8Path;

/// Result of one rewrite pass over the active scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Records whose directory was moved to the destination root
    pub rewritten: Vec<String>,
    /// Records already outside the source root, left untouched
    pub untouched: Vec<String>,
    /// Records that could not be rewritten, with the reason
    pub unresolved: Vec<(String, String)>,
}

impl RewriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// One warning per unresolved record.
    pub fn warnings(&self) -> impl Iterator<Item = RunWarning> + '_ {
        self.unresolved
            .iter()
            .map(|(record, reason)| RunWarning::UnresolvedRecord {
                record: record.clone(),
                reason: reason.clone(),
            })
    }
}

/// Moves every path-reference record of the active scene from one project
/// root to another.
pub struct PathRewriter;

impl PathRewriter {
    /// Rewrite the directory part of every record under `source_root`.
    ///
    /// Only listing the records can fail the call. A record that cannot be
    /// read or written is collected in [`RewriteOutcome::unresolved`] and the
    /// pass moves on to the next one.
    pub fn resolve<H>(
        host: &mut H,
        ctx: &SceneContext,
        source_root: &Utf8Path,
        dest_root: &Utf8Path,
        metrics: &Metrics,
    ) -> Result<RewriteOutcome, HostError>
    where
        H: PathRegistry + ?Sized,
    {
        let mut outcome = RewriteOutcome::default();
        let records = host.list_path_records(ctx)?;
        if records.is_empty() {
            tracing::debug!("No path records in {}", ctx.scene_file);
            return Ok(outcome);
        }

        for record in records {
            let current = match host.record_path(ctx, &record) {
                Ok(path) => path,
                Err(e) => {
                    Self::unresolved(&mut outcome, metrics, record, e);
                    continue;
                }
            };

            let Some(new_path) = rewrite_directory(&current, source_root, dest_root) else {
                tracing::debug!("{} is outside {}, leaving it", current, source_root);
                outcome.untouched.push(record);
                continue;
            };

            match host.set_record_path(ctx, &record, &new_path) {
                Ok(()) => {
                    tracing::debug!("{}: {} -> {}", record, current, new_path);
                    metrics.record_rewritten();
                    outcome.rewritten.push(record);
                }
                Err(e) => Self::unresolved(&mut outcome, metrics, record, e),
            }
        }

        tracing::info!(
            "Rewrote {} path records in {} ({} unresolved)",
            outcome.rewritten.len(),
            ctx.scene_file,
            outcome.unresolved.len()
        );
        Ok(outcome)
    }

    fn unresolved(outcome: &mut RewriteOutcome, metrics: &Metrics, record: String, e: HostError) {
        tracing::warn!("Could not resolve {}: {}", record, e);
        metrics.record_unresolved();
        outcome.unresolved.push((record, e.to_string()));
    }
}
