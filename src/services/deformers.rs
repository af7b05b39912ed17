//! Scoped renaming of cache deformer nodes.
//!
//! Cache deformers share short names across asset namespaces, which makes
//! render-layer override directives ambiguous. While a [`DeformerRenameGuard`]
//! is alive every colliding deformer carries a unique short name; dropping
//! the guard puts the original names back, on success and error paths alike.

use crate::host::{HostError, LightingHost, SceneContext};
use crate::services::naming::{DAG_SEPARATOR, DEFORMER_SUFFIX, unique_deformer_name};
use std::ops::{Deref, DerefMut};

/// One rename performed by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
struct Renamed {
    /// Long name after the rename
    current: String,
    original_short: String,
}

/// Keeps deformer nodes uniquely named until dropped.
///
/// Derefs to the wrapped host so layer work happens through the guard.
pub struct DeformerRenameGuard<'a, H: LightingHost + ?Sized> {
    host: &'a mut H,
    ctx: SceneContext,
    renamed: Vec<Renamed>,
}

impl<'a, H: LightingHost + ?Sized> DeformerRenameGuard<'a, H> {
    /// Rename every colliding deformer in the active document.
    ///
    /// If a rename fails, the ones already done are restored before the
    /// error is returned.
    pub fn acquire(host: &'a mut H, ctx: &SceneContext) -> Result<Self, HostError> {
        let mut guard = Self {
            host,
            ctx: ctx.clone(),
            renamed: Vec::new(),
        };

        for long_name in guard.host.list_nodes_with_suffix(ctx, DEFORMER_SUFFIX)? {
            let Some(unique) = unique_deformer_name(&long_name) else {
                continue;
            };
            let original_short = long_name
                .rsplit(DAG_SEPARATOR)
                .next()
                .unwrap_or(&long_name)
                .to_string();

            let current = guard.host.rename_node(ctx, &long_name, &unique)?;
            tracing::debug!("Renamed deformer {} -> {}", long_name, current);
            guard.renamed.push(Renamed {
                current,
                original_short,
            });
        }

        if !guard.renamed.is_empty() {
            tracing::info!("Gave {} deformers unique names", guard.renamed.len());
        }
        Ok(guard)
    }

    pub fn renamed_count(&self) -> usize {
        self.renamed.len()
    }

    /// Context the renames were made in.
    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }
}

impl<H: LightingHost + ?Sized> Deref for DeformerRenameGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        self.host
    }
}

impl<H: LightingHost + ?Sized> DerefMut for DeformerRenameGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.host
    }
}

impl<H: LightingHost + ?Sized> Drop for DeformerRenameGuard<'_, H> {
    fn drop(&mut self) {
        // Reverse order so nested renames unwind cleanly
        for renamed in self.renamed.drain(..).rev() {
            match self
                .host
                .rename_node(&self.ctx, &renamed.current, &renamed.original_short)
            {
                Ok(restored) => tracing::debug!("Restored deformer {}", restored),
                Err(e) => tracing::error!(
                    "Failed to restore deformer {} to {}: {}",
                    renamed.current,
                    renamed.original_short,
                    e
                ),
            }
        }
    }
}
