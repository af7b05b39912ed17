//! Scoped unloading of nested scene references.
//!
//! Rewriting the paths of a scene whose references are loaded would also
//! reach into the referenced files, which have already been rewritten in
//! their own context. A [`ReferenceUnloadGuard`] keeps every loaded reference
//! unloaded while it is alive and loads them again when dropped, so an error
//! halfway through the rewrite still leaves the scene as it was found.

use crate::host::{HostError, ReferenceRegistry, SceneContext};
use std::ops::{Deref, DerefMut};

/// Holds the loaded references of a scene unloaded until dropped.
///
/// Derefs to the wrapped host so the rewrite happens through the guard.
pub struct ReferenceUnloadGuard<'a, H: ReferenceRegistry + ?Sized> {
    host: &'a mut H,
    ctx: SceneContext,
    /// Reference nodes this guard unloaded, in unload order
    unloaded: Vec<String>,
}

impl<'a, H: ReferenceRegistry + ?Sized> ReferenceUnloadGuard<'a, H> {
    /// Unload every loaded reference of the scene `ctx`.
    ///
    /// If an unload fails, the references already unloaded are loaded again
    /// before the error is returned.
    pub fn acquire(host: &'a mut H, ctx: &SceneContext) -> Result<Self, HostError> {
        let loaded: Vec<String> = host
            .list_references(ctx)?
            .into_iter()
            .filter(|r| r.loaded)
            .map(|r| r.node)
            .collect();

        let mut guard = Self {
            host,
            ctx: ctx.clone(),
            unloaded: Vec::new(),
        };
        for node in loaded {
            tracing::debug!("Unloading {} before rewrite", node);
            guard.host.unload_reference(ctx, &node)?;
            guard.unloaded.push(node);
        }
        Ok(guard)
    }

    pub fn unloaded(&self) -> &[String] {
        &self.unloaded
    }

    /// Load the references again, reporting the first failure.
    ///
    /// References after a failed one are still loaded when the guard drops.
    pub fn release(mut self) -> Result<(), HostError> {
        while !self.unloaded.is_empty() {
            let node = self.unloaded.remove(0);
            tracing::debug!("Reloading {}", node);
            self.host.load_reference(&self.ctx, &node)?;
        }
        Ok(())
    }
}

impl<H: ReferenceRegistry + ?Sized> Deref for ReferenceUnloadGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        self.host
    }
}

impl<H: ReferenceRegistry + ?Sized> DerefMut for ReferenceUnloadGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.host
    }
}

impl<H: ReferenceRegistry + ?Sized> Drop for ReferenceUnloadGuard<'_, H> {
    fn drop(&mut self) {
        for node in self.unloaded.drain(..) {
            match self.host.load_reference(&self.ctx, &node) {
                Ok(()) => tracing::debug!("Reloaded {}", node),
                Err(e) => tracing::error!("Failed to reload reference {}: {}", node, e),
            }
        }
    }
}
