//! Asset namespace enumeration and shot-to-shot asset diffing.
//!
//! Shot asset registries list assets with `#` wildcards standing in for the
//! instance number (`prop_chair_##`). Scenes contain concrete namespaces
//! (`prop_chair_01`). [`enumerate`] maps the former onto the latter so two
//! shots' inventories can be compared.

use crate::models::{RunWarning, ShotAssetTable};
use crate::services::naming::ShotId;
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};

/// Lookup of the raw asset list of a shot.
pub trait ShotAssetRegistry {
    fn asset_list(&self, shot: &ShotId) -> Result<Vec<String>>;
}

impl ShotAssetRegistry for ShotAssetTable {
    fn asset_list(&self, shot: &ShotId) -> Result<Vec<String>> {
        self.shots
            .get(&shot.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("Shot {} is not in the asset registry", shot))
    }
}

/// Expand instance wildcards in one asset name.
///
/// `###` becomes `001` before `##` becomes `01`, so a triple-hash token is
/// never read as a double-hash one.
pub fn enumerate_asset(name: &str) -> String {
    name.replace("###", "001").replace("##", "01")
}

/// Expand instance wildcards in every asset name, keeping order.
pub fn enumerate<S: AsRef<str>>(assets: &[S]) -> Vec<String> {
    assets.iter().map(|a| enumerate_asset(a.as_ref())).collect()
}

/// Enumerated namespaces of one shot, each mapped back to its raw name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetInventory {
    namespaces: BTreeMap<String, String>,
}

impl AssetInventory {
    pub fn from_raw<S: AsRef<str>>(assets: &[S]) -> Self {
        let namespaces = assets
            .iter()
            .map(|raw| (enumerate_asset(raw.as_ref()), raw.as_ref().to_string()))
            .collect();
        Self { namespaces }
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &String> {
        self.namespaces.keys()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    fn raw_name(&self, namespace: &str) -> Option<&String> {
        self.namespaces.get(namespace)
    }
}

/// Difference between a source and a destination shot's assets.
///
/// Held for a whole propagation run and consulted identically by the light
/// rig, light link and render layer steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetDiff {
    /// In the source shot, absent from the destination
    pub skipped: BTreeSet<String>,
    /// In the destination shot, absent from the source
    pub added: BTreeSet<String>,
    /// Raw (wildcarded) names of the skipped assets
    pub skipped_patterns: BTreeSet<String>,
}

impl AssetDiff {
    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty() && self.added.is_empty()
    }

    /// True if `namespace` belongs to an asset the destination lacks.
    pub fn is_skipped(&self, namespace: &str) -> bool {
        self.skipped.contains(namespace) || self.skipped_patterns.contains(namespace)
    }

    /// Divergence warning for the operator, if the shots differ.
    pub fn warning(&self) -> Option<RunWarning> {
        if self.is_empty() {
            return None;
        }
        Some(RunWarning::AssetDivergence {
            skipped: self.skipped.clone(),
            added: self.added.clone(),
        })
    }
}

/// Compare two inventories.
pub fn diff(source: &AssetInventory, dest: &AssetInventory) -> AssetDiff {
    let mut result = AssetDiff::default();

    for namespace in source.namespaces() {
        if !dest.contains(namespace) {
            result.skipped.insert(namespace.clone());
            if let Some(raw) = source.raw_name(namespace) {
                result.skipped_patterns.insert(raw.clone());
            }
        }
    }

    result.added = dest
        .namespaces()
        .filter(|ns| !source.contains(ns))
        .cloned()
        .collect();

    result
}

/// Resolves shot inventories through an injected asset registry.
pub struct AssetNamespaceResolver<'a, R: ShotAssetRegistry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: ShotAssetRegistry + ?Sized> AssetNamespaceResolver<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub fn inventory(&self, shot: &ShotId) -> Result<AssetInventory> {
        let raw = self.registry.asset_list(shot)?;
        Ok(AssetInventory::from_raw(&raw))
    }

    /// Diff the source shot's assets against the destination's.
    pub fn diff_shots(&self, source: &ShotId, dest: &ShotId) -> Result<AssetDiff> {
        let source_inventory = self.inventory(source)?;
        let dest_inventory = self.inventory(dest)?;
        let result = diff(&source_inventory, &dest_inventory);

        tracing::info!(
            "Asset diff {} -> {}: {} skipped, {} new",
            source,
            dest,
            result.skipped.len(),
            result.added.len()
        );
        Ok(result)
    }
}
