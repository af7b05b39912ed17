use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Name of the implicit base render layer. It is never exported or imported.
pub const DEFAULT_RENDER_LAYER: &str = "defaultRenderLayer";

/// A shot's lighting setup as stored in the lighting config document.
///
/// Every section is optional; an absent section means it was not exported.
/// The heavy content (the light rig group and its local materials) lives in
/// a sibling container file referenced by `lrig_main`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotLightingConfig {
    /// Container file path, relative to the archive base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lrig_main: Option<String>,

    #[serde(rename = "lightLinks", default, skip_serializing_if = "Option::is_none")]
    pub light_links: Option<LightLinks>,

    #[serde(rename = "renderLayers", default, skip_serializing_if = "Option::is_none")]
    pub render_layers: Option<IndexMap<String, RenderLayerRecord>>,
}

/// Host-specific light-linking directives, kept in recorded order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightLinks {
    #[serde(
        rename = "melCommands",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub mel_commands: Vec<String>,
}

/// Membership and override directives of one render layer.
///
/// The layer name is the key of the document's `renderLayers` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderLayerRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub adjustments: Vec<String>,
}

/// Empty layers are written with `null` lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RenderLayerRecord {
    /// Adjustments with duplicates removed, first occurrence wins.
    pub fn unique_adjustments(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.adjustments
            .iter()
            .filter(|a| seen.insert(a.as_str()))
            .cloned()
            .collect()
    }
}

impl ShotLightingConfig {
    /// Render layers that can be imported, skipping the default layer.
    pub fn importable_layers(&self) -> impl Iterator<Item = (&String, &RenderLayerRecord)> {
        self.render_layers
            .iter()
            .flat_map(|layers| layers.iter())
            .filter(|(name, _)| name.as_str() != DEFAULT_RENDER_LAYER)
    }

    pub fn light_link_directives(&self) -> &[String] {
        self.light_links
            .as_ref()
            .map(|l| l.mel_commands.as_slice())
            .unwrap_or(&[])
    }

    /// Short description of which sections are present.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.lrig_main.is_some() {
            sections.push("lrig_main");
        }
        if self.light_links.is_some() {
            sections.push("lightLinks");
        }
        if self.render_layers.is_some() {
            sections.push("renderLayers");
        }
        sections
    }
}
