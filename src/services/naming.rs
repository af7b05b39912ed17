//! Naming grammar for shots, namespaces and directives.
//!
//! All the string-pattern parsing lives here so it can be tested without a
//! host. The grammar:
//!
//! - Shot id: `{seq}_{shot}`, two digits then three digits (`01_010`).
//! - Shot scene file name: `{seq}_{shot}_..._v{version}.{ext}`; the first two
//!   `_`-separated segments form the shot id.
//! - Lighting document name: `{seq}_{shot}_{rig}_v{version}.{ext}`; the shot
//!   id is everything before the `_{rig}_` marker.
//! - DAG path: segments separated by `|`, a leading `|` for absolute paths.
//!   A segment may carry a namespace prefix separated by `:`.
//! - Reference group: a top-level node named `{namespace}RNgroup`.
//! - Instance wildcard: a run of `#` standing for a zero-padded instance
//!   number (`##` -> `01`, `###` -> `001`).

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Separator between DAG path segments
pub const DAG_SEPARATOR: char = '|';

/// Separator between a namespace and a node name
pub const NAMESPACE_SEPARATOR: char = ':';

/// Suffix of the group node a reference is parented under
pub const REFERENCE_GROUP_SUFFIX: &str = "RNgroup";

/// Opening of an else branch in a light-link directive block
pub const ELSE_BRANCH_MARKER: &str = "}else";

/// Bare block close
pub const BLOCK_CLOSE: &str = "}";

/// Short-name suffix of cache deformer nodes
pub const DEFORMER_SUFFIX: &str = "Deformed";

/// Separates a deformer's original short name from its unique ancestry tag
pub const UNIQUE_NAME_SEPARATOR: &str = "___";

static SHOT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})_(\d{3})$").expect("Invalid shot id regex"));

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_v(\d+)(?:\.[^.]*)?$").expect("Invalid version regex"));

static TRAILING_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+$").expect("Invalid identifier regex"));

/// Errors raised while parsing names against the naming convention
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("{0} is not a valid shot id (expected `SS_TTT`, e.g. 01_010)")]
    InvalidShotId(String),

    #[error("{0} is not a valid shot file name")]
    InvalidShotFile(Utf8PathBuf),

    #[error("{0} has no version tag (`_v###`)")]
    MissingVersion(Utf8PathBuf),

    #[error("{path} does not follow the lighting config naming convention (no `{marker}` marker)")]
    InvalidDocumentName { path: Utf8PathBuf, marker: String },
}

/// Sequence and shot numbers identifying a shot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShotId {
    pub seq: String,
    pub shot: String,
}

impl FromStr for ShotId {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SHOT_ID_PATTERN
            .captures(s)
            .ok_or_else(|| NamingError::InvalidShotId(s.to_string()))?;
        Ok(Self {
            seq: caps[1].to_string(),
            shot: caps[2].to_string(),
        })
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.seq, self.shot)
    }
}

/// Shot and version parsed from a shot scene file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotFile {
    pub shot: ShotId,
    pub version: Option<String>,
}

impl ShotFile {
    pub fn version(&self, path: &Utf8Path) -> Result<&str, NamingError> {
        self.version
            .as_deref()
            .ok_or_else(|| NamingError::MissingVersion(path.to_path_buf()))
    }
}

/// Parse the shot a scene file belongs to.
///
/// ```ignore
/// let parsed = parse_shot_file("/shots/01_010_lighting_v003.ma".into())?;
/// assert_eq!(parsed.shot.to_string(), "01_010");
/// ```
pub fn parse_shot_file(path: &Utf8Path) -> Result<ShotFile, NamingError> {
    let invalid = || NamingError::InvalidShotFile(path.to_path_buf());
    let file_name = path.file_name().ok_or_else(invalid)?;

    let mut segments = file_name.splitn(3, '_');
    let seq = segments.next().ok_or_else(invalid)?;
    let shot = segments.next().ok_or_else(invalid)?;
    let shot = shot.split('.').next().unwrap_or(shot);
    let shot: ShotId = format!("{}_{}", seq, shot)
        .parse()
        .map_err(|_| invalid())?;

    let version = VERSION_PATTERN
        .captures(file_name)
        .map(|caps| caps[1].to_string());

    Ok(ShotFile { shot, version })
}

/// Numeric version tag of a file name (`_v012.json` gives 12).
pub fn version_number(path: &Utf8Path) -> Option<u64> {
    let caps = VERSION_PATTERN.captures(path.file_name()?)?;
    caps[1].parse().ok()
}

/// Parse the source shot id from a lighting config document path.
pub fn parse_document_shot(path: &Utf8Path, rig_name: &str) -> Result<ShotId, NamingError> {
    let marker = format!("_{}_", rig_name);
    let invalid = || NamingError::InvalidDocumentName {
        path: path.to_path_buf(),
        marker: marker.clone(),
    };

    // Accept either separator so archives written on Windows parse too.
    let file_name = path
        .as_str()
        .rsplit(['/', '\\'])
        .next()
        .ok_or_else(invalid)?;
    let (prefix, _) = file_name.split_once(&marker).ok_or_else(invalid)?;
    prefix.parse().map_err(|_| invalid())
}

/// Owning namespace of a render-layer member.
///
/// Takes the first DAG segment, drops a reference-group suffix, and keeps
/// the part before the namespace separator:
/// `|char_bob_01RNgroup|char_bob_01:geo` -> `char_bob_01`.
pub fn member_namespace(member: &str) -> Option<String> {
    let top = member
        .split(DAG_SEPARATOR)
        .find(|segment| !segment.is_empty())?;
    let top = top.replace(REFERENCE_GROUP_SUFFIX, "");
    let namespace = top.split(NAMESPACE_SEPARATOR).next().unwrap_or_default();
    if namespace.is_empty() {
        None
    } else {
        Some(namespace.to_string())
    }
}

/// Asset identifier a light-link directive points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveAsset {
    /// Identifier as written in the directive
    pub literal: String,
    /// Identifier with its instance number turned back into wildcards
    pub wildcard: Option<String>,
}

impl DirectiveAsset {
    pub fn matches_any(&self, names: &std::collections::BTreeSet<String>) -> bool {
        names.contains(&self.literal)
            || self.wildcard.as_ref().is_some_and(|w| names.contains(w))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.literal == name || self.wildcard.as_deref() == Some(name)
    }
}

/// Extract the asset a light-link directive references.
///
/// The identifier is the run of name characters right before the first
/// reference-group marker. Directives without a marker reference no asset.
pub fn directive_asset(directive: &str) -> Option<DirectiveAsset> {
    let (head, _) = directive.split_once(REFERENCE_GROUP_SUFFIX)?;
    let literal = TRAILING_IDENTIFIER.find(head)?.as_str();
    let literal = literal.trim_end_matches('_');
    if literal.is_empty() {
        return None;
    }
    Some(DirectiveAsset {
        literal: literal.to_string(),
        wildcard: wildcard_form(literal),
    })
}

/// Replace a trailing numeric instance tag with an equal-length run of `#`.
///
/// `prop_chair_03` -> `prop_chair_##`. Identifiers without a trailing
/// `_digits` segment are left alone and compared literally.
pub fn wildcard_form(identifier: &str) -> Option<String> {
    let (stem, tag) = identifier.rsplit_once('_')?;
    if stem.is_empty() || tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}_{}", stem, "#".repeat(tag.len())))
}

pub fn is_else_branch(directive: &str) -> bool {
    directive.trim_start().starts_with(ELSE_BRANCH_MARKER)
}

/// Globally unique short name for a cache deformer node.
///
/// Only deformers parented under a namespaced node can collide, so others
/// yield `None`, as do nodes that already carry a unique tag. The tag is the
/// node's full ancestry with namespace prefixes removed:
/// `|grp|char_bob_01:body|bodyDeformed` -> `bodyDeformed___grp_body_bodyDeformed`.
pub fn unique_deformer_name(long_name: &str) -> Option<String> {
    let segments: Vec<&str> = long_name.split(DAG_SEPARATOR).collect();
    let short = *segments.last()?;
    if short.contains(UNIQUE_NAME_SEPARATOR) || segments.len() < 2 {
        return None;
    }

    let parent = segments[segments.len() - 2];
    if !parent.contains(NAMESPACE_SEPARATOR) {
        return None;
    }

    let ancestry: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .rsplit(NAMESPACE_SEPARATOR)
                .next()
                .unwrap_or(segment)
        })
        .collect();

    Some(format!(
        "{}{}{}",
        short,
        UNIQUE_NAME_SEPARATOR,
        ancestry.join("_")
    ))
}

/// Swap `source_root` for `dest_root` in the directory part of `path`.
///
/// The file name is never touched. Returns `None` when the directory is not
/// under `source_root`.
pub fn rewrite_directory(
    path: &Utf8Path,
    source_root: &Utf8Path,
    dest_root: &Utf8Path,
) -> Option<Utf8PathBuf> {
    let file_name = path.file_name()?;
    let dir = path.parent()?;
    let relative = dir.strip_prefix(source_root).ok()?;

    let new_dir = if relative.as_str().is_empty() {
        dest_root.to_path_buf()
    } else {
        dest_root.join(relative)
    };
    Some(new_dir.join(file_name))
}
