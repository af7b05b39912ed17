use camino::Utf8PathBuf;
use std::collections::BTreeSet;
use std::fmt;

/// Terminal state of a relocation or propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every requested section was processed, possibly with dropped items
    Done,
    /// Upfront validation failed; nothing was mutated
    Aborted,
}

/// A recoverable problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// Source and destination shots do not share the same assets
    AssetDivergence {
        skipped: BTreeSet<String>,
        added: BTreeSet<String>,
    },
    /// A path-reference record could not be rewritten
    UnresolvedRecord { record: String, reason: String },
    /// A light-link directive was dropped by the asset filter
    DroppedDirective { directive: String },
    /// A render-layer member has no counterpart in the destination scene
    DroppedMember { layer: String, member: String },
    /// A namespace seen in the source layers but missing from this scene
    ObservedSkip { namespace: String },
    /// A whole section or item was skipped
    Skipped { what: String, reason: String },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::AssetDivergence { skipped, added } => {
                write!(f, "asset divergence:")?;
                if !skipped.is_empty() {
                    write!(
                        f,
                        " in the source shot but not in this shot (skipped): {}",
                        join(skipped)
                    )?;
                }
                if !added.is_empty() {
                    if !skipped.is_empty() {
                        write!(f, ";")?;
                    }
                    write!(f, " in this shot but not in the source shot: {}", join(added))?;
                }
                Ok(())
            }
            RunWarning::UnresolvedRecord { record, reason } => {
                write!(f, "could not resolve {}: {}", record, reason)
            }
            RunWarning::DroppedDirective { directive } => {
                write!(f, "dropped light link: {}", directive)
            }
            RunWarning::DroppedMember { layer, member } => {
                write!(f, "dropped member {} from layer {}", member, layer)
            }
            RunWarning::ObservedSkip { namespace } => {
                write!(f, "not present in this shot: {}", namespace)
            }
            RunWarning::Skipped { what, reason } => write!(f, "skipped {}: {}", what, reason),
        }
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// End-of-run summary handed back to the operator.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub warnings: Vec<RunWarning>,
    pub errors: Vec<String>,
    /// Scene the run finished on, if it got that far
    pub scene_file: Option<Utf8PathBuf>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            status: RunStatus::Done,
            warnings: Vec::new(),
            errors: Vec::new(),
            scene_file: None,
        }
    }

    pub fn aborted(cause: impl fmt::Display) -> Self {
        Self {
            status: RunStatus::Aborted,
            warnings: Vec::new(),
            errors: vec![cause.to_string()],
            scene_file: None,
        }
    }

    pub fn warn(&mut self, warning: RunWarning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(message);
    }

    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }

    /// Number of warnings matching `pred`.
    pub fn count_warnings(&self, pred: impl Fn(&RunWarning) -> bool) -> usize {
        self.warnings.iter().filter(|w| pred(w)).count()
    }

    /// Human-readable end-of-run summary.
    pub fn summary(&self) -> String {
        let mut out = match self.status {
            RunStatus::Done => "SUCCESS".to_string(),
            RunStatus::Aborted => "ABORTED".to_string(),
        };
        if let Some(scene) = &self.scene_file {
            out.push_str(&format!(": {}", scene));
        }
        out.push('\n');

        if !self.errors.is_empty() {
            out.push_str(&format!("\nErrors ({}):\n", self.errors.len()));
            for e in &self.errors {
                out.push_str(&format!("\t{}\n", e));
            }
        }
        if !self.warnings.is_empty() {
            out.push_str(&format!("\nWarnings ({}):\n", self.warnings.len()));
            for w in &self.warnings {
                out.push_str(&format!("\t{}\n", w));
            }
        }
        out
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
