use std::fmt;

/// Phase of a relocation or propagation run.
///
/// Propagation walks `Idle -> Validating -> Importing -> Done`; relocation
/// walks `Idle -> Validating -> Copying -> Rewriting -> Done`. Either may end
/// in `Aborted` straight out of `Validating`, and a relocation that finds the
/// scene already in place goes from `Validating` to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Importing,
    Copying,
    Rewriting,
    Aborted,
    Done,
}

impl RunPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Importing)
                | (Validating, Copying)
                | (Validating, Aborted)
                | (Validating, Done)
                | (Copying, Rewriting)
                | (Copying, Aborted)
                | (Rewriting, Done)
                | (Rewriting, Aborted)
                | (Importing, Done)
                | (Done, Idle)
                | (Aborted, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Importing => "importing",
            RunPhase::Copying => "copying",
            RunPhase::Rewriting => "rewriting",
            RunPhase::Aborted => "aborted",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress of the current run.
///
/// Wrapped in `Arc<RwLock<RunState>>` by [`crate::state::RunStateManager`];
/// mutate it through the manager so change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    pub phase: RunPhase,
    pub current_operation: String,
    pub current_item: Option<String>,

    // Progress
    pub processed: usize,
    pub total: usize,

    /// Items dropped or skipped during this run
    pub skipped_items: Vec<String>,
}

impl RunState {
    /// Reset everything but the phase.
    pub fn reset_progress(&mut self) {
        self.current_operation.clear();
        self.current_item = None;
        self.processed = 0;
        self.total = 0;
        self.skipped_items.clear();
    }
}
