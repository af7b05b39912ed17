// Run state module
//
// This module provides the RunStateManager which wraps RunState with thread-safe
// access using Arc<RwLock<T>> and emits change events for progress reporting.

use crate::models::{RunPhase, RunReport, RunState, RunStatus};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::broadcast;

/// Change events emitted when run state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The run moved to another phase
    PhaseChanged { from: RunPhase, to: RunPhase },

    /// Current operation has changed
    OperationChanged { operation: String },

    /// Progress has been updated
    ProgressUpdated {
        processed: usize,
        total: usize,
        current_item: Option<String>,
    },

    /// An item was dropped or skipped
    ItemSkipped { item: String, reason: String },

    /// The run reached a terminal phase
    RunFinished {
        status: RunStatus,
        warnings: usize,
        errors: usize,
    },
}

/// Attempted phase change the state machine does not allow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid run phase transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RunPhase,
    pub to: RunPhase,
}

/// Thread-safe run state with event emission
///
/// Owns the [`RunPhase`] state machine for relocation and propagation runs:
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`transition()`](Self::transition) for validated phase changes
/// - [`subscribe()`](Self::subscribe) for listening to changes
pub struct RunStateManager {
    state: Arc<RwLock<RunState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl RunStateManager {
    /// Create a new manager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            state_tx,
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> RunState {
        self.read_lock().clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.read_lock().phase
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RunState) -> R,
    {
        f(&self.read_lock())
    }

    /// Update the state and emit change events
    ///
    /// Phase changes made here bypass transition checks; use
    /// [`transition()`](Self::transition) to move between phases.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut RunState),
    {
        let mut state = self.write_lock();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        self.emit(&changes);
        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, changes: &[StateChange]) {
        for change in changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }
    }

    fn detect_changes(&self, old: &RunState, new: &RunState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.phase != new.phase {
            changes.push(StateChange::PhaseChanged {
                from: old.phase,
                to: new.phase,
            });
        }

        if old.current_operation != new.current_operation {
            changes.push(StateChange::OperationChanged {
                operation: new.current_operation.clone(),
            });
        }

        if old.processed != new.processed
            || old.total != new.total
            || old.current_item != new.current_item
        {
            changes.push(StateChange::ProgressUpdated {
                processed: new.processed,
                total: new.total,
                current_item: new.current_item.clone(),
            });
        }

        changes
    }

    /// Move to `to`, rejecting transitions the state machine forbids
    pub fn transition(&self, to: RunPhase) -> Result<Vec<StateChange>, InvalidTransition> {
        let from = self.phase();
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }
        tracing::debug!("Run phase {} -> {}", from, to);
        Ok(self.update(|state| state.phase = to))
    }

    /// Return to `Idle` from a terminal phase and enter `Validating`
    pub fn begin_run(&self, operation: &str) -> Result<Vec<StateChange>, InvalidTransition> {
        let mut changes = Vec::new();
        if self.phase().is_terminal() {
            changes.extend(self.transition(RunPhase::Idle)?);
        }
        changes.extend(self.update(|state| {
            state.reset_progress();
            state.current_operation = operation.to_string();
        }));
        changes.extend(self.transition(RunPhase::Validating)?);
        Ok(changes)
    }

    pub fn set_operation(&self, operation: &str) -> Vec<StateChange> {
        self.update(|state| state.current_operation = operation.to_string())
    }

    pub fn set_total(&self, total: usize) -> Vec<StateChange> {
        self.update(|state| {
            state.total = total;
            state.processed = 0;
        })
    }

    /// Mark `item` as the one being processed and count it
    pub fn advance(&self, item: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.current_item = Some(item.to_string());
            state.processed += 1;
        })
    }

    /// Record a dropped or skipped item
    pub fn skip_item(&self, item: &str, reason: &str) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.skipped_items.push(item.to_string()));

        let event = StateChange::ItemSkipped {
            item: item.to_string(),
            reason: reason.to_string(),
        };
        let _ = self.state_tx.send(event.clone());
        changes.push(event);
        changes
    }

    /// Enter the terminal phase matching `report` and announce the outcome
    pub fn finish(&self, report: &RunReport) -> Result<Vec<StateChange>, InvalidTransition> {
        let target = match report.status {
            RunStatus::Done => RunPhase::Done,
            RunStatus::Aborted => RunPhase::Aborted,
        };
        let mut changes = self.transition(target)?;
        changes.extend(self.update(|state| state.current_item = None));

        let event = StateChange::RunFinished {
            status: report.status,
            warnings: report.warnings.len(),
            errors: report.errors.len(),
        };
        let _ = self.state_tx.send(event.clone());
        changes.push(event);
        Ok(changes)
    }
}

impl Default for RunStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RunStateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
