//! # Approval Gate
//!
//! One-shot rendezvous between the sequencer, parked in `AwaitingApproval`,
//! and whichever caller submits the human decision.
//!
//! The sequencer calls [`ApprovalGate::request`] and awaits the receiver.
//! The first of `resolve` or `cancel` to take the lock wins; every later
//! attempt is refused.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::error::ControlError;
use crate::state::Decision;

/// What the parked sequencer wakes up with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Decided {
        decision: Decision,
        feedback: Option<String>,
    },
    Cancelled,
}

enum GateState {
    Idle,
    Pending(oneshot::Sender<GateOutcome>),
    Resolved,
    Cancelled,
}

pub struct ApprovalGate {
    state: Mutex<GateState>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the gate. A gate cancelled before this call yields
    /// `GateOutcome::Cancelled` straight away.
    pub fn request(&self) -> Result<oneshot::Receiver<GateOutcome>, ControlError> {
        let mut state = self.lock();
        let (tx, rx) = oneshot::channel();
        match *state {
            GateState::Idle => {
                *state = GateState::Pending(tx);
                Ok(rx)
            }
            GateState::Cancelled => {
                let _ = tx.send(GateOutcome::Cancelled);
                Ok(rx)
            }
            GateState::Pending(_) | GateState::Resolved => Err(ControlError::InvalidApprovalState),
        }
    }

    /// Deliver the decision. Only the first call on a pending gate succeeds.
    pub fn resolve(&self, decision: Decision, feedback: Option<String>) -> Result<(), ControlError> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, GateState::Resolved) {
            GateState::Pending(tx) => {
                tx.send(GateOutcome::Decided { decision, feedback })
                    .map_err(|_| ControlError::InvalidApprovalState)?;
                tracing::info!(%decision, "Approval resolved");
                Ok(())
            }
            previous => {
                *state = previous;
                Err(ControlError::InvalidApprovalState)
            }
        }
    }

    /// Cancel the gate, waking a parked sequencer. Returns false when a
    /// decision already won or the gate was already cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, GateState::Cancelled) {
            GateState::Idle => true,
            GateState::Pending(tx) => {
                let _ = tx.send(GateOutcome::Cancelled);
                true
            }
            previous => {
                *state = previous;
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.lock(), GateState::Pending(_))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.lock(), GateState::Resolved)
    }
}
