//! # Errors
//!
//! Typed errors for run failures and rejected control operations.
//! Collaborators report their own problems through `anyhow::Error`; the
//! sequencer folds those into a [`RunFailure`] with the message kept verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a run ended in `Failed`
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Preparation failure: {0}")]
    PreparationFailure(String),

    #[error("Analysis failure: {0}")]
    AnalysisThreshold(String),

    #[error("Synthesis failure: {0}")]
    SynthesisFailure(String),

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Cancelled")]
    Cancelled,
}

impl RunFailure {
    /// Flatten an `anyhow` chain into a single line
    pub(crate) fn describe(err: &anyhow::Error) -> String {
        format!("{:#}", err)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunFailure::Cancelled)
    }
}

/// A control operation that was refused; the run is left untouched
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("A review run is already active")]
    RunAlreadyActive,

    #[error("No active review run")]
    NoActiveRun,

    #[error("Run is not waiting for an approval decision")]
    InvalidApprovalState,

    #[error("Decision already recorded; the run is rendering its final document")]
    DecisionRecorded,
}

/// A single analyst's failure, surfaced as an `error` output
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{task} failed: {reason}")]
pub struct TaskFailure {
    pub task: String,
    pub reason: String,
}
