//! # Run State
//!
//! The single source of truth for one review run: stage, progress, outputs,
//! the approval request/response pair and the terminal result.
//!
//! Only the stage sequencer holds a `Run` mutably. Everyone else sees
//! [`RunSnapshot`] copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::RunFailure;
use crate::workflow::pipeline::Stage;

/// Opaque identifier of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// System or progress message
    Info,
    /// Successful analyst result
    AgentResult,
    /// Analyst failure or system error
    Error,
}

/// One emitted analysis artifact or system message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub source: String,
    pub kind: OutputKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Output {
    pub fn new(source: impl Into<String>, kind: OutputKind, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(source, OutputKind::Info, content)
    }

    pub fn agent_result(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(source, OutputKind::AgentResult, content)
    }

    pub fn error(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(source, OutputKind::Error, content)
    }
}

/// Human decision on a reviewed concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unrecognised decision '{0}' (expected approve/yes or reject/no)")]
pub struct DecisionParseError(pub String);

impl FromStr for Decision {
    type Err = DecisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "approve" | "approved" => Ok(Decision::Approve),
            "no" | "n" | "reject" | "rejected" | "deny" | "denied" => Ok(Decision::Reject),
            _ => Err(DecisionParseError(s.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Approve => f.write_str("APPROVED"),
            Decision::Reject => f.write_str("REJECTED"),
        }
    }
}

/// The approval request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub question: String,
    pub context: String,
    pub decision: Option<Decision>,
    pub feedback: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RunResult {
    Approved,
    Rejected,
    Failed(RunFailure),
}

impl From<Decision> for RunResult {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => RunResult::Approved,
            Decision::Reject => RunResult::Rejected,
        }
    }
}

/// Attempted mutation that would break a run invariant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal stage transition {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },

    #[error("Run already finished")]
    Finished,

    #[error("No approval has been requested")]
    NoApproval,

    #[error("Approval already decided")]
    AlreadyDecided,
}

/// Read-only copy of a run, as published to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub id: RunId,
    pub document: String,
    pub stage: Stage,
    pub progress: u8,
    pub current_step: String,
    pub outputs: Vec<Output>,
    pub approval: Option<Approval>,
    pub result: Option<RunResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One workflow execution
#[derive(Debug, Clone)]
pub struct Run {
    id: RunId,
    document: String,
    stage: Stage,
    progress: u8,
    current_step: String,
    outputs: Vec<Output>,
    approval: Option<Approval>,
    result: Option<RunResult>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a run in `Ready` for the named document
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            document: document.into(),
            stage: Stage::Ready,
            progress: 0,
            current_step: Stage::Ready.step_label().to_string(),
            outputs: Vec::new(),
            approval: None,
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.approval.as_ref()
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    fn ensure_open(&self) -> Result<(), StateError> {
        if self.is_finished() {
            Err(StateError::Finished)
        } else {
            Ok(())
        }
    }

    /// Move to the next forward stage, applying its progress target and label
    pub(crate) fn enter(&mut self, to: Stage) -> Result<(), StateError> {
        if !self.stage.can_transition_to(to) {
            return Err(StateError::IllegalTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        self.current_step = to.step_label().to_string();
        if let Some(target) = to.progress_target() {
            self.progress = self.progress.max(target);
        }
        Ok(())
    }

    /// Raise progress within the current stage; never lowers it
    pub(crate) fn advance_progress(&mut self, progress: u8) -> Result<(), StateError> {
        self.ensure_open()?;
        self.progress = self.progress.max(progress.min(100));
        Ok(())
    }

    pub(crate) fn set_step(&mut self, step: impl Into<String>) -> Result<(), StateError> {
        self.ensure_open()?;
        self.current_step = step.into();
        Ok(())
    }

    pub(crate) fn push_output(&mut self, output: Output) -> Result<(), StateError> {
        self.ensure_open()?;
        self.outputs.push(output);
        Ok(())
    }

    /// Record the pending approval request; only legal in `AwaitingApproval`
    pub(crate) fn open_approval(
        &mut self,
        question: impl Into<String>,
        context: impl Into<String>,
    ) -> Result<(), StateError> {
        if self.stage != Stage::AwaitingApproval {
            return Err(StateError::IllegalTransition {
                from: self.stage,
                to: Stage::AwaitingApproval,
            });
        }
        self.approval = Some(Approval {
            question: question.into(),
            context: context.into(),
            decision: None,
            feedback: None,
            requested_at: Utc::now(),
            decided_at: None,
        });
        Ok(())
    }

    /// Record the single decision on the pending approval
    pub(crate) fn record_decision(
        &mut self,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<(), StateError> {
        self.ensure_open()?;
        let approval = self.approval.as_mut().ok_or(StateError::NoApproval)?;
        if approval.decision.is_some() {
            return Err(StateError::AlreadyDecided);
        }
        approval.decision = Some(decision);
        approval.feedback = feedback.filter(|f| !f.trim().is_empty());
        approval.decided_at = Some(Utc::now());
        Ok(())
    }

    /// Enter `Completed` with the result taken from the recorded decision
    pub(crate) fn complete(&mut self) -> Result<(), StateError> {
        let decision = self
            .approval
            .as_ref()
            .and_then(|a| a.decision)
            .ok_or(StateError::NoApproval)?;
        self.enter(Stage::Completed)?;
        self.result = Some(decision.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Enter `Failed`; progress is left where it was
    pub(crate) fn fail(&mut self, failure: RunFailure) -> Result<(), StateError> {
        self.enter(Stage::Failed)?;
        self.current_step = format!("Failed: {}", failure);
        self.result = Some(RunResult::Failed(failure));
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            document: self.document.clone(),
            stage: self.stage,
            progress: self.progress,
            current_step: self.current_step.clone(),
            outputs: self.outputs.clone(),
            approval: self.approval.clone(),
            result: self.result.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}
