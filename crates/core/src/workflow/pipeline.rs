//! # Pipeline Stages
//!
//! Defines the stages of the review pipeline and the fixed progress schedule.

use serde::{Deserialize, Serialize};

/// Progress reported when the analysis stage starts.
pub const ANALYSIS_START_PROGRESS: u8 = 45;
/// Progress reported once every analyst has settled.
pub const ANALYSIS_END_PROGRESS: u8 = 75;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Run created, nothing started yet
    Ready,
    /// Extracting slides from the submitted document
    Parsing,
    /// Building the analysis brief
    Preparing,
    /// Analysts running concurrently
    Analyzing,
    /// Writing the consolidated report
    Synthesizing,
    /// Parked on the approval gate
    AwaitingApproval,
    /// Decision recorded, final document rendered
    Completed,
    /// Terminated by an error or a cancellation
    Failed,
}

impl Stage {
    /// Forward order of the non-failure stages
    pub const FORWARD: [Stage; 7] = [
        Stage::Ready,
        Stage::Parsing,
        Stage::Preparing,
        Stage::Analyzing,
        Stage::Synthesizing,
        Stage::AwaitingApproval,
        Stage::Completed,
    ];

    /// The stage that follows this one on the happy path
    pub fn next(self) -> Stage {
        match self {
            Stage::Ready => Stage::Parsing,
            Stage::Parsing => Stage::Preparing,
            Stage::Preparing => Stage::Analyzing,
            Stage::Analyzing => Stage::Synthesizing,
            Stage::Synthesizing => Stage::AwaitingApproval,
            Stage::AwaitingApproval => Stage::Completed,
            Stage::Completed => Stage::Completed,
            Stage::Failed => Stage::Failed,
        }
    }

    /// Progress percentage reported on entering the stage.
    ///
    /// `Analyzing` reports its starting value here; it rises towards
    /// [`ANALYSIS_END_PROGRESS`] as analysts settle. `Failed` keeps whatever
    /// progress the run had, so it has no target of its own.
    pub fn progress_target(self) -> Option<u8> {
        match self {
            Stage::Ready => Some(0),
            Stage::Parsing => Some(15),
            Stage::Preparing => Some(30),
            Stage::Analyzing => Some(ANALYSIS_START_PROGRESS),
            Stage::Synthesizing => Some(90),
            Stage::AwaitingApproval => Some(95),
            Stage::Completed => Some(100),
            Stage::Failed => None,
        }
    }

    /// Step label shown to observers
    pub fn step_label(self) -> &'static str {
        match self {
            Stage::Ready => "Ready to review concepts",
            Stage::Parsing => "Parse Concept",
            Stage::Preparing => "Prepare Analysis",
            Stage::Analyzing => "Concept Analysis",
            Stage::Synthesizing => "Generate Analysis Report",
            Stage::AwaitingApproval => "Human Review",
            Stage::Completed => "Save Results",
            Stage::Failed => "Failed",
        }
    }

    /// Check if the stage ends the run
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// Only single forward steps are allowed, plus `Failed` from any
    /// non-terminal stage.
    pub fn can_transition_to(self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Stage::Failed || to == self.next()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Ready => "ready",
            Stage::Parsing => "parsing",
            Stage::Preparing => "preparing",
            Stage::Analyzing => "analyzing",
            Stage::Synthesizing => "synthesizing",
            Stage::AwaitingApproval => "awaiting_approval",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress while analysts settle: linear between the analysis bounds.
pub fn analysis_progress(settled: usize, total: usize) -> u8 {
    if total == 0 {
        return ANALYSIS_END_PROGRESS;
    }
    let span = (ANALYSIS_END_PROGRESS - ANALYSIS_START_PROGRESS) as usize;
    let settled = settled.min(total);
    ANALYSIS_START_PROGRESS + (span * settled / total) as u8
}
