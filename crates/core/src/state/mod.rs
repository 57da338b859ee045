pub mod run;

pub use run::{
    Approval, Decision, DecisionParseError, Output, OutputKind, Run, RunId, RunResult,
    RunSnapshot, StateError,
};
