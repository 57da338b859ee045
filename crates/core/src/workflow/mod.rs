//! # Review Workflow
//!
//! Sequences a concept review from submitted document to human decision.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Document → Parser → Preparer → Analysts (concurrent) → Report → Human Approval → Final Document
//! ```

pub mod analysis;
pub mod approval;
pub mod collaborators;
pub mod coordinator;
pub mod events;
pub mod pipeline;
pub mod sequencer;

pub use analysis::{AnalysisSummary, AnalysisTask, AnalysisTaskSet, SuccessPolicy, TaskStatus};
pub use approval::{ApprovalGate, GateOutcome};
pub use collaborators::{
    AnalysisContext, Analyst, Collaborators, ConceptPreparer, Document, DocumentParser,
    DocumentRenderer, FinalDocument, ParsedConcept, ReportSynthesizer, Slide,
};
pub use coordinator::Coordinator;
pub use events::{EventBus, EventEnvelope, EventSubscription, SubscriberId, WorkflowEvent};
pub use pipeline::Stage;
pub use sequencer::StageSequencer;
