//! # Verdict Core
//!
//! The engine behind Verdict concept reviews: stage sequencing, concurrent
//! analysis, the human approval gate and ordered event fan-out.
//!
//! ## Architecture
//!
//! - `workflow/` - Coordinator, stage sequencer, analysis task set, approval gate, event bus
//! - `state/` - Run state and the records it collects
//! - `skills/` - Default collaborators (outline parser, brief preparer, LLM analysts, renderer)
//! - `models` - LLM provider configuration
//! - `config` - Engine configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verdict_core::config::EngineConfig;
//! use verdict_core::skills::default_collaborators;
//! use verdict_core::state::Decision;
//! use verdict_core::workflow::{Coordinator, Document};
//!
//! let config = EngineConfig::default();
//! let coordinator = Coordinator::new(config.clone(), default_collaborators(&config));
//! let mut events = coordinator.subscribe();
//! coordinator.start_run(Document::new("pitch.md", text)).await?;
//! // ... wait for an approval_request event ...
//! coordinator.submit_approval(Decision::Approve, Some("Go".into())).await?;
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod skills;
pub mod state;
pub mod workflow;

pub use error::{ControlError, RunFailure};
