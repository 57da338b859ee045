//! # Collaborators
//!
//! The seams between the engine and the work it sequences. The engine only
//! sees these traits; default implementations live in `crate::skills`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::{Decision, Output};

/// A submitted pitch document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File name as uploaded
    pub name: String,
    /// Raw text content
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One slide (or section) of the pitch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based position in the document
    pub number: usize,
    /// Text blocks in reading order
    pub texts: Vec<String>,
    /// Blocks mentioning concept keywords
    pub concept_elements: Vec<String>,
}

/// Structured content extracted from a pitch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedConcept {
    pub document: String,
    pub slides: Vec<Slide>,
}

impl ParsedConcept {
    pub fn total_slides(&self) -> usize {
        self.slides.len()
    }

    /// All concept elements across slides
    pub fn concept_elements(&self) -> impl Iterator<Item = &str> {
        self.slides
            .iter()
            .flat_map(|s| s.concept_elements.iter().map(String::as_str))
    }

    /// First non-empty line of the outline, usually the concept title
    pub fn title(&self) -> Option<&str> {
        self.slides
            .iter()
            .flat_map(|s| s.texts.iter())
            .flat_map(|t| t.lines())
            .map(|line| line.trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
    }
}

/// What every analyst receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub document: String,
    /// Prepared analysis brief
    pub brief: String,
}

/// The rendered deliverable of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalDocument {
    /// Suggested file name, e.g. `approved_concept_report_20250101_120000.md`
    pub filename: String,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, document: &Document) -> anyhow::Result<ParsedConcept>;
}

#[async_trait]
pub trait ConceptPreparer: Send + Sync {
    async fn prepare(&self, concept: &ParsedConcept) -> anyhow::Result<AnalysisContext>;
}

/// One independent analysis perspective
#[async_trait]
pub trait Analyst: Send + Sync {
    /// Name used as the source of this analyst's outputs
    fn name(&self) -> &str;

    async fn analyze(&self, context: &AnalysisContext) -> anyhow::Result<String>;
}

#[async_trait]
pub trait ReportSynthesizer: Send + Sync {
    /// Consolidate the collected outputs into a single report
    async fn synthesize(&self, outputs: &[Output]) -> anyhow::Result<String>;
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        decision: Decision,
        report: &str,
        feedback: Option<&str>,
        concept: &ParsedConcept,
    ) -> anyhow::Result<FinalDocument>;
}

/// Everything a run needs, shared between runs
#[derive(Clone)]
pub struct Collaborators {
    pub parser: Arc<dyn DocumentParser>,
    pub preparer: Arc<dyn ConceptPreparer>,
    pub analysts: Vec<Arc<dyn Analyst>>,
    pub synthesizer: Arc<dyn ReportSynthesizer>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let analysts: Vec<&str> = self.analysts.iter().map(|a| a.name()).collect();
        f.debug_struct("Collaborators")
            .field("analysts", &analysts)
            .finish_non_exhaustive()
    }
}
