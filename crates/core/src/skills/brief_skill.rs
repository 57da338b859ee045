//! # Brief Skill (BriefPreparer)
//!
//! Sorts slide content into market signals and production notes and renders
//! the brief every analyst receives.

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::workflow::collaborators::{AnalysisContext, ConceptPreparer, ParsedConcept};

pub const MARKET_KEYWORDS: &[&str] = &[
    "target",
    "audience",
    "market",
    "customer",
    "demographic",
    "price",
    "competitor",
    "trend",
    "season",
];

pub const PRODUCTION_KEYWORDS: &[&str] = &[
    "fabric",
    "material",
    "manufacturing",
    "cost",
    "supplier",
    "production",
    "quality",
    "sizes",
    "fit",
];

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Slide content sorted by what it talks about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptBrief {
    pub document: String,
    pub total_slides: usize,
    pub concept_elements: usize,
    /// (slide number, joined slide text)
    pub design_content: Vec<(usize, String)>,
    pub market_signals: Vec<String>,
    pub production_notes: Vec<String>,
}

impl ConceptBrief {
    pub fn from_concept(concept: &ParsedConcept) -> Self {
        let mut brief = ConceptBrief {
            document: concept.document.clone(),
            total_slides: concept.total_slides(),
            concept_elements: concept.concept_elements().count(),
            ..Default::default()
        };

        for slide in &concept.slides {
            let text = slide.texts.join(" ");
            if text.trim().is_empty() {
                continue;
            }
            if mentions_any(&text, MARKET_KEYWORDS) {
                brief.market_signals.push(text.clone());
            }
            if mentions_any(&text, PRODUCTION_KEYWORDS) {
                brief.production_notes.push(text.clone());
            }
            brief.design_content.push((slide.number, text));
        }
        brief
    }

    /// Render as the prompt text shared by all analysts
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CONCEPT ANALYSIS REQUEST");
        let _ = writeln!(out);
        let _ = writeln!(out, "Concept file: {}", self.document);
        let _ = writeln!(out, "Total slides: {}", self.total_slides);
        let _ = writeln!(out, "Concept elements: {}", self.concept_elements);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Concept content");
        for (number, text) in &self.design_content {
            let _ = writeln!(out, "- Slide {}: {}", number, text);
        }
        section(&mut out, "Market signals", &self.market_signals);
        section(&mut out, "Production notes", &self.production_notes);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Assess market potential, design merit, production feasibility, brand fit and \
             competitive differentiation. Focus on what decides whether this concept should \
             be approved for development."
        );
        out
    }
}

fn section(out: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "## {}", heading);
    if items.is_empty() {
        let _ = writeln!(out, "- (none identified)");
    }
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BriefPreparer;

impl BriefPreparer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConceptPreparer for BriefPreparer {
    async fn prepare(&self, concept: &ParsedConcept) -> anyhow::Result<AnalysisContext> {
        let brief = ConceptBrief::from_concept(concept);
        if brief.design_content.is_empty() {
            bail!("'{}' has no slide content to analyze", concept.document);
        }
        tracing::debug!(
            slides = brief.design_content.len(),
            market_signals = brief.market_signals.len(),
            production_notes = brief.production_notes.len(),
            "Prepared analysis brief"
        );
        Ok(AnalysisContext {
            document: concept.document.clone(),
            brief: brief.render(),
        })
    }
}
