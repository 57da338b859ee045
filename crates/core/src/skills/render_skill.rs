//! # Render Skill (MarkdownRenderer)
//!
//! Produces the final document of a completed run: a development report
//! when the concept is approved, a notification to the submitter when it
//! is rejected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::state::Decision;
use crate::workflow::collaborators::{DocumentRenderer, FinalDocument, ParsedConcept};

/// Concept elements listed in the approved report
const MAX_LISTED_ELEMENTS: usize = 10;

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    organization: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new("Verdict")
    }
}

impl MarkdownRenderer {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }

    /// Render at an explicit time
    pub fn render_at(
        &self,
        decision: Decision,
        report: &str,
        feedback: Option<&str>,
        concept: &ParsedConcept,
        at: DateTime<Utc>,
    ) -> FinalDocument {
        let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
        let stamp = at.format("%Y%m%d_%H%M%S");
        match decision {
            Decision::Approve => FinalDocument {
                filename: format!("approved_concept_report_{}.md", stamp),
                title: format!("{} Concept Analysis Report", self.organization),
                content: self.approved_report(report, feedback, concept, at),
            },
            Decision::Reject => FinalDocument {
                filename: format!("concept_rejection_{}.md", stamp),
                title: format!("{} Concept Review - Decision Notification", self.organization),
                content: self.rejection_notice(report, feedback, concept, at),
            },
        }
    }

    fn approved_report(
        &self,
        report: &str,
        feedback: Option<&str>,
        concept: &ParsedConcept,
        at: DateTime<Utc>,
    ) -> String {
        let org = &self.organization;
        let mut out = String::new();
        let _ = writeln!(out, "# {} Concept Analysis Report", org);
        let _ = writeln!(out, "## Status: APPROVED FOR DEVELOPMENT\n");
        let _ = writeln!(out, "**Report Generated:** {}", at.format("%B %d, %Y at %H:%M UTC"));
        let _ = writeln!(out, "**Concept File:** {}", concept.document);
        if let Some(title) = concept.title() {
            let _ = writeln!(out, "**Concept:** {}", title);
        }
        let _ = writeln!(out, "\n---\n\n## Decision\n");
        let _ = writeln!(
            out,
            "This concept has been **APPROVED** for development by the {} review board.",
            org
        );
        if let Some(notes) = feedback {
            let _ = writeln!(out, "\n**Reviewer Notes:** {}", notes);
        }

        let _ = writeln!(out, "\n---\n\n## Concept Overview\n");
        let _ = writeln!(out, "**Slides:** {}", concept.total_slides());
        let elements: Vec<&str> = concept.concept_elements().collect();
        let _ = writeln!(out, "**Concept Elements Identified:** {}\n", elements.len());
        let _ = writeln!(out, "### Key Elements");
        if elements.is_empty() {
            let _ = writeln!(out, "- No specific concept elements identified");
        }
        for (i, element) in elements.iter().take(MAX_LISTED_ELEMENTS).enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, element.replace('\n', " "));
        }

        let _ = writeln!(out, "\n---\n\n# Analysis Report\n\n{}", report.trim());

        let _ = writeln!(out, "\n---\n\n## Next Steps\n");
        let _ = writeln!(out, "1. **Design refinement**: technical sketches, final palette and materials, size range.");
        let _ = writeln!(out, "2. **Prototyping**: source fabrics, produce samples, run fit and wear tests.");
        let _ = writeln!(out, "3. **Market validation**: customer sessions, competitor check, pricing confirmation.");
        let _ = writeln!(out, "4. **Production planning**: manufacturing partner, quality standards, first-run quantities.");

        let _ = writeln!(out, "\n---\n\n## Approval Details\n");
        let _ = writeln!(out, "**Decision Date:** {}", at.format("%B %d, %Y"));
        let _ = writeln!(out, "**Decision Status:** APPROVED");
        let _ = writeln!(out, "**Approved by:** {} Review Board", org);
        let _ = writeln!(out, "\n*Generated by the {} concept review system. Internal use only.*", org);
        out
    }

    fn rejection_notice(
        &self,
        report: &str,
        feedback: Option<&str>,
        concept: &ParsedConcept,
        at: DateTime<Utc>,
    ) -> String {
        let org = &self.organization;
        let mut out = String::new();
        let _ = writeln!(out, "# {} Concept Review - Decision Notification\n", org);
        let _ = writeln!(out, "**Date:** {}", at.format("%B %d, %Y"));
        let _ = writeln!(out, "**Subject:** Re: Concept Submission - {}", concept.document);
        let _ = writeln!(out, "\n---\n\nDear Concept Designer,\n");
        let _ = writeln!(
            out,
            "Thank you for submitting your concept to {}. Our review team has evaluated it \
             against our current priorities, market positioning and production capabilities.",
            org
        );
        let _ = writeln!(out, "\n## Review Decision: Not Selected for Development\n");
        let _ = writeln!(
            out,
            "We have decided not to move forward with this concept at this time. This reflects \
             our current business needs rather than the creativity of your work."
        );

        let _ = writeln!(out, "\n## Feedback\n");
        match feedback {
            Some(notes) => {
                let _ = writeln!(out, "{}", notes);
            }
            None => {
                let _ = writeln!(
                    out,
                    "We encourage you to keep developing the concept with current trends and \
                     customer demand in mind."
                );
            }
        }

        let _ = writeln!(out, "\n## Summary of Our Analysis\n\n{}", report.trim());

        let _ = writeln!(out, "\n## Strengthening Future Submissions\n");
        let _ = writeln!(out, "- Show clear alignment with the {} brand aesthetic", org);
        let _ = writeln!(out, "- Include technical specifications and material choices");
        let _ = writeln!(out, "- Demonstrate the target customer and competitive positioning");
        let _ = writeln!(out, "- Outline production timeline and cost considerations");

        let _ = writeln!(out, "\nBest regards,\n\n**{} Design Review Team**", org);
        out
    }
}

#[async_trait]
impl DocumentRenderer for MarkdownRenderer {
    async fn render(
        &self,
        decision: Decision,
        report: &str,
        feedback: Option<&str>,
        concept: &ParsedConcept,
    ) -> anyhow::Result<FinalDocument> {
        Ok(self.render_at(decision, report, feedback, concept, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::collaborators::Slide;
    use chrono::TimeZone;

    fn concept() -> ParsedConcept {
        ParsedConcept {
            document: "linen.md".into(),
            slides: vec![Slide {
                number: 1,
                texts: vec!["# Coastal Linen".into(), "Washed linen fabric".into()],
                concept_elements: vec!["Washed linen fabric".into()],
            }],
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_approved_report() {
        let renderer = MarkdownRenderer::new("Acme");
        let doc = renderer.render_at(
            Decision::Approve,
            "## Executive Summary\n\nGo.",
            Some("Prioritise the shirt"),
            &concept(),
            at(),
        );
        assert_eq!(doc.filename, "approved_concept_report_20250314_093000.md");
        assert!(doc.content.contains("APPROVED FOR DEVELOPMENT"));
        assert!(doc.content.contains("**Concept:** Coastal Linen"));
        assert!(doc.content.contains("**Reviewer Notes:** Prioritise the shirt"));
        assert!(doc.content.contains("1. Washed linen fabric"));
        assert!(doc.content.contains("Go."));
    }

    #[test]
    fn test_rejection_notice() {
        let renderer = MarkdownRenderer::default();
        let doc = renderer.render_at(Decision::Reject, "Weak demand.", Some("  "), &concept(), at());
        assert_eq!(doc.filename, "concept_rejection_20250314_093000.md");
        assert!(doc.content.contains("Not Selected for Development"));
        assert!(doc.content.contains("Re: Concept Submission - linen.md"));
        // blank feedback falls back to the default paragraph
        assert!(doc.content.contains("We encourage you"));
        assert!(doc.content.contains("Weak demand."));
        assert!(doc.title.starts_with("Verdict"));
    }
}
