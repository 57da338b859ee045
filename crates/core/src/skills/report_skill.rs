//! # Report Skill
//!
//! Consolidates the analysts' outputs into the report the reviewer decides on.

use anyhow::bail;
use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::skills::prompts::REPORT_WRITER;
use crate::state::{Output, OutputKind};
use crate::workflow::collaborators::ReportSynthesizer;

/// Structured report returned by the model
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ConceptReport {
    pub executive_summary: String,
    /// "approve", "approve with modifications" or "reject", plus rationale
    pub recommendation: String,
    pub market_analysis: String,
    pub design_assessment: String,
    pub production_evaluation: String,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl ConceptReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Executive Summary\n\n{}", self.executive_summary.trim());
        let _ = writeln!(out, "\n**Recommendation:** {}", self.recommendation.trim());
        let _ = writeln!(out, "\n## Market Analysis\n\n{}", self.market_analysis.trim());
        let _ = writeln!(out, "\n## Design Assessment\n\n{}", self.design_assessment.trim());
        let _ = writeln!(
            out,
            "\n## Production Evaluation\n\n{}",
            self.production_evaluation.trim()
        );
        list(&mut out, "Risks", &self.risks);
        list(&mut out, "Next Steps", &self.next_steps);
        out.trim_end().to_string()
    }
}

fn list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n## {}\n", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Build the model input from the collected outputs.
///
/// Fails when no analyst produced a result; failed analysts are listed as
/// unavailable so the report can say which perspective is missing.
pub fn synthesis_input(outputs: &[Output]) -> anyhow::Result<String> {
    let results: Vec<&Output> = outputs
        .iter()
        .filter(|o| o.kind == OutputKind::AgentResult)
        .collect();
    if results.is_empty() {
        bail!("No analysis results to synthesize");
    }

    let mut input = String::from("Analyst sections:\n");
    for output in results {
        let _ = write!(input, "\n### {}\n\n{}\n", output.source, output.content.trim());
    }
    for output in outputs.iter().filter(|o| o.kind == OutputKind::Error) {
        let _ = write!(input, "\n### {} (unavailable)\n\n{}\n", output.source, output.content);
    }
    Ok(input)
}

pub struct ReportSkill {
    config: ModelConfig,
}

impl ReportSkill {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// SDK-style call: write the consolidated report.
    pub async fn run(outputs: &[Output], config: &ModelConfig) -> anyhow::Result<ConceptReport> {
        let input = synthesis_input(outputs)?;
        run_llm_function!(config, ConceptReport, REPORT_WRITER, input)
    }
}

#[async_trait]
impl ReportSynthesizer for ReportSkill {
    async fn synthesize(&self, outputs: &[Output]) -> anyhow::Result<String> {
        let report = Self::run(outputs, &self.config).await?;
        Ok(report.to_markdown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_lists_results_and_gaps() {
        let outputs = vec![
            Output::agent_result("market_analyst", "Demand is strong."),
            Output::error("design_analyst", "design_analyst failed: timeout"),
            Output::agent_result("production_analyst", "Feasible at volume."),
        ];
        let input = synthesis_input(&outputs).unwrap();
        assert!(input.contains("### market_analyst\n\nDemand is strong."));
        assert!(input.contains("### design_analyst (unavailable)"));
        assert!(input.find("production_analyst").unwrap() < input.find("unavailable").unwrap());
    }

    #[test]
    fn test_input_requires_a_result() {
        let outputs = vec![Output::error("market_analyst", "failed")];
        assert!(synthesis_input(&outputs).is_err());
        assert!(synthesis_input(&[]).is_err());
    }

    #[test]
    fn test_report_markdown() {
        let report = ConceptReport {
            executive_summary: "Approve with minor changes.".into(),
            recommendation: "approve with modifications".into(),
            market_analysis: "Good timing.".into(),
            design_assessment: "Distinctive.".into(),
            production_evaluation: "Standard construction.".into(),
            risks: vec!["Linen supply".into()],
            next_steps: vec![],
        };
        let text = report.to_markdown();
        assert!(text.starts_with("## Executive Summary"));
        assert!(text.contains("## Risks\n\n- Linen supply"));
        assert!(!text.contains("Next Steps"));
    }
}
