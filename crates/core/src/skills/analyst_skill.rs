//! # Analyst Skill
//!
//! LLM-backed analyst. One struct covers the three review perspectives;
//! the role picks the system prompt and the output source name.

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::skills::prompts;
use crate::workflow::collaborators::{AnalysisContext, Analyst};

/// Review perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRole {
    Market,
    Design,
    Production,
}

impl AnalystRole {
    pub const ALL: [AnalystRole; 3] = [
        AnalystRole::Market,
        AnalystRole::Design,
        AnalystRole::Production,
    ];

    /// Identifier used for outputs and per-agent model overrides
    pub fn agent_id(self) -> &'static str {
        match self {
            AnalystRole::Market => "market_analyst",
            AnalystRole::Design => "design_analyst",
            AnalystRole::Production => "production_analyst",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            AnalystRole::Market => "Market Analysis",
            AnalystRole::Design => "Design Evaluation",
            AnalystRole::Production => "Production Assessment",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            AnalystRole::Market => prompts::MARKET_ANALYST,
            AnalystRole::Design => prompts::DESIGN_ANALYST,
            AnalystRole::Production => prompts::PRODUCTION_ANALYST,
        }
    }
}

/// Structured analyst answer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct AnalystOutput {
    /// The analysis itself, markdown
    pub assessment: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    /// "pursue", "pursue with changes" or "do not pursue", plus rationale
    pub recommendation: String,
}

impl AnalystOutput {
    /// Markdown section for this analyst's output
    pub fn to_markdown(&self, role: AnalystRole) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## {}", role.heading());
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.assessment.trim());
        bullets(&mut out, "Strengths", &self.strengths);
        bullets(&mut out, "Risks", &self.risks);
        let _ = writeln!(out);
        let _ = write!(out, "**Recommendation:** {}", self.recommendation.trim());
        out
    }
}

fn bullets(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "### {}", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

pub struct AnalystSkill {
    role: AnalystRole,
    config: ModelConfig,
}

impl AnalystSkill {
    pub fn new(role: AnalystRole, config: ModelConfig) -> Self {
        Self { role, config }
    }

    pub fn role(&self) -> AnalystRole {
        self.role
    }

    /// SDK-style call: analyze a brief from one perspective.
    pub async fn run(
        role: AnalystRole,
        brief: &str,
        config: &ModelConfig,
    ) -> anyhow::Result<AnalystOutput> {
        let prompt = format!("Analysis brief:\n\n{}", brief);
        run_llm_function!(config, AnalystOutput, role.system_prompt(), prompt)
    }
}

#[async_trait]
impl Analyst for AnalystSkill {
    fn name(&self) -> &str {
        self.role.agent_id()
    }

    async fn analyze(&self, context: &AnalysisContext) -> anyhow::Result<String> {
        let output = Self::run(self.role, &context.brief, &self.config).await?;
        Ok(output.to_markdown(self.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_distinct() {
        let ids: Vec<&str> = AnalystRole::ALL.iter().map(|r| r.agent_id()).collect();
        assert_eq!(ids, vec!["market_analyst", "design_analyst", "production_analyst"]);
        assert_ne!(
            AnalystRole::Market.system_prompt(),
            AnalystRole::Design.system_prompt()
        );
    }

    #[test]
    fn test_markdown_rendering() {
        let output = AnalystOutput {
            assessment: "Strong fit with the resort-wear trend.".into(),
            strengths: vec!["Clear customer".into()],
            risks: vec![],
            recommendation: "pursue".into(),
        };
        let text = output.to_markdown(AnalystRole::Market);
        assert!(text.starts_with("## Market Analysis"));
        assert!(text.contains("### Strengths\n- Clear customer"));
        assert!(!text.contains("### Risks"));
        assert!(text.ends_with("**Recommendation:** pursue"));
    }

    #[test]
    fn test_skill_name_matches_role() {
        let skill = AnalystSkill::new(AnalystRole::Production, ModelConfig::default());
        assert_eq!(skill.name(), "production_analyst");
        assert_eq!(skill.role(), AnalystRole::Production);
    }
}
