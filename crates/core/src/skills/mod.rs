//! # Verdict Skills
//!
//! Default collaborators for the review workflow.
//!
//! ## Pipeline Roles
//!
//! - `OutlineParser` - Split a pitch outline into slides and concept elements
//! - `BriefPreparer` - Sort slide content into the shared analysis brief
//! - `AnalystSkill` - LLM analyst (market, design or production)
//! - `ReportSkill` - LLM report writer consolidating analyst outputs
//! - `MarkdownRenderer` - Approved report or rejection notice

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::workflow::collaborators::{Analyst, Collaborators};

pub mod llm_helpers;
pub mod prompts;

pub mod analyst_skill;
pub mod brief_skill;
pub mod parse_skill;
pub mod render_skill;
pub mod report_skill;

pub use analyst_skill::{AnalystOutput, AnalystRole, AnalystSkill};
pub use brief_skill::{BriefPreparer, ConceptBrief};
pub use parse_skill::OutlineParser;
pub use render_skill::MarkdownRenderer;
pub use report_skill::{ConceptReport, ReportSkill};

/// Agent id used for the report writer's model override
pub const REPORT_WRITER_ID: &str = "report_writer";

/// Wire the default collaborators, resolving each model from `config`
pub fn default_collaborators(config: &EngineConfig) -> Collaborators {
    let analysts: Vec<Arc<dyn Analyst>> = AnalystRole::ALL
        .iter()
        .map(|&role| {
            Arc::new(AnalystSkill::new(role, config.model_config(role.agent_id())))
                as Arc<dyn Analyst>
        })
        .collect();

    Collaborators {
        parser: Arc::new(OutlineParser::new()),
        preparer: Arc::new(BriefPreparer::new()),
        analysts,
        synthesizer: Arc::new(ReportSkill::new(config.model_config(REPORT_WRITER_ID))),
        renderer: Arc::new(MarkdownRenderer::new(config.organization.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collaborators() {
        let collaborators = default_collaborators(&EngineConfig::default());
        let names: Vec<&str> = collaborators.analysts.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["market_analyst", "design_analyst", "production_analyst"]
        );
    }
}
