//! # Engine Configuration
//!
//! Knobs for a review run: analysis success policy, approval wording, event
//! delivery limits and model selection. Every field has a default so a
//! partially filled config file is enough.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{LlmProvider, ModelConfig};
use crate::workflow::analysis::SuccessPolicy;
use crate::workflow::events::{DEFAULT_QUEUE_CAPACITY, DEFAULT_REPLAY_WINDOW};

/// Question put to the reviewer when the report is ready
pub const DEFAULT_APPROVAL_QUESTION: &str =
    "Based on the analysis report above, should we approve this concept for development?";

/// Characters of the report shown alongside the approval question
pub const DEFAULT_APPROVAL_CONTEXT_LIMIT: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many analysts must succeed for the run to continue
    pub success_policy: SuccessPolicy,
    pub approval_question: String,
    /// Name used in rendered documents
    pub organization: String,
    /// Report characters included in the approval context (0 = whole report)
    pub approval_context_limit: usize,
    /// Bounded queue size per event subscriber
    pub event_queue_capacity: usize,
    /// Recent events replayed to new subscribers
    pub replay_window: usize,
    /// Global LLM provider
    pub global_provider: LlmProvider,
    /// Global model for every LLM-backed collaborator
    pub global_model: Option<String>,
    /// Base URL override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    /// Per-collaborator model overrides (e.g. "market_analyst" -> model)
    pub per_agent_models: HashMap<String, String>,
    /// Per-collaborator provider overrides
    pub per_agent_providers: HashMap<String, LlmProvider>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            success_policy: SuccessPolicy::default(),
            approval_question: DEFAULT_APPROVAL_QUESTION.to_string(),
            organization: "Verdict".to_string(),
            approval_context_limit: DEFAULT_APPROVAL_CONTEXT_LIMIT,
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_window: DEFAULT_REPLAY_WINDOW,
            global_provider: LlmProvider::default(),
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Resolve the model for one collaborator: per-agent override, then
    /// global, then the provider's default model
    pub fn model_config(&self, agent_id: &str) -> ModelConfig {
        let provider = self
            .per_agent_providers
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        let model = self
            .per_agent_models
            .get(agent_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.base_url.clone()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    /// Truncate the report for the approval prompt
    pub fn approval_context(&self, report: &str) -> String {
        let limit = self.approval_context_limit;
        if limit == 0 || report.chars().count() <= limit {
            return report.to_string();
        }
        let mut context: String = report.chars().take(limit).collect();
        context.push_str("...");
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "success_policy": "majority" }"#).unwrap();
        assert_eq!(config.success_policy, SuccessPolicy::Majority);
        assert_eq!(config.approval_context_limit, 2000);
        assert_eq!(config.replay_window, DEFAULT_REPLAY_WINDOW);
        assert!(config.approval_question.contains("approve this concept"));
    }

    #[test]
    fn test_model_resolution_order() {
        let mut config = EngineConfig {
            global_provider: LlmProvider::OpenAI,
            base_url: Some("http://localhost:8080/v1".into()),
            ..Default::default()
        };
        let resolved = config.model_config("market_analyst");
        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(resolved.base_url.as_deref(), Some("http://localhost:8080/v1"));

        config.global_model = Some("gpt-4o-mini".into());
        config
            .per_agent_providers
            .insert("report_writer".into(), LlmProvider::Anthropic);
        config
            .per_agent_models
            .insert("report_writer".into(), "claude-3-5-haiku-latest".into());

        assert_eq!(config.model_config("design_analyst").model, "gpt-4o-mini");
        let writer = config.model_config("report_writer");
        assert_eq!(writer.provider, LlmProvider::Anthropic);
        assert_eq!(writer.model, "claude-3-5-haiku-latest");
        assert!(writer.base_url.is_none());
    }

    #[test]
    fn test_approval_context_truncation() {
        let config = EngineConfig {
            approval_context_limit: 5,
            ..Default::default()
        };
        assert_eq!(config.approval_context("abc"), "abc");
        assert_eq!(config.approval_context("abcdefgh"), "abcde...");

        let unlimited = EngineConfig {
            approval_context_limit: 0,
            ..Default::default()
        };
        assert_eq!(unlimited.approval_context("abcdefgh"), "abcdefgh");
    }
}
