//! # Persisted Configuration
//!
//! Optional overrides stored in `.verdict/config.json`. Every field may be
//! absent; present fields are merged onto [`EngineConfig::default`].

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use verdict_core::config::EngineConfig;
use verdict_core::models::LlmProvider;
use verdict_core::workflow::SuccessPolicy;

pub const DEFAULT_CONFIG_PATH: &str = ".verdict/config.json";
pub const DEFAULT_REPORTS_DIR: &str = "reports";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    /// "at_least_one", "majority" or "all"
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub success_policy: Option<SuccessPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_context_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Applied at startup only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_queue_capacity: Option<usize>,
    /// Applied at startup only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Where final documents are written
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub reports_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
}

impl PersistedConfig {
    /// Load from `path`; a missing file yields the empty config
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Overlay the fields set in `other`
    pub fn merge(&mut self, other: PersistedConfig) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.success_policy, other.success_policy);
        take(&mut self.approval_question, other.approval_question);
        take(&mut self.approval_context_limit, other.approval_context_limit);
        take(&mut self.organization, other.organization);
        take(&mut self.event_queue_capacity, other.event_queue_capacity);
        take(&mut self.replay_window, other.replay_window);
        take(&mut self.global_provider, other.global_provider);
        take(&mut self.global_model, other.global_model);
        take(&mut self.base_url, other.base_url);
        take(&mut self.reports_dir, other.reports_dir);
        self.per_agent_providers.extend(other.per_agent_providers);
        self.per_agent_models.extend(other.per_agent_models);
    }

    /// Resolve onto the engine defaults, rejecting unknown provider names
    pub fn to_engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(policy) = self.success_policy {
            config.success_policy = policy;
        }
        if let Some(question) = self.approval_question.as_ref().filter(|q| !q.trim().is_empty()) {
            config.approval_question = question.clone();
        }
        if let Some(limit) = self.approval_context_limit {
            config.approval_context_limit = limit;
        }
        if let Some(org) = &self.organization {
            config.organization = org.clone();
        }
        if let Some(capacity) = self.event_queue_capacity {
            if capacity == 0 {
                bail!("event_queue_capacity must be at least 1");
            }
            config.event_queue_capacity = capacity;
        }
        if let Some(window) = self.replay_window {
            config.replay_window = window;
        }
        if let Some(name) = &self.global_provider {
            config.global_provider = parse_provider(name)?;
        }
        config.global_model = self.global_model.clone();
        config.base_url = self.base_url.clone();

        for (agent, name) in &self.per_agent_providers {
            config
                .per_agent_providers
                .insert(agent.clone(), parse_provider(name)?);
        }
        config.per_agent_models = self.per_agent_models.clone();

        Ok(config)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.reports_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR))
    }
}

fn parse_provider(name: &str) -> anyhow::Result<LlmProvider> {
    LlmProvider::from_name(name).with_context(|| format!("Unknown LLM provider '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistedConfig::load(&dir.path().join("config.json"))
            .await
            .unwrap();
        assert_eq!(config, PersistedConfig::default());
        assert_eq!(config.reports_dir(), PathBuf::from("reports"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".verdict").join("config.json");

        let mut config = PersistedConfig::default();
        config.success_policy = Some(SuccessPolicy::Majority);
        config
            .per_agent_models
            .insert("report_writer".into(), "gpt-4o-mini".into());
        config.save(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"majority\""));
        // unset fields are not written
        assert!(!raw.contains("global_provider"));

        let loaded = PersistedConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = PersistedConfig::load(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config file"));
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base = PersistedConfig {
            global_provider: Some("openai".into()),
            approval_context_limit: Some(500),
            ..Default::default()
        };
        base.per_agent_models
            .insert("market_analyst".into(), "gpt-4o".into());

        let mut update = PersistedConfig {
            approval_context_limit: Some(0),
            ..Default::default()
        };
        update
            .per_agent_models
            .insert("design_analyst".into(), "gpt-4o-mini".into());
        base.merge(update);

        assert_eq!(base.global_provider.as_deref(), Some("openai"));
        assert_eq!(base.approval_context_limit, Some(0));
        assert_eq!(base.per_agent_models.len(), 2);
    }

    #[test]
    fn test_to_engine_config() {
        let mut persisted = PersistedConfig {
            success_policy: Some(SuccessPolicy::All),
            global_provider: Some("claude".into()),
            approval_question: Some("   ".into()),
            ..Default::default()
        };
        persisted
            .per_agent_providers
            .insert("report_writer".into(), "openai".into());

        let config = persisted.to_engine_config().unwrap();
        assert_eq!(config.success_policy, SuccessPolicy::All);
        assert_eq!(config.global_provider, LlmProvider::Anthropic);
        assert_eq!(
            config.per_agent_providers.get("report_writer"),
            Some(&LlmProvider::OpenAI)
        );
        // blank question keeps the default wording
        assert!(config.approval_question.contains("approve this concept"));

        persisted.global_provider = Some("mistral".into());
        assert!(persisted.to_engine_config().is_err());
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let persisted = PersistedConfig {
            event_queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(persisted.to_engine_config().is_err());
    }
}
