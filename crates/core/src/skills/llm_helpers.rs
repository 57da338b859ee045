//! # LLM Helpers
//!
//! One place that turns a [`ModelConfig`](crate::models::ModelConfig) into a
//! structured `radkit` call, so skills only name their output type and prompt.

/// Run an `LlmFunction` producing `$output_type` against the configured provider.
///
/// Evaluates to `anyhow::Result<$output_type>`; failures carry the provider
/// and model in their context.
#[macro_export]
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use anyhow::Context as _;
        use radkit::agent::LlmFunction;
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config = $config;
        let input = $input;
        tracing::debug!(
            provider = config.provider.display_name(),
            model = %config.model,
            "Calling LLM"
        );

        let output: anyhow::Result<$output_type> = match config.provider {
            LlmProvider::Anthropic => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    AnthropicLlm::from_env(&config.model)?,
                    $system_prompt,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::OpenAI => {
                let llm = match &config.base_url {
                    Some(base_url) => OpenAILlm::from_env(&config.model)?.with_base_url(base_url),
                    None => OpenAILlm::from_env(&config.model)?,
                };
                LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt)
                    .run(input)
                    .await
                    .map_err(Into::into)
            }
            LlmProvider::Gemini => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    GeminiLlm::from_env(&config.model)?,
                    $system_prompt,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::OpenRouter => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    OpenRouterLlm::from_env(&config.model)?,
                    $system_prompt,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::Grok => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    GrokLlm::from_env(&config.model)?,
                    $system_prompt,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::DeepSeek => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    DeepSeekLlm::from_env(&config.model)?,
                    $system_prompt,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
        };

        output.with_context(|| {
            format!(
                "{} call with model '{}' failed",
                config.provider.display_name(),
                config.model
            )
        })
    }};
}

pub use run_llm_function;
