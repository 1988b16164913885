//! Concrete [`LlmProvider`](crate::llm::LlmProvider) implementations.

pub mod openai;

pub use openai::*;

use crate::config::{ConfigError, LlmSection};
use crate::llm::provider::LlmProvider;
use std::sync::Arc;
use std::time::Duration;

/// Build the provider named in the `[llm]` section, resolving its API key from the environment
pub fn create_provider(llm: &LlmSection) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    match llm.provider.as_str() {
        "openai" => {
            let api_key = llm.resolve_api_key()?;
            let config = OpenAiConfig {
                api_key,
                base_url: llm.base_url.clone(),
                timeout: Duration::from_secs(llm.timeout_secs),
            };
            let provider =
                OpenAiProvider::new(config).map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
            Ok(Arc::new(provider))
        }
        other => Err(ConfigError::InvalidConfig(format!(
            "Unsupported LLM provider: {other}"
        ))),
    }
}
