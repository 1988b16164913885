//! Capability adapter
//!
//! The single boundary through which agents reach the outside world: one
//! completion capability and the tool capabilities. Every call is a single
//! attempt; nothing here retries.

use crate::config::LlmSection;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Message};
use crate::tools::{ToolDescription, ToolError, ToolHandle, ToolSystem};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Model parameters applied to every completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl From<&LlmSection> for CompletionSettings {
    fn from(llm: &LlmSection) -> Self {
        Self {
            model: llm.model.clone(),
            max_tokens: Some(llm.max_tokens),
            temperature: Some(llm.temperature),
        }
    }
}

/// Completion plus tool invocation, as seen from inside an agent
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// One completion call. `messages` carries the role context as its system message.
    async fn invoke_completion(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDescription>,
    ) -> Result<CompletionResponse, LlmError>;

    /// Invoke a tool and return its output as text; blank output is an error
    async fn invoke_tool(&self, tool: ToolHandle, args: &Value) -> Result<String, ToolError>;

    /// Descriptions of the given tools that are actually available
    fn describe_tools(&self, tools: &BTreeSet<ToolHandle>) -> Vec<ToolDescription>;

    /// Verify the completion capability is reachable before any work starts
    async fn preflight(&self) -> Result<(), LlmError>;

    async fn search(&self, query: &str, num_results: usize) -> Result<String, ToolError> {
        self.invoke_tool(
            ToolHandle::WebSearch,
            &json!({"query": query, "num_results": num_results}),
        )
        .await
    }

    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        self.invoke_tool(ToolHandle::ScrapeWebsite, &json!({"url": url}))
            .await
    }
}

/// Adapter over a concrete [`LlmProvider`] and [`ToolSystem`]
pub struct ProviderAdapter {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolSystem>,
    settings: CompletionSettings,
}

impl ProviderAdapter {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolSystem>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }
}

/// Render a tool's JSON output as prompt text
pub fn render_tool_output(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[async_trait]
impl CapabilityAdapter for ProviderAdapter {
    async fn invoke_completion(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDescription>,
    ) -> Result<CompletionResponse, LlmError> {
        let request = CompletionRequest {
            messages,
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };
        self.provider.complete(request).await
    }

    async fn invoke_tool(&self, tool: ToolHandle, args: &Value) -> Result<String, ToolError> {
        let span = crate::tool_span!(tool = %tool);
        async {
            debug!(args = %args, "Invoking tool");
            let output = self.tools.execute_tool(tool.name(), args).await?;
            let text = render_tool_output(&output);
            if text.trim().is_empty() {
                return Err(ToolError::EmptyResult(tool.name().to_string()));
            }
            debug!(chars = text.len(), "Tool returned");
            Ok(text)
        }
        .instrument(span)
        .await
    }

    fn describe_tools(&self, tools: &BTreeSet<ToolHandle>) -> Vec<ToolDescription> {
        tools
            .iter()
            .filter_map(|handle| self.tools.describe_tool(handle.name()))
            .collect()
    }

    async fn preflight(&self) -> Result<(), LlmError> {
        self.provider.health_check().await
    }
}
