//! Tool system
//!
//! Tools are opaque capabilities that return text-like JSON values. Each tool
//! describes its parameters with a JSON schema; [`ToolSystem`] validates every
//! call against that schema before executing it.

use crate::config::ToolConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod builtin;

/// Tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema of the parameters
    fn describe(&self) -> ToolDescription;

    /// Receives the tool's settings from the config file; called once at startup
    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError>;

    /// Run the tool with parameters already validated against `describe()`
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;

    /// Release resources
    async fn shutdown(&mut self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Tool description handed to the completion capability
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The tools an agent can be authorized to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolHandle {
    WebSearch,
    ScrapeWebsite,
}

impl ToolHandle {
    pub const ALL: [ToolHandle; 2] = [ToolHandle::WebSearch, ToolHandle::ScrapeWebsite];

    pub fn name(&self) -> &'static str {
        match self {
            ToolHandle::WebSearch => "web_search",
            ToolHandle::ScrapeWebsite => "scrape_website",
        }
    }
}

impl fmt::Display for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolHandle {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolHandle::ALL
            .into_iter()
            .find(|handle| handle.name() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Registry of initialized tools
pub struct ToolSystem {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolSystem {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create and initialize every tool named in the `[tools]` table
    pub async fn initialize(
        &mut self,
        tool_configs: &HashMap<String, ToolConfig>,
    ) -> Result<(), ToolError> {
        for (tool_name, tool_config) in tool_configs {
            let mut tool = Self::create_tool(tool_name, tool_config)?;
            tool.initialize(tool_config.settings().as_ref()).await?;
            self.tools.insert(tool_name.clone(), tool);
        }

        Ok(())
    }

    /// Register an already-initialized tool under its described name
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.describe().name;
        self.tools.insert(name, tool);
    }

    fn create_tool(tool_name: &str, config: &ToolConfig) -> Result<Box<dyn Tool>, ToolError> {
        match config.implementation() {
            "builtin" => Self::create_builtin_tool(tool_name),
            other => Err(ToolError::UnknownImplementation(other.to_string())),
        }
    }

    fn create_builtin_tool(tool_name: &str) -> Result<Box<dyn Tool>, ToolError> {
        match tool_name.parse::<ToolHandle>()? {
            ToolHandle::WebSearch => Ok(Box::new(builtin::WebSearchTool::new())),
            ToolHandle::ScrapeWebsite => Ok(Box::new(builtin::ScrapeWebsiteTool::new())),
        }
    }

    pub fn describe_tool(&self, tool_name: &str) -> Option<ToolDescription> {
        self.tools.get(tool_name).map(|tool| tool.describe())
    }

    /// Execute a tool after validating parameters against its schema
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(&tool.describe(), parameters)?;

        tool.execute(parameters).await
    }

    fn validate_parameters(description: &ToolDescription, parameters: &Value) -> Result<(), ToolError> {
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })
    }

    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn shutdown(&mut self) -> Result<(), ToolError> {
        for tool in self.tools.values_mut() {
            tool.shutdown().await?;
        }
        Ok(())
    }
}

impl Default for ToolSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool capability errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown tool implementation: {0}")]
    UnknownImplementation(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Resource unreachable: {0}")]
    Unreachable(String),
    #[error("Tool {0} returned an empty result")]
    EmptyResult(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}
