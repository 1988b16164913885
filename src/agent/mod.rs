//! Agents: named roles that turn a task description plus context into text.

pub mod llm_agent;

pub use llm_agent::LlmAgent;

use crate::llm::LlmError;
use crate::tools::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who an agent is: the strings its system prompt is built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

/// A role-bound worker. Implementations keep no memory between `run` calls.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> &str;

    /// Produce the result for one task.
    ///
    /// `context` is the labelled output of the task's predecessors, empty for
    /// tasks without predecessors.
    async fn run(&self, task_description: &str, context: &str) -> Result<String, AgentError>;
}

/// Failures surfaced from inside an agent run; both variants abort the crew
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
    #[error("tool failed: {0}")]
    Tool(#[from] ToolError),
}
