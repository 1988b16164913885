//! Agent backed by the completion capability
//!
//! Each run starts from a fresh conversation: a role-scoped system prompt and
//! one user message holding the task and its context. The model may then ask
//! for tools; their output is folded back into the conversation until it
//! answers or the iteration budget runs out.

use crate::agent::{Agent, AgentError, AgentProfile};
use crate::capability::CapabilityAdapter;
use crate::llm::provider::{CompletionResponse, LlmError, Message, ToolCall};
use crate::tools::{ToolError, ToolHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ITERATIONS: usize = 8;

const FINAL_ANSWER_INSTRUCTION: &str = "You have used all available tool calls. \
Give your best complete final answer now, using only the information gathered so far.";

/// LLM-backed agent with an authorized tool set
pub struct LlmAgent {
    profile: AgentProfile,
    tools: BTreeSet<ToolHandle>,
    allow_delegation: bool,
    max_iterations: usize,
    capabilities: Arc<dyn CapabilityAdapter>,
}

impl LlmAgent {
    /// Agent with no tools, no delegation and the default iteration budget
    pub fn new(profile: AgentProfile, capabilities: Arc<dyn CapabilityAdapter>) -> Self {
        Self {
            profile,
            tools: BTreeSet::new(),
            allow_delegation: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            capabilities,
        }
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolHandle>) -> Self {
        self.tools = tools.into_iter().collect();
        self
    }

    pub fn with_delegation(mut self, allow_delegation: bool) -> Self {
        self.allow_delegation = allow_delegation;
        self
    }

    /// Completion calls per run; the last call is made without tools
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn tools(&self) -> &BTreeSet<ToolHandle> {
        &self.tools
    }

    pub fn allows_delegation(&self) -> bool {
        self.allow_delegation
    }

    fn system_prompt(&self, now: DateTime<Utc>) -> String {
        format!(
            "You are {role}. {backstory}\nYour personal goal is: {goal}\n\nCurrent date: {date} UTC",
            role = self.profile.role,
            backstory = self.profile.backstory,
            goal = self.profile.goal,
            date = now.format("%Y-%m-%d"),
        )
    }

    fn task_message(task_description: &str, context: &str) -> String {
        if context.trim().is_empty() {
            task_description.to_string()
        } else {
            format!("{task_description}\n\nContext from previous tasks:\n{context}")
        }
    }

    fn initial_messages(&self, task_description: &str, context: &str, now: DateTime<Utc>) -> Vec<Message> {
        vec![
            Message::system(self.system_prompt(now)),
            Message::user(Self::task_message(task_description, context)),
        ]
    }

    /// Run one requested tool call, returning the line folded into the conversation.
    ///
    /// Calls the agent may not make, or makes with bad arguments, are answered
    /// with a refusal. Failures of the capability itself propagate.
    async fn execute_tool_call(&self, call: &ToolCall) -> Result<String, ToolError> {
        let handle = match call.name.parse::<ToolHandle>() {
            Ok(handle) if self.tools.contains(&handle) => handle,
            _ => {
                warn!(role = %self.profile.role, tool = %call.name, "Refusing unauthorized tool call");
                return Ok(format!(
                    "Tool {} is not available to you. Available tools: {}",
                    call.name,
                    self.tool_names()
                ));
            }
        };

        match self.capabilities.invoke_tool(handle, &call.arguments).await {
            Ok(text) => Ok(format!("Tool {} returned: {}", call.name, text)),
            Err(ToolError::ValidationError(reason)) => {
                debug!(tool = %call.name, "Tool arguments rejected: {}", reason);
                Ok(format!("Tool {} rejected its arguments: {}", call.name, reason))
            }
            Err(e) => Err(e),
        }
    }

    fn tool_names(&self) -> String {
        if self.tools.is_empty() {
            return "none".to_string();
        }
        self.tools
            .iter()
            .map(ToolHandle::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn final_content(response: CompletionResponse) -> Result<String, LlmError> {
        response
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("completion returned no text".to_string()))
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn role(&self) -> &str {
        &self.profile.role
    }

    async fn run(&self, task_description: &str, context: &str) -> Result<String, AgentError> {
        let mut messages = self.initial_messages(task_description, context, Utc::now());
        let tool_descriptions = self.capabilities.describe_tools(&self.tools);

        info!(
            role = %self.profile.role,
            tools = tool_descriptions.len(),
            context_chars = context.len(),
            "Agent started"
        );

        for iteration in 1..=self.max_iterations {
            let last = iteration == self.max_iterations;
            if last && iteration > 1 {
                messages.push(Message::user(FINAL_ANSWER_INSTRUCTION));
            }
            let offered = if last {
                Vec::new()
            } else {
                tool_descriptions.clone()
            };

            let response = self
                .capabilities
                .invoke_completion(messages.clone(), offered)
                .await?;

            if !last && response.has_tool_calls() {
                if let Some(content) = response.content.as_deref().filter(|c| !c.trim().is_empty()) {
                    messages.push(Message::assistant(content));
                }

                let calls = response.tool_calls.unwrap_or_default();
                debug!(iteration, tool_calls = calls.len(), "Agent requested tools");

                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    results.push(self.execute_tool_call(call).await?);
                }
                messages.push(Message::user(format!("Tool results:\n{}", results.join("\n\n"))));
                continue;
            }

            let answer = Self::final_content(response)?;
            info!(role = %self.profile.role, iterations = iteration, "Agent finished");
            return Ok(answer);
        }

        Err(LlmError::InvalidResponse("agent produced no final answer".to_string()).into())
    }
}
