//! Mock implementations for testing
//!
//! Provides a scripted LlmProvider, recording tools and capabilities, stub
//! agents and an in-memory output sink so crews can run without network or
//! filesystem access.

use crate::agent::{Agent, AgentError};
use crate::capability::CapabilityAdapter;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    TokenUsage, ToolCall,
};
use crate::sink::{OutputSink, SinkError};
use crate::tools::builtin::{ScrapeWebsiteTool, WebSearchTool};
use crate::tools::{Tool, ToolDescription, ToolError, ToolHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One scripted provider reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    Fail(LlmError),
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// A reply requesting a single tool call
    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::ToolCalls {
            content: None,
            calls: vec![ToolCall {
                id: format!("call_{name}"),
                name: name.to_string(),
                arguments,
            }],
        }
    }
}

/// Mock LLM provider replaying a script; the script wraps around when exhausted
#[derive(Debug)]
pub struct MockLlmProvider {
    pub replies: Vec<MockReply>,
    pub current_reply: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
    pub health_error: Option<LlmError>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            current_reply: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            health_error: None,
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Every completion and health check fails
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::scripted(vec![])
        }
    }

    pub fn with_health_failure(mut self, error: LlmError) -> Self {
        self.health_error = Some(error);
        self
    }

    /// Handle on every request received, in order
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }

    fn response(content: Option<String>, tool_calls: Option<Vec<ToolCall>>) -> CompletionResponse {
        let finish_reason = if tool_calls.is_some() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };
        CompletionResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason,
            tool_calls,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_reply.lock().await;
        let reply = if self.replies.is_empty() {
            MockReply::text("Mock response")
        } else {
            self.replies[*current % self.replies.len()].clone()
        };
        *current += 1;

        match reply {
            MockReply::Text(content) => Ok(Self::response(Some(content), None)),
            MockReply::ToolCalls { content, calls } => Ok(Self::response(content, Some(calls))),
            MockReply::Fail(error) => Err(error),
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            return Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ));
        }
        match &self.health_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn builtin_description(handle: ToolHandle) -> ToolDescription {
    match handle {
        ToolHandle::WebSearch => WebSearchTool::new().describe(),
        ToolHandle::ScrapeWebsite => ScrapeWebsiteTool::new().describe(),
    }
}

/// Tool returning a fixed value under a builtin tool's name and schema
#[derive(Debug)]
pub struct MockTool {
    pub handle: ToolHandle,
    pub response: Result<Value, ToolError>,
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockTool {
    pub fn new(handle: ToolHandle, response: Value) -> Self {
        Self {
            handle,
            response: Ok(response),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(handle: ToolHandle, error: ToolError) -> Self {
        Self {
            handle,
            response: Err(error),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Parameters of every execution, in order
    pub fn calls(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tool for MockTool {
    fn describe(&self) -> ToolDescription {
        builtin_description(self.handle)
    }

    async fn initialize(&mut self, _config: Option<&Value>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        self.calls.lock().await.push(parameters.clone());
        self.response.clone()
    }
}

/// Capability adapter over a [`MockLlmProvider`] with canned tool outputs
pub struct MockCapabilities {
    provider: MockLlmProvider,
    tool_outputs: HashMap<ToolHandle, Result<String, ToolError>>,
    tool_calls: Arc<Mutex<Vec<(ToolHandle, Value)>>>,
}

impl MockCapabilities {
    pub fn new(provider: MockLlmProvider) -> Self {
        Self {
            provider,
            tool_outputs: HashMap::new(),
            tool_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tool_output(mut self, handle: ToolHandle, output: impl Into<String>) -> Self {
        self.tool_outputs.insert(handle, Ok(output.into()));
        self
    }

    pub fn with_tool_error(mut self, handle: ToolHandle, error: ToolError) -> Self {
        self.tool_outputs.insert(handle, Err(error));
        self
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.provider.requests()
    }

    pub fn tool_calls(&self) -> Arc<Mutex<Vec<(ToolHandle, Value)>>> {
        Arc::clone(&self.tool_calls)
    }
}

#[async_trait]
impl CapabilityAdapter for MockCapabilities {
    async fn invoke_completion(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDescription>,
    ) -> Result<CompletionResponse, LlmError> {
        self.provider
            .complete(CompletionRequest {
                messages,
                model: "mock-model".to_string(),
                max_tokens: None,
                temperature: None,
                tools: if tools.is_empty() { None } else { Some(tools) },
            })
            .await
    }

    async fn invoke_tool(&self, tool: ToolHandle, args: &Value) -> Result<String, ToolError> {
        self.tool_calls.lock().await.push((tool, args.clone()));
        self.tool_outputs
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| Err(ToolError::UnknownTool(tool.name().to_string())))
    }

    fn describe_tools(&self, tools: &BTreeSet<ToolHandle>) -> Vec<ToolDescription> {
        tools
            .iter()
            .filter(|handle| self.tool_outputs.contains_key(handle))
            .map(|handle| builtin_description(*handle))
            .collect()
    }

    async fn preflight(&self) -> Result<(), LlmError> {
        self.provider.health_check().await
    }
}

/// One recorded [`StubAgent`] invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCall {
    pub role: String,
    pub description: String,
    pub context: String,
}

pub type AgentLog = Arc<Mutex<Vec<AgentCall>>>;

/// Agent returning a fixed result (or error) and recording what it was given
#[derive(Debug)]
pub struct StubAgent {
    role: String,
    outcome: Result<String, AgentError>,
    log: AgentLog,
}

impl StubAgent {
    pub fn returning(role: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            outcome: Ok(output.into()),
            log: Self::shared_log(),
        }
    }

    pub fn failing(role: impl Into<String>) -> Self {
        Self::failing_with(
            role,
            AgentError::Tool(ToolError::Unreachable("stub failure".to_string())),
        )
    }

    pub fn failing_with(role: impl Into<String>, error: AgentError) -> Self {
        Self {
            role: role.into(),
            outcome: Err(error),
            log: Self::shared_log(),
        }
    }

    /// A log several agents can share to observe invocation order
    pub fn shared_log() -> AgentLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn with_log(mut self, log: AgentLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> AgentLog {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn role(&self) -> &str {
        &self.role
    }

    async fn run(&self, task_description: &str, context: &str) -> Result<String, AgentError> {
        self.log.lock().await.push(AgentCall {
            role: self.role.clone(),
            description: task_description.to_string(),
            context: context.to_string(),
        });
        self.outcome.clone()
    }
}

/// Sink keeping artifacts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<HashMap<PathBuf, String>>,
    writes: Mutex<Vec<PathBuf>>,
    prepares: AtomicUsize,
    fail_on: Option<PathBuf>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to `path` fail with a permission error
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_on = Some(path.into());
        self
    }

    pub async fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().await.get(path.as_ref()).cloned()
    }

    /// Paths in write order, including repeats
    pub async fn written_paths(&self) -> Vec<PathBuf> {
        self.writes.lock().await.clone()
    }

    pub async fn write_count(&self) -> usize {
        self.writes.lock().await.len()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn prepare(&self) -> Result<(), SinkError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, path: &Path, text: &str) -> Result<(), SinkError> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(SinkError::new(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "mock write failure"),
            ));
        }
        self.writes.lock().await.push(path.to_path_buf());
        self.files
            .lock()
            .await
            .insert(path.to_path_buf(), text.to_string());
        Ok(())
    }
}
