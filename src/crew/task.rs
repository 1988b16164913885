//! Task definitions and per-task state

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Position of a task in its crew's declared order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub usize);

/// Index of an agent in its crew's agent arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AgentId(pub usize);

impl TaskId {
    /// 1-based stage number used in logs and errors
    pub fn stage(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.stage())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a caller declares about a task before the crew is built
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: AgentId,
    pub predecessors: Vec<TaskId>,
    pub output_path: PathBuf,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agent: AgentId,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: String::new(),
            agent,
            predecessors: Vec::new(),
            output_path: output_path.into(),
        }
    }

    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    pub fn after(mut self, predecessors: impl IntoIterator<Item = TaskId>) -> Self {
        self.predecessors = predecessors.into_iter().collect();
        self
    }
}

/// A unit of work bound to one agent. Only the owning crew mutates it.
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) expected_output: String,
    pub(crate) agent: AgentId,
    pub(crate) predecessors: Vec<TaskId>,
    pub(crate) output_path: PathBuf,
    pub(crate) state: TaskState,
    pub(crate) result: Option<String>,
}

impl From<TaskSpec> for Task {
    fn from(spec: TaskSpec) -> Self {
        Self {
            name: spec.name,
            description: spec.description,
            expected_output: spec.expected_output,
            agent: spec.agent,
            predecessors: spec.predecessors,
            output_path: spec.output_path,
            state: TaskState::Pending,
            result: None,
        }
    }
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn predecessors(&self) -> &[TaskId] {
        &self.predecessors
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Text handed to the agent: the description, then the expected output if any
    pub fn prompt(&self) -> String {
        if self.expected_output.trim().is_empty() {
            self.description.clone()
        } else {
            format!(
                "{}\n\nExpected output:\n{}",
                self.description, self.expected_output
            )
        }
    }
}

/// Lifecycle violations on a crew or one of its tasks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalStateError {
    #[error("crew run has already been started")]
    AlreadyKickedOff,

    #[error("no task {0} in this crew")]
    UnknownTask(TaskId),

    #[error("task '{task}' already has a result")]
    AlreadyCompleted { task: String },

    #[error("task '{task}' cannot start from state {state}")]
    NotPending { task: String, state: TaskState },

    #[error("task '{task}' has failed and cannot complete")]
    TaskFailed { task: String },

    #[error("task '{task}' depends on '{predecessor}', which is {state}")]
    PredecessorIncomplete {
        task: String,
        predecessor: String,
        state: TaskState,
    },
}
