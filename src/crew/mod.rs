//! Crews: agents plus an ordered list of tasks, run as one pipeline.
//!
//! A [`Crew`] owns its agents and tasks. Tasks name their agent by
//! [`AgentId`] and their inputs by [`TaskId`]; both are indices fixed when the
//! crew is built, so the task table can be mutated while agents stay shared.

pub mod builder;
pub mod executor;
pub mod task;

pub use builder::CrewBuilder;
pub use executor::{assemble_context, CrewOutput, TaskOutput};
pub use task::{AgentId, IllegalStateError, Task, TaskId, TaskSpec, TaskState};

use crate::agent::Agent;
use crate::capability::CapabilityAdapter;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// How a crew schedules its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// One task at a time, in declared order
    #[default]
    Sequential,
}

pub struct Crew {
    agents: Vec<Arc<dyn Agent>>,
    tasks: Vec<Task>,
    process: Process,
    coordinator: Option<Arc<dyn CapabilityAdapter>>,
    run_id: Uuid,
    kicked_off: bool,
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::new()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Arc<dyn Agent>> {
        self.agents.get(id.0)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn is_kicked_off(&self) -> bool {
        self.kicked_off
    }

    /// Move a pending task to running once all its predecessors have completed
    pub fn mark_running(&mut self, id: TaskId) -> Result<(), IllegalStateError> {
        self.check_predecessors(id)?;
        let task = self.task_mut(id)?;
        if task.state != TaskState::Pending {
            return Err(IllegalStateError::NotPending {
                task: task.name.clone(),
                state: task.state,
            });
        }
        task.state = TaskState::Running;
        Ok(())
    }

    /// Store a task's result. A task completes at most once, and only after
    /// every predecessor has completed.
    pub fn mark_complete(&mut self, id: TaskId, result: String) -> Result<(), IllegalStateError> {
        {
            let task = self.task_ref(id)?;
            if task.result.is_some() {
                return Err(IllegalStateError::AlreadyCompleted {
                    task: task.name.clone(),
                });
            }
            if task.state == TaskState::Failed {
                return Err(IllegalStateError::TaskFailed {
                    task: task.name.clone(),
                });
            }
        }
        self.check_predecessors(id)?;

        let task = self.task_mut(id)?;
        task.result = Some(result);
        task.state = TaskState::Completed;
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, id: TaskId) -> Result<(), IllegalStateError> {
        self.task_mut(id)?.state = TaskState::Failed;
        Ok(())
    }

    fn check_predecessors(&self, id: TaskId) -> Result<(), IllegalStateError> {
        let task = self.task_ref(id)?;
        for predecessor_id in &task.predecessors {
            let predecessor = self.task_ref(*predecessor_id)?;
            if predecessor.state != TaskState::Completed {
                return Err(IllegalStateError::PredecessorIncomplete {
                    task: task.name.clone(),
                    predecessor: predecessor.name.clone(),
                    state: predecessor.state,
                });
            }
        }
        Ok(())
    }

    fn task_ref(&self, id: TaskId) -> Result<&Task, IllegalStateError> {
        self.tasks.get(id.0).ok_or(IllegalStateError::UnknownTask(id))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, IllegalStateError> {
        self.tasks
            .get_mut(id.0)
            .ok_or(IllegalStateError::UnknownTask(id))
    }
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("run_id", &self.run_id)
            .field("process", &self.process)
            .field("agents", &self.agents.iter().map(|a| a.role()).collect::<Vec<_>>())
            .field("tasks", &self.tasks)
            .field("has_coordinator", &self.coordinator.is_some())
            .field("kicked_off", &self.kicked_off)
            .finish()
    }
}
