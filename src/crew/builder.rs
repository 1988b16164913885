//! Crew construction and static validation

use super::task::{AgentId, Task, TaskId, TaskSpec};
use super::{Crew, Process};
use crate::agent::Agent;
use crate::capability::CapabilityAdapter;
use crate::error::{CrewError, CrewResult};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Collects agents and task declarations, then checks them as a whole
#[derive(Default)]
pub struct CrewBuilder {
    agents: Vec<Arc<dyn Agent>>,
    tasks: Vec<TaskSpec>,
    coordinator: Option<Arc<dyn CapabilityAdapter>>,
}

impl CrewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent to the arena
    pub fn agent(&mut self, agent: Arc<dyn Agent>) -> AgentId {
        self.agents.push(agent);
        AgentId(self.agents.len() - 1)
    }

    /// Declare the next task; ids follow declaration order
    pub fn task(&mut self, spec: TaskSpec) -> TaskId {
        self.tasks.push(spec);
        TaskId(self.tasks.len() - 1)
    }

    /// Capability checked once before the first task runs
    pub fn coordinator(&mut self, coordinator: Arc<dyn CapabilityAdapter>) -> &mut Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> CrewResult<Crew> {
        if self.tasks.is_empty() {
            return Err(CrewError::InvalidCrew("crew has no tasks".to_string()));
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();

        for (index, spec) in self.tasks.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(invalid(format!("task {} has an empty name", TaskId(index))));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate task name '{}'", spec.name)));
            }
            if !paths.insert(spec.output_path.as_path()) {
                return Err(invalid(format!(
                    "task '{}' reuses output path {}",
                    spec.name,
                    spec.output_path.display()
                )));
            }
            if spec.agent.0 >= self.agents.len() {
                return Err(invalid(format!(
                    "task '{}' is bound to unknown agent {}",
                    spec.name, spec.agent.0
                )));
            }

            let mut seen = HashSet::new();
            for predecessor in &spec.predecessors {
                if predecessor.0 >= index {
                    let kind = if predecessor.0 == index { "itself" } else { "a later task" };
                    return Err(invalid(format!(
                        "task '{}' depends on {} ({})",
                        spec.name, kind, predecessor
                    )));
                }
                if !seen.insert(*predecessor) {
                    return Err(invalid(format!(
                        "task '{}' lists predecessor {} twice",
                        spec.name, predecessor
                    )));
                }
            }
        }

        Ok(Crew {
            agents: self.agents,
            tasks: self.tasks.into_iter().map(Task::from).collect(),
            process: Process::Sequential,
            coordinator: self.coordinator,
            run_id: Uuid::new_v4(),
            kicked_off: false,
        })
    }
}

fn invalid(message: String) -> CrewError {
    CrewError::InvalidCrew(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAgent;

    fn builder_with_agent() -> (CrewBuilder, AgentId) {
        let mut builder = CrewBuilder::new();
        let agent = builder.agent(Arc::new(StubAgent::returning("Writer", "text")));
        (builder, agent)
    }

    fn assert_invalid(result: CrewResult<Crew>, needle: &str) {
        match result {
            Err(CrewError::InvalidCrew(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            other => panic!("expected InvalidCrew, got {other:?}"),
        }
    }

    #[test]
    fn test_build_valid_chain() {
        let (mut builder, agent) = builder_with_agent();
        let first = builder.task(TaskSpec::new("stage1", "d", agent, "1.md"));
        builder.task(TaskSpec::new("stage2", "d", agent, "2.md").after([first]));

        let crew = builder.build().unwrap();
        assert_eq!(crew.tasks().len(), 2);
        assert_eq!(crew.agent_count(), 1);
        assert_eq!(crew.process(), Process::Sequential);
        assert!(!crew.is_kicked_off());
    }

    #[test]
    fn test_empty_crew_rejected() {
        assert_invalid(CrewBuilder::new().build(), "no tasks");
    }

    #[test]
    fn test_forward_reference_rejected() {
        let (mut builder, agent) = builder_with_agent();
        builder.task(TaskSpec::new("stage1", "d", agent, "1.md").after([TaskId(1)]));
        builder.task(TaskSpec::new("stage2", "d", agent, "2.md"));
        assert_invalid(builder.build(), "a later task");
    }

    #[test]
    fn test_self_reference_rejected() {
        let (mut builder, agent) = builder_with_agent();
        builder.task(TaskSpec::new("stage1", "d", agent, "1.md").after([TaskId(0)]));
        assert_invalid(builder.build(), "itself");
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let (mut builder, _) = builder_with_agent();
        builder.task(TaskSpec::new("stage1", "d", AgentId(5), "1.md"));
        assert_invalid(builder.build(), "unknown agent");
    }

    #[test]
    fn test_duplicate_predecessor_rejected() {
        let (mut builder, agent) = builder_with_agent();
        let first = builder.task(TaskSpec::new("stage1", "d", agent, "1.md"));
        builder.task(TaskSpec::new("stage2", "d", agent, "2.md").after([first, first]));
        assert_invalid(builder.build(), "twice");
    }

    #[test]
    fn test_duplicate_name_and_path_rejected() {
        let (mut builder, agent) = builder_with_agent();
        builder.task(TaskSpec::new("stage1", "d", agent, "1.md"));
        builder.task(TaskSpec::new("stage1", "d", agent, "2.md"));
        assert_invalid(builder.build(), "duplicate task name");

        let (mut builder, agent) = builder_with_agent();
        builder.task(TaskSpec::new("stage1", "d", agent, "out.md"));
        builder.task(TaskSpec::new("stage2", "d", agent, "out.md"));
        assert_invalid(builder.build(), "reuses output path");
    }
}
