//! Sequential pipeline execution
//!
//! Tasks run one at a time in declared order. Each task sees only the results
//! of its declared predecessors, and its own result is persisted before the
//! next task starts. The first failure ends the run.

use super::task::{Task, TaskId};
use super::Crew;
use crate::error::{CrewError, CrewResult};
use crate::sink::OutputSink;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// One completed task as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub stage: usize,
    pub name: String,
    pub agent_role: String,
    pub output_path: PathBuf,
    pub raw: String,
}

/// Result of a successful crew run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrewOutput {
    pub run_id: Uuid,
    /// Result of the last task
    pub final_output: String,
    pub tasks: Vec<TaskOutput>,
}

/// Context text for a task: each predecessor's result under a `[name]` header,
/// in the order the predecessors were declared, separated by blank lines.
///
/// Predecessors without a result contribute nothing.
pub fn assemble_context(tasks: &[Task], predecessors: &[TaskId]) -> String {
    predecessors
        .iter()
        .filter_map(|id| tasks.get(id.0))
        .filter_map(|task| {
            task.result()
                .map(|result| format!("[{}] {}", task.name(), result))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Crew {
    /// Run every task once, in order, writing each result to `sink`.
    ///
    /// A crew runs at most once; later calls fail with an illegal-state error.
    /// A task whose artifact cannot be written stays `Completed` with its result,
    /// and the run stops with a persist error.
    pub async fn kickoff(&mut self, sink: &dyn OutputSink) -> CrewResult<CrewOutput> {
        if self.kicked_off {
            return Err(super::IllegalStateError::AlreadyKickedOff.into());
        }
        self.kicked_off = true;

        let span = crate::crew_span!(run_id = %self.run_id, tasks = self.tasks.len());
        self.run_tasks(sink).instrument(span).await
    }

    async fn run_tasks(&mut self, sink: &dyn OutputSink) -> CrewResult<CrewOutput> {
        info!(
            process = ?self.process,
            agents = self.agents.len(),
            tasks = self.tasks.len(),
            "Crew kickoff"
        );

        if let Some(coordinator) = &self.coordinator {
            coordinator.preflight().await.map_err(|e| {
                error!("Completion capability preflight failed: {}", e);
                CrewError::Preflight(e)
            })?;
        }

        sink.prepare().await.map_err(CrewError::Prepare)?;

        let mut outputs = Vec::with_capacity(self.tasks.len());
        for index in 0..self.tasks.len() {
            let output = self.run_task(TaskId(index), sink).await?;
            outputs.push(output);
        }

        let final_output = outputs
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();

        info!(run_id = %self.run_id, "Crew finished");

        Ok(CrewOutput {
            run_id: self.run_id,
            final_output,
            tasks: outputs,
        })
    }

    async fn run_task(&mut self, id: TaskId, sink: &dyn OutputSink) -> CrewResult<TaskOutput> {
        let stage = id.stage();
        self.mark_running(id)?;

        let task = &self.tasks[id.0];
        let name = task.name().to_string();
        let output_path = task.output_path().to_path_buf();
        let prompt = task.prompt();
        let context = assemble_context(&self.tasks, task.predecessors());
        let agent = Arc::clone(&self.agents[task.agent().0]);

        let span = crate::task_span!(stage, task = %name, agent = %agent.role());
        async {
            info!(context_chars = context.len(), "Task started");

            let result = match agent.run(&prompt, &context).await {
                Ok(result) => result,
                Err(source) => {
                    error!("Task failed: {}", source);
                    self.mark_failed(id)?;
                    return Err(CrewError::TaskFailed {
                        task: name.clone(),
                        stage,
                        source,
                    });
                }
            };

            self.mark_complete(id, result.clone())?;
            sink.write(&output_path, &result)
                .await
                .map_err(|source| CrewError::Persist {
                    task: name.clone(),
                    stage,
                    source,
                })?;

            info!(output = %output_path.display(), chars = result.len(), "Task completed");

            Ok(TaskOutput {
                stage,
                name: name.clone(),
                agent_role: agent.role().to_string(),
                output_path: output_path.clone(),
                raw: result,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::task::{AgentId, TaskSpec};
    use crate::crew::TaskState;
    use crate::testing::{MemorySink, StubAgent};

    fn completed(name: &str, result: Option<&str>) -> Task {
        let mut task: Task = TaskSpec::new(name, "d", AgentId(0), format!("{name}.md")).into();
        task.result = result.map(str::to_string);
        task
    }

    #[test]
    fn test_assemble_context_orders_and_labels() {
        let tasks = vec![
            completed("stage1", Some("A1")),
            completed("stage2", Some("A2")),
            completed("stage3", None),
        ];

        assert_eq!(assemble_context(&tasks, &[]), "");
        assert_eq!(assemble_context(&tasks, &[TaskId(1)]), "[stage2] A2");
        assert_eq!(
            assemble_context(&tasks, &[TaskId(1), TaskId(0)]),
            "[stage2] A2\n\n[stage1] A1"
        );
        assert_eq!(assemble_context(&tasks, &[TaskId(2)]), "");
    }

    #[tokio::test]
    async fn test_kickoff_runs_chain_and_persists() {
        let log = StubAgent::shared_log();
        let mut builder = Crew::builder();
        let a = builder.agent(Arc::new(StubAgent::returning("First", "A1").with_log(log.clone())));
        let b = builder.agent(Arc::new(StubAgent::returning("Second", "A2").with_log(log.clone())));
        let first = builder.task(TaskSpec::new("stage1", "collect", a, "1.md"));
        builder.task(TaskSpec::new("stage2", "analyze", b, "2.md").after([first]));
        let mut crew = builder.build().unwrap();

        let sink = MemorySink::new();
        let output = crew.kickoff(&sink).await.unwrap();

        assert_eq!(output.final_output, "A2");
        assert_eq!(output.tasks.len(), 2);
        assert_eq!(output.tasks[1].agent_role, "Second");
        assert_eq!(output.run_id, crew.run_id());
        assert_eq!(sink.contents("1.md").await.as_deref(), Some("A1"));
        assert_eq!(sink.contents("2.md").await.as_deref(), Some("A2"));
        assert_eq!(sink.prepare_count(), 1);

        let calls = log.lock().await.clone();
        assert_eq!(calls[0].context, "");
        assert_eq!(calls[1].context, "[stage1] A1");
        assert!(crew.tasks().iter().all(|t| t.state() == TaskState::Completed));
    }

    #[tokio::test]
    async fn test_second_kickoff_rejected() {
        let mut builder = Crew::builder();
        let a = builder.agent(Arc::new(StubAgent::returning("Only", "A1")));
        builder.task(TaskSpec::new("stage1", "d", a, "1.md"));
        let mut crew = builder.build().unwrap();
        let sink = MemorySink::new();

        crew.kickoff(&sink).await.unwrap();
        let err = crew.kickoff(&sink).await.unwrap_err();
        assert!(matches!(
            err,
            CrewError::IllegalState(crate::crew::IllegalStateError::AlreadyKickedOff)
        ));
        assert_eq!(sink.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_agent_failure_marks_task_failed() {
        let mut builder = Crew::builder();
        let ok = builder.agent(Arc::new(StubAgent::returning("Ok", "A1")));
        let bad = builder.agent(Arc::new(StubAgent::failing("Broken")));
        let first = builder.task(TaskSpec::new("stage1", "d", ok, "1.md"));
        let second = builder.task(TaskSpec::new("stage2", "d", bad, "2.md").after([first]));
        builder.task(TaskSpec::new("stage3", "d", ok, "3.md").after([second]));
        let mut crew = builder.build().unwrap();
        let sink = MemorySink::new();

        let err = crew.kickoff(&sink).await.unwrap_err();
        match err {
            CrewError::TaskFailed { task, stage, .. } => {
                assert_eq!(task, "stage2");
                assert_eq!(stage, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(crew.tasks()[1].state(), TaskState::Failed);
        assert_eq!(crew.tasks()[2].state(), TaskState::Pending);
        assert!(sink.contents("3.md").await.is_none());
    }

    #[tokio::test]
    async fn test_sink_failure_is_persist_error() {
        let mut builder = Crew::builder();
        let a = builder.agent(Arc::new(StubAgent::returning("Only", "A1")));
        builder.task(TaskSpec::new("stage1", "d", a, "1.md"));
        let mut crew = builder.build().unwrap();
        let sink = MemorySink::new().failing_on("1.md");

        let err = crew.kickoff(&sink).await.unwrap_err();
        assert!(matches!(err, CrewError::Persist { stage: 1, .. }));
        assert_eq!(crew.tasks()[0].state(), TaskState::Completed);
        assert_eq!(crew.tasks()[0].result(), Some("A1"));
        assert!(sink.contents("1.md").await.is_none());
        assert_eq!(sink.write_count().await, 0);
    }
}
