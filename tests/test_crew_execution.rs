//! Crew execution tests
//!
//! Behavior of a full run: ordering, context hand-off, persistence and the
//! first-failure abort, observed through stub agents and real files.


use market_crew::agent::{Agent, AgentError};
use market_crew::capability::CapabilityAdapter;
use market_crew::crew::{Crew, TaskId, TaskSpec, TaskState};
use market_crew::error::CrewError;
use market_crew::llm::LlmError;
use market_crew::research::{build_research_crew, Stage};
use market_crew::sink::{FileSink, OutputSink};
use market_crew::testing::{MemorySink, MockCapabilities, MockLlmProvider, StubAgent};
use market_crew::tools::ToolError;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::{numbered_stub_agents, widget_intake};

#[tokio::test]
async fn test_widget_research_end_to_end() {
    let dir = TempDir::new().unwrap();
    let intake = widget_intake(dir.path());
    let log = StubAgent::shared_log();

    let mut crew = build_research_crew(&intake, None, numbered_stub_agents(log.clone())).unwrap();
    let sink = FileSink::new(intake.output_directory());
    let output = crew.kickoff(&sink).await.unwrap();

    assert_eq!(output.final_output, "A4");
    for stage in Stage::ALL {
        let written = std::fs::read_to_string(dir.path().join(stage.file_name())).unwrap();
        assert_eq!(written, format!("A{}", stage.number()));
    }

    let calls = log.lock().await.clone();
    let contexts: Vec<&str> = calls.iter().map(|c| c.context.as_str()).collect();
    assert_eq!(contexts, ["", "[stage1] A1", "[stage2] A2", "[stage3] A3"]);

    let roles: Vec<&str> = calls.iter().map(|c| c.role.as_str()).collect();
    let expected: Vec<&str> = Stage::ALL.iter().map(|s| s.role()).collect();
    assert_eq!(roles, expected);

    assert!(calls[0].description.contains("Widget X"));
    assert!(calls[0].description.contains("Expected output:"));
    assert_eq!(output.tasks.len(), 4);
    assert_eq!(output.tasks[3].output_path, dir.path().join("4-final-report.md"));
}

#[tokio::test]
async fn test_output_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("reports").join("widget-x");
    let intake = widget_intake(&nested);

    let mut crew =
        build_research_crew(&intake, None, numbered_stub_agents(StubAgent::shared_log())).unwrap();
    crew.kickoff(&FileSink::new(&nested)).await.unwrap();

    assert!(nested.join("1-price-data.md").is_file());
}

#[tokio::test]
async fn test_context_concatenates_predecessors_in_declared_order() {
    let log = StubAgent::shared_log();
    let mut builder = Crew::builder();
    let a = builder.agent(Arc::new(StubAgent::returning("A", "alpha").with_log(log.clone())));
    let b = builder.agent(Arc::new(StubAgent::returning("B", "beta").with_log(log.clone())));
    let c = builder.agent(Arc::new(StubAgent::returning("C", "gamma").with_log(log.clone())));

    let first = builder.task(TaskSpec::new("first", "d1", a, "1.md"));
    let second = builder.task(TaskSpec::new("second", "d2", b, "2.md"));
    builder.task(TaskSpec::new("third", "d3", c, "3.md").after([second, first]));

    let mut crew = builder.build().unwrap();
    crew.kickoff(&MemorySink::new()).await.unwrap();

    let calls = log.lock().await.clone();
    assert_eq!(calls[1].context, "", "second has no declared predecessors");
    assert_eq!(calls[2].context, "[second] beta\n\n[first] alpha");
}

#[tokio::test]
async fn test_failure_short_circuits_remaining_tasks() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("1-price-data.md"), "stale").unwrap();
    let intake = widget_intake(dir.path());
    let log = StubAgent::shared_log();

    let mut crew = build_research_crew(&intake, None, |stage, profile| -> Arc<dyn Agent> {
        let agent = if stage == Stage::Review {
            StubAgent::failing_with(
                profile.role,
                AgentError::Tool(ToolError::Unreachable("https://shop.example".to_string())),
            )
        } else {
            StubAgent::returning(profile.role, format!("A{}", stage.number()))
        };
        Arc::new(agent.with_log(log.clone()))
    })
    .unwrap();

    let err = crew
        .kickoff(&FileSink::new(intake.output_directory()))
        .await
        .unwrap_err();

    match err {
        CrewError::TaskFailed { task, stage, source } => {
            assert_eq!(task, "stage3");
            assert_eq!(stage, 3);
            assert!(matches!(source, AgentError::Tool(ToolError::Unreachable(_))));
        }
        other => panic!("Expected TaskFailed, got {other:?}"),
    }

    assert_eq!(log.lock().await.len(), 3, "stage 4 must never run");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("1-price-data.md")).unwrap(),
        "A1"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("2-price-analysis.md")).unwrap(),
        "A2"
    );
    assert!(!dir.path().join("3-price-review.md").exists());
    assert!(!dir.path().join("4-final-report.md").exists());
    assert_eq!(crew.task(TaskId(2)).unwrap().state(), TaskState::Failed);
    assert_eq!(crew.task(TaskId(3)).unwrap().state(), TaskState::Pending);
}

#[tokio::test]
async fn test_preflight_failure_runs_no_task() {
    let dir = TempDir::new().unwrap();
    let intake = widget_intake(dir.path());
    let log = StubAgent::shared_log();
    let coordinator: Arc<dyn CapabilityAdapter> = Arc::new(MockCapabilities::new(
        MockLlmProvider::single_response("unused")
            .with_health_failure(LlmError::AuthenticationFailed("bad key".to_string())),
    ));

    let mut crew =
        build_research_crew(&intake, Some(coordinator), numbered_stub_agents(log.clone())).unwrap();
    let sink = MemorySink::new();
    let err = crew.kickoff(&sink).await.unwrap_err();

    assert!(matches!(err, CrewError::Preflight(LlmError::AuthenticationFailed(_))));
    assert!(log.lock().await.is_empty());
    assert_eq!(sink.prepare_count(), 0);
    assert_eq!(sink.write_count().await, 0);
}

#[tokio::test]
async fn test_rewriting_an_artifact_keeps_last_content() {
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path());
    let path = dir.path().join("4-final-report.md");

    sink.write(&path, "first draft, much longer than the second").await.unwrap();
    sink.write(&path, "final").await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "final");
}

/// Random predecessor sets, each drawn only from earlier tasks
fn chain_shape() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|len| {
        (0..len)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i).boxed())
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_tasks_run_in_declared_order(shape in chain_shape()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (order, contexts) = runtime.block_on(async {
            let log = StubAgent::shared_log();
            let mut builder = Crew::builder();
            for (index, predecessors) in shape.iter().enumerate() {
                let agent = builder.agent(Arc::new(
                    StubAgent::returning(format!("agent{index}"), format!("R{index}"))
                        .with_log(log.clone()),
                ));
                builder.task(
                    TaskSpec::new(format!("t{index}"), "d", agent, format!("{index}.md"))
                        .after(predecessors.iter().map(|p| TaskId(*p))),
                );
            }

            let mut crew = builder.build().unwrap();
            crew.kickoff(&MemorySink::new()).await.unwrap();

            let calls = log.lock().await.clone();
            let order: Vec<String> = calls.iter().map(|c| c.role.clone()).collect();
            let contexts: Vec<String> = calls.into_iter().map(|c| c.context).collect();
            (order, contexts)
        });

        let expected: Vec<String> = (0..shape.len()).map(|i| format!("agent{i}")).collect();
        prop_assert_eq!(order, expected);

        for (index, predecessors) in shape.iter().enumerate() {
            let expected_context = predecessors
                .iter()
                .map(|p| format!("[t{p}] R{p}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            prop_assert_eq!(&contexts[index], &expected_context);
        }
    }
}
