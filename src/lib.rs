//! market-crew
//!
//! A sequential multi-agent research pipeline. Four LLM-backed agents, each
//! with web search and page scraping tools, research a product's prices and
//! availability across e-commerce platforms. Each stage builds on the previous
//! one's output and writes its own report file.
//!
//! # Overview
//!
//! - [`crew`]: agents plus an ordered task list, run strictly in order
//! - [`agent`]: the [`Agent`] trait and the LLM-backed [`LlmAgent`]
//! - [`capability`]: the single boundary to the completion endpoint and tools
//! - [`research`]: the four research stages and their prompts
//! - [`sink`]: where task results are persisted
//!
//! # Quick Start
//!
//! ```rust
//! use market_crew::crew::{Crew, TaskSpec};
//! use market_crew::testing::{MemorySink, StubAgent};
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let mut builder = Crew::builder();
//! let collector = builder.agent(Arc::new(StubAgent::returning("Collector", "prices")));
//! let writer = builder.agent(Arc::new(StubAgent::returning("Writer", "report")));
//! let collect = builder.task(TaskSpec::new("collect", "Collect prices", collector, "1.md"));
//! builder.task(TaskSpec::new("report", "Write the report", writer, "2.md").after([collect]));
//!
//! let mut crew = builder.build().unwrap();
//! let output = crew.kickoff(&MemorySink::new()).await.unwrap();
//! assert_eq!(output.final_output, "report");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod agent;
pub mod capability;
pub mod config;
pub mod crew;
pub mod error;
pub mod intake;
pub mod llm;
pub mod observability;
pub mod research;
pub mod sink;
pub mod testing;
pub mod tools;

pub use agent::{Agent, AgentError, AgentProfile, LlmAgent};
pub use capability::{CapabilityAdapter, CompletionSettings, ProviderAdapter};
pub use config::{ConfigError, CrewConfig};
pub use crew::{Crew, CrewBuilder, CrewOutput, TaskOutput};
pub use error::{sanitize_error_message, CrewError, CrewResult};
pub use intake::{collect_intake, IntakeArgs, IntakeError, IntakeRecord};
pub use research::{build_research_crew, Stage};
pub use sink::{FileSink, OutputSink, SinkError};
pub use tools::{Tool, ToolDescription, ToolError, ToolHandle, ToolSystem};
