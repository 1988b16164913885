//! The four-stage price and availability research crew
//!
//! Collect listings, analyze them, review the analysis, write the report.
//! Every prompt string the crew uses is produced here from the intake record.

use crate::agent::{Agent, AgentProfile};
use crate::capability::CapabilityAdapter;
use crate::crew::{Crew, TaskId, TaskSpec};
use crate::error::CrewResult;
use crate::intake::IntakeRecord;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Analyze,
    Review,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Collect, Stage::Analyze, Stage::Review, Stage::Report];

    /// 1-based position in the pipeline
    pub fn number(self) -> usize {
        match self {
            Stage::Collect => 1,
            Stage::Analyze => 2,
            Stage::Review => 3,
            Stage::Report => 4,
        }
    }

    /// Task name, also used as the context header for later stages
    pub fn key(self) -> String {
        format!("stage{}", self.number())
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Stage::Collect => "1-price-data.md",
            Stage::Analyze => "2-price-analysis.md",
            Stage::Review => "3-price-review.md",
            Stage::Report => "4-final-report.md",
        }
    }

    pub fn role(self) -> &'static str {
        match self {
            Stage::Collect => "Price and Availability Data Collector",
            Stage::Analyze => "Market Data Analyst",
            Stage::Review => "Price Data Reviewer",
            Stage::Report => "Price and Availability Report Writer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key(), self.role())
    }
}

/// Task text for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompt {
    pub description: String,
    pub expected_output: String,
}

pub fn agent_profile(intake: &IntakeRecord, stage: Stage) -> AgentProfile {
    let product = intake.product_label();
    let (goal, backstory) = match stage {
        Stage::Collect => (
            format!(
                "Search for the product '{product}' on the most popular online platforms \
                 (such as Amazon, Mercado Livre and eBay) and collect detailed information \
                 on prices, availability, shipping and product links."
            ),
            "You collect price, stock, shipping and product-link data from trusted e-commerce \
             platforms. For every platform you find the current price, the quantity in stock, \
             the shipping options and the direct link to the product page.",
        ),
        Stage::Analyze => (
            format!(
                "Analyze the information collected about the product '{product}' to identify \
                 the best offers, taking price, availability, shipping and product links into account."
            ),
            "You compare the data collected from the different e-commerce platforms and produce \
             a detailed comparative analysis, identifying the best purchase options by \
             cost-benefit and keeping the link to each offer.",
        ),
        Stage::Review => (
            format!(
                "Review the price and availability data for the product '{product}' to make sure \
                 all information, including the product links, is correct, consistent and accurate."
            ),
            "You check the accuracy and completeness of the collected prices, availability, \
             shipping and links, performing a quality check before the final report is written.",
        ),
        Stage::Report => (
            format!(
                "Write a detailed, well-structured report about the product '{product}', including \
                 an analysis of prices, availability, product links and recommendations on the \
                 best purchase options."
            ),
            "You compile the collected and analyzed information into a clear, informative \
             report, including the product links on each platform and offering insight into \
             the best deals.",
        ),
    };

    AgentProfile {
        role: stage.role().to_string(),
        goal,
        backstory: backstory.to_string(),
    }
}

pub fn stage_prompt(intake: &IntakeRecord, stage: Stage) -> StagePrompt {
    let product = intake.product_label();
    let (description, expected_output) = match stage {
        Stage::Collect => (
            format!(
                "Search for the product '{product}' on e-commerce platforms such as Amazon, \
                 Mercado Livre and eBay.\n\
                 Collect detailed data on the product price, the quantity in stock, the shipping \
                 options offered by each platform and the direct product links.\n\
                 The goal is complete and accurate information for each platform, so the offers \
                 can be compared effectively."
            ),
            "A document or table with detailed information on prices, stock availability, \
             shipping options and product links for each platform searched.",
        ),
        Stage::Analyze => (
            format!(
                "Analyze the information collected about the product '{product}', comparing \
                 prices, stock availability, shipping options and direct product links across \
                 platforms.\n\
                 Identify the best offers by cost-benefit, considering price, stock, shipping and \
                 the links for quick access to each offer."
            ),
            "A comparative analysis highlighting the best offers, including direct product links \
             and the platforms that are most favorable in price, availability and shipping.",
        ),
        Stage::Review => (
            format!(
                "Review the price, availability, shipping and link information collected about \
                 the product '{product}', making sure the data is accurate and consistent across \
                 sources.\n\
                 The review must check price and stock values, confirm the shipping information \
                 and validate the links provided so the products are reachable."
            ),
            "A report with detailed feedback on the accuracy and quality of the collected data, \
             including a complete check of the product links.",
        ),
        Stage::Report => (
            format!(
                "Write a complete, well-structured report about the product '{product}', \
                 including an analysis of prices, availability, product links and purchase \
                 recommendations."
            ),
            "A detailed final report summarizing all collected and analyzed information, \
             comparing the best purchase options and highlighting the best prices, availability \
             conditions and links for quick access to the offers.",
        ),
    };

    StagePrompt {
        description,
        expected_output: expected_output.to_string(),
    }
}

/// Assemble the research crew for `intake`.
///
/// `agent_for` supplies the agent for each stage from its profile. Each stage
/// depends on the one before it and writes to its own file in the intake's
/// output directory.
pub fn build_research_crew<F>(
    intake: &IntakeRecord,
    coordinator: Option<Arc<dyn CapabilityAdapter>>,
    mut agent_for: F,
) -> CrewResult<Crew>
where
    F: FnMut(Stage, AgentProfile) -> Arc<dyn Agent>,
{
    let mut builder = Crew::builder();
    if let Some(coordinator) = coordinator {
        builder.coordinator(coordinator);
    }

    let mut previous: Option<TaskId> = None;
    for stage in Stage::ALL {
        let agent = builder.agent(agent_for(stage, agent_profile(intake, stage)));
        let prompt = stage_prompt(intake, stage);
        let output_path: PathBuf = intake.output_directory().join(stage.file_name());

        let spec = TaskSpec::new(stage.key(), prompt.description, agent, output_path)
            .expected_output(prompt.expected_output)
            .after(previous);
        previous = Some(builder.task(spec));
    }

    builder.build()
}
