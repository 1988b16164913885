//! market-crew - Main Entry Point
//!
//! Collects the product to research, builds the four-stage crew and runs it,
//! writing one report per stage and printing the final report.

use clap::{Parser, Subcommand};
use market_crew::agent::{Agent, LlmAgent};
use market_crew::capability::{CapabilityAdapter, CompletionSettings, ProviderAdapter};
use market_crew::config::{ConfigError, CrewConfig};
use market_crew::error::{CrewError, CrewResult};
use market_crew::intake::{collect_intake, IntakeArgs};
use market_crew::llm::providers::create_provider;
use market_crew::observability::{init_logging, LogFormat, LogSettings};
use market_crew::research::build_research_crew;
use market_crew::sink::FileSink;
use market_crew::tools::{ToolHandle, ToolSystem};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Product price and availability research with a crew of LLM agents
#[derive(Parser)]
#[command(name = "market-crew")]
#[command(about = "Research product prices and availability with a sequential crew of LLM agents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the research crew; missing values are asked for interactively
    Run {
        #[command(flatten)]
        intake: IntakeArgs,
    },
    /// Validate configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(LogSettings::from_env(LogFormat::Compact).with_verbosity(cli.verbose));

    info!("Starting market-crew v{}", env!("CARGO_PKG_VERSION"));

    let (config, source) = match CrewConfig::discover(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(
                "Failed to load configuration: {}",
                market_crew::sanitize_error_message(&e.to_string())
            );
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { intake } => run_crew(config, intake).await,
        Commands::Config { show } => handle_config_command(&config, source.as_deref(), show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e.user_message());
        process::exit(1);
    }
}

async fn run_crew(config: CrewConfig, args: IntakeArgs) -> CrewResult<()> {
    let intake = {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut prompts = io::stdout();
        collect_intake(args, &mut reader, &mut prompts)?
    };

    info!(
        product = %intake.product_label(),
        output = %intake.output_directory().display(),
        model = %config.llm.model,
        "Research requested"
    );

    let provider = create_provider(&config.llm)?;
    let mut tools = ToolSystem::new();
    tools
        .initialize(&config.tools)
        .await
        .map_err(|e| ConfigError::InvalidConfig(format!("tool setup failed: {e}")))?;
    info!(tools = ?tools.list_tools(), "Tools initialized");

    let capabilities: Arc<dyn CapabilityAdapter> = Arc::new(ProviderAdapter::new(
        provider,
        Arc::new(tools),
        CompletionSettings::from(&config.llm),
    ));

    let max_iterations = config.agents.max_iterations;
    let mut crew = build_research_crew(
        &intake,
        Some(Arc::clone(&capabilities)),
        |_stage, profile| -> Arc<dyn Agent> {
            Arc::new(
                LlmAgent::new(profile, Arc::clone(&capabilities))
                    .with_tools(ToolHandle::ALL)
                    .with_delegation(false)
                    .with_max_iterations(max_iterations),
            )
        },
    )?;

    let sink = FileSink::new(intake.output_directory());
    let output = crew.kickoff(&sink).await?;

    for task in &output.tasks {
        info!(
            stage = task.stage,
            agent = %task.agent_role,
            path = %task.output_path.display(),
            "Report written"
        );
    }

    println!("{}", output.final_output);
    Ok(())
}

fn handle_config_command(config: &CrewConfig, source: Option<&Path>, show: bool) -> CrewResult<()> {
    match source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }
    info!("Configuration is valid");

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| {
            CrewError::Config(ConfigError::InvalidConfig(format!(
                "cannot render configuration: {e}"
            )))
        })?;
        println!("{rendered}");
    }

    Ok(())
}
