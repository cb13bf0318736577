use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use weft_core::agent::Agent;
use weft_core::config::EngineConfig;
use weft_core::types::ExecutionStatus;
use weft_core::workflow::Workflow;
use weft_engine::{RunOptions, WorkflowExecutor};
use weft_llm::create_provider;
use weft_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "weft", version, about = "Workflow and agent orchestration engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow file without running it
    Validate {
        /// Workflow bundle (JSON)
        file: PathBuf,
    },
    /// Execute a workflow to completion
    Run {
        /// Workflow bundle (JSON)
        file: PathBuf,
        /// Initial input, parsed as JSON when possible
        #[arg(short, long, default_value = "")]
        input: String,
        /// Start from this node instead of the graph's source nodes
        #[arg(long)]
        start_node: Option<String>,
        /// Variable override, `key=value`, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
}

/// On-disk workflow format: the graph plus the agents its Agent nodes
/// reference.
#[derive(Deserialize)]
struct WorkflowBundle {
    workflow: Workflow,
    #[serde(default)]
    agents: Vec<Agent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        EngineConfig::load(&cli.config)?
    } else {
        EngineConfig::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone())),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Validate { file } => validate(&file),
        Commands::Run {
            file,
            input,
            start_node,
            vars,
        } => run(&config, &file, &input, start_node, &vars).await,
    }
}

fn load_bundle(path: &Path) -> anyhow::Result<WorkflowBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing workflow file {}", path.display()))
}

fn validate(file: &Path) -> anyhow::Result<()> {
    let bundle = load_bundle(file)?;
    bundle.workflow.validate()?;

    let known: Vec<&str> = bundle.agents.iter().map(|a| a.id.as_str()).collect();
    for node in &bundle.workflow.nodes {
        if let weft_core::workflow::NodeConfig::Agent { agent_id } = &node.config {
            anyhow::ensure!(
                known.contains(&agent_id.as_str()),
                "node '{}' references agent '{}' not present in the bundle",
                node.id,
                agent_id
            );
        }
    }

    println!(
        "OK: {} ({} nodes, {} edges, {} agents)",
        bundle.workflow.name,
        bundle.workflow.nodes.len(),
        bundle.workflow.edges.len(),
        bundle.agents.len()
    );
    Ok(())
}

async fn run(
    config: &EngineConfig,
    file: &Path,
    input: &str,
    start_node: Option<String>,
    vars: &[String],
) -> anyhow::Result<()> {
    let bundle = load_bundle(file)?;

    let provider = create_provider(&config.model)?;
    let tools = Arc::new(ToolRegistry::with_builtins());
    let executor = WorkflowExecutor::new(provider, tools).with_agents(bundle.agents);

    let opts = RunOptions {
        start_node_id: start_node,
        variable_overrides: parse_vars(vars)?,
    };
    let input = parse_value(input);

    info!(workflow = %bundle.workflow.name, "Running workflow");
    let execution = executor.run(&bundle.workflow, input, opts).await?;

    for node in &execution.node_executions {
        println!(
            "  {:<24} {:?} ({} ms)",
            node.node_id, node.status, node.metrics.duration_ms
        );
    }
    println!(
        "{:?} in {} ms: {} nodes, {} tokens, ${:.4}",
        execution.status,
        execution.metrics.duration_ms,
        execution.metrics.node_count,
        execution.metrics.total_tokens,
        execution.metrics.total_cost
    );
    if let Some(error) = &execution.error {
        eprintln!("error: {}", error);
    }

    if execution.status == ExecutionStatus::Completed {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn parse_vars(vars: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    let mut overrides = HashMap::new();
    for var in vars {
        let (key, value) = var
            .split_once('=')
            .with_context(|| format!("--var '{}' is not KEY=VALUE", var))?;
        overrides.insert(key.to_string(), parse_value(value));
    }
    Ok(overrides)
}

/// Parse as JSON when possible, else keep as a string.
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
