//! Workflow executor.
//!
//! Drives a validated workflow to a terminal status. Node failures are
//! fail-fast and authoritative: the first failed node ends the run as
//! Failed with the history accumulated so far; `run` returns `Err` only
//! for structural problems found before dispatch starts.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use weft_core::agent::Agent;
use weft_core::error::{Result, WeftError};
use weft_core::execution::{NodeExecution, WorkflowExecution};
use weft_core::traits::{ActionDispatcher, LlmProvider, ScriptHost};
use weft_core::types::ExecutionStatus;
use weft_core::workflow::Workflow;
use weft_tools::ToolRegistry;

use crate::actions::LoggingDispatcher;
use crate::condition;
use crate::handlers;
use crate::scheduler::{EdgeOutcome, Scheduler};
use crate::store::ExecutionStore;

/// Options for a single workflow run.
#[derive(Default)]
pub struct RunOptions {
    /// Start from this node only, instead of every source node.
    pub start_node_id: Option<String>,
    /// Merged over the workflow's variables, caller wins.
    pub variable_overrides: HashMap<String, Value>,
}

pub struct WorkflowExecutor {
    pub(crate) llm: Arc<dyn LlmProvider>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) agents: HashMap<String, Agent>,
    pub(crate) actions: Arc<dyn ActionDispatcher>,
    pub(crate) script_host: Option<Arc<dyn ScriptHost>>,
    store: Arc<ExecutionStore>,
}

impl WorkflowExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            agents: HashMap::new(),
            actions: Arc::new(LoggingDispatcher::new()),
            script_host: None,
            store: Arc::new(ExecutionStore::new()),
        }
    }

    /// Make an agent resolvable by Agent nodes.
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.insert(agent.id.clone(), agent);
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        for agent in agents {
            self.agents.insert(agent.id.clone(), agent);
        }
        self
    }

    pub fn with_actions(mut self, actions: Arc<dyn ActionDispatcher>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    /// Share an externally owned store, e.g. one a supervisor polls and
    /// cancels through.
    pub fn with_store(mut self, store: Arc<ExecutionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<ExecutionStore> {
        &self.store
    }

    /// Execute a workflow to a terminal status.
    ///
    /// Returns the full execution record; inspect `status` and `error`
    /// for the outcome. `Err` is reserved for structural problems —
    /// an invalid graph or an unknown start node.
    pub async fn run(
        &self,
        workflow: &Workflow,
        input: Value,
        opts: RunOptions,
    ) -> Result<WorkflowExecution> {
        workflow.validate()?;

        let mut variables = workflow.variables.clone();
        variables.extend(opts.variable_overrides);

        let mut execution = WorkflowExecution::new(&workflow.id, variables);
        let cancel = self.store.register(&execution);
        let mut scheduler = Scheduler::new(workflow, opts.start_node_id.as_deref(), &input)?;

        info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            nodes = workflow.nodes.len(),
            "Starting workflow execution"
        );

        while let Some(ready) = scheduler.next_ready() {
            if cancel.is_cancelled() {
                warn!(execution_id = %execution.id, "Execution cancelled");
                execution.finish(
                    ExecutionStatus::Cancelled,
                    Some(WeftError::Cancelled.to_string()),
                );
                self.store.update(&execution);
                return Ok(execution);
            }

            let node = workflow
                .node(&ready.node_id)
                .ok_or_else(|| WeftError::NodeNotFound(ready.node_id.clone()))?;
            let node_input = combine_inputs(ready.inputs);
            let mut record = NodeExecution::start(&node.id, node_input.clone());

            match handlers::execute_node(
                self,
                node,
                node_input,
                &execution.variables,
                &execution.id,
                &cancel,
            )
            .await
            {
                Ok(output) => {
                    record.succeed(output.value.clone(), output.cost, output.tokens);
                    execution.record_node(record);

                    let outcomes: Vec<EdgeOutcome> = workflow
                        .edges
                        .iter()
                        .filter(|e| e.source == node.id)
                        .map(|edge| {
                            let fired = condition::evaluate_edge(
                                edge.condition.as_ref(),
                                &output.value,
                                &execution.variables,
                            );
                            EdgeOutcome {
                                target: edge.target.clone(),
                                payload: fired.then(|| output.value.clone()),
                            }
                        })
                        .collect();
                    scheduler.record_outcomes(outcomes);
                    self.store.update(&execution);
                }
                Err(WeftError::Cancelled) => {
                    record.fail(WeftError::Cancelled.to_string());
                    execution.record_node(record);
                    execution.finish(
                        ExecutionStatus::Cancelled,
                        Some(WeftError::Cancelled.to_string()),
                    );
                    self.store.update(&execution);
                    return Ok(execution);
                }
                Err(err) => {
                    let message = err.to_string();
                    error!(
                        execution_id = %execution.id,
                        node_id = %node.id,
                        error = %message,
                        "Node failed, ending execution"
                    );
                    record.fail(&message);
                    execution.record_node(record);
                    execution.finish(ExecutionStatus::Failed, Some(message));
                    self.store.update(&execution);
                    return Ok(execution);
                }
            }
        }

        execution.finish(ExecutionStatus::Completed, None);
        info!(
            execution_id = %execution.id,
            nodes_run = execution.metrics.node_count,
            duration_ms = execution.metrics.duration_ms,
            "Workflow execution completed"
        );
        self.store.update(&execution);
        Ok(execution)
    }
}

/// Combine the payloads delivered to one node. A single payload passes
/// through untouched; multiple object payloads shallow-merge with later
/// arrivals winning; anything mixed is wrapped under `branches`.
fn combine_inputs(mut inputs: Vec<Value>) -> Value {
    match inputs.len() {
        0 => Value::Null,
        1 => inputs.remove(0),
        _ if inputs.iter().all(Value::is_object) => {
            let mut merged = serde_json::Map::new();
            for input in inputs {
                if let Value::Object(map) = input {
                    merged.extend(map);
                }
            }
            Value::Object(merged)
        }
        _ => serde_json::json!({ "branches": inputs }),
    }
}
