//! Per-kind node execution.
//!
//! Handler dispatch matches exhaustively on [`NodeConfig`]; adding a node
//! kind is a compile error until it is handled here.

use std::collections::HashMap;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use weft_agent::{AgentRunner, RunOptions as AgentRunOptions};
use weft_core::error::{Result, WeftError};
use weft_core::types::{ExecutionId, ExecutionStatus, ToolContext};
use weft_core::workflow::{ConditionStrategy, LoopKind, NodeConfig, WorkflowNode};

use crate::condition;
use crate::executor::WorkflowExecutor;

/// Result of one node handler.
pub struct HandlerOutput {
    pub value: Value,
    pub cost: f64,
    pub tokens: u64,
}

impl HandlerOutput {
    fn plain(value: Value) -> Self {
        Self {
            value,
            cost: 0.0,
            tokens: 0,
        }
    }
}

pub async fn execute_node(
    executor: &WorkflowExecutor,
    node: &WorkflowNode,
    input: Value,
    variables: &HashMap<String, Value>,
    execution_id: &ExecutionId,
    cancel: &CancellationToken,
) -> Result<HandlerOutput> {
    match &node.config {
        NodeConfig::Agent { agent_id } => {
            run_agent(executor, &node.id, agent_id, input, cancel).await
        }
        NodeConfig::Trigger { trigger_type } => Ok(HandlerOutput::plain(json!({
            "triggered": true,
            "trigger_type": trigger_type,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "input": input,
        }))),
        NodeConfig::Condition { strategy } => {
            let result = evaluate_strategy(executor, strategy, &input, variables).await?;
            debug!(node_id = %node.id, result, "Condition evaluated");
            Ok(HandlerOutput::plain(json!({
                "condition": serde_json::to_value(strategy)?,
                "result": result,
                "input": input,
            })))
        }
        NodeConfig::Action { action } => {
            let dispatch = executor.actions.dispatch(action.clone(), input);
            let ack = tokio::select! {
                result = dispatch => result?,
                _ = cancel.cancelled() => return Err(WeftError::Cancelled),
            };
            Ok(HandlerOutput::plain(ack))
        }
        NodeConfig::Tool { tool, args } => {
            let tool_input = if args.is_null() { input.clone() } else { args.clone() };
            let ctx = ToolContext::new(execution_id.clone(), cancel.clone());
            let result = executor.tools.execute(tool, tool_input, ctx).await?;
            if result.is_error {
                return Err(WeftError::ToolExecution {
                    tool: tool.clone(),
                    message: result.content,
                });
            }
            let value = serde_json::from_str(&result.content)
                .unwrap_or(Value::String(result.content));
            Ok(HandlerOutput::plain(value))
        }
        NodeConfig::Input | NodeConfig::Output => Ok(HandlerOutput::plain(input)),
        NodeConfig::Delay { amount, unit } => {
            let duration = unit.duration(*amount);
            debug!(node_id = %node.id, ?duration, "Delay node sleeping");
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(HandlerOutput::plain(input)),
                _ = cancel.cancelled() => Err(WeftError::Cancelled),
            }
        }
        NodeConfig::Loop {
            loop_kind,
            max_iterations,
        } => run_loop(loop_kind, *max_iterations, input, variables, cancel).await,
        // Merge and Split are scheduling concerns; by the time the
        // handler runs, the join has already combined its branch inputs
        // and fan-out is the executor cloning the output per edge.
        NodeConfig::Merge | NodeConfig::Split => Ok(HandlerOutput::plain(input)),
    }
}

async fn run_agent(
    executor: &WorkflowExecutor,
    node_id: &str,
    agent_id: &str,
    input: Value,
    cancel: &CancellationToken,
) -> Result<HandlerOutput> {
    let agent = executor
        .agents
        .get(agent_id)
        .ok_or_else(|| WeftError::AgentNotFound(agent_id.to_string()))?;
    let text = match &input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let runner = AgentRunner::new(executor.llm.clone(), executor.tools.clone());
    let run = runner
        .run(
            agent,
            &text,
            AgentRunOptions {
                cancel: cancel.clone(),
                ..Default::default()
            },
        )
        .await;

    let cost = run.metrics.total_cost;
    let tokens = run.metrics.total_tokens;
    if cancel.is_cancelled() {
        return Err(WeftError::Cancelled);
    }
    match run.status {
        ExecutionStatus::Cancelled => Err(WeftError::Cancelled),
        ExecutionStatus::Failed => Err(WeftError::NodeExecution {
            node_id: node_id.to_string(),
            message: run
                .error
                .clone()
                .unwrap_or_else(|| "agent run failed".to_string()),
        }),
        _ => {
            info!(node_id, agent_id, cost, tokens, "Agent node completed");
            Ok(HandlerOutput {
                value: json!({
                    "result": run.output,
                    "execution": serde_json::to_value(&run)?,
                }),
                cost,
                tokens,
            })
        }
    }
}

async fn evaluate_strategy(
    executor: &WorkflowExecutor,
    strategy: &ConditionStrategy,
    input: &Value,
    variables: &HashMap<String, Value>,
) -> Result<bool> {
    match strategy {
        ConditionStrategy::Expression { expression } => {
            Ok(condition::evaluate_expression(expression, &scope(input, variables)))
        }
        ConditionStrategy::Comparison {
            field,
            operator,
            value,
        } => {
            let resolved = condition::resolve_field(field, input, variables);
            Ok(condition::compare(*operator, resolved, value))
        }
        ConditionStrategy::Script { script } => match &executor.script_host {
            Some(host) => {
                host.eval_predicate(script.clone(), scope(input, variables))
                    .await
            }
            None => Err(WeftError::ScriptHostMissing),
        },
    }
}

/// Expression scope: the node input under `input`, variables at top
/// level.
fn scope(input: &Value, variables: &HashMap<String, Value>) -> Value {
    let mut scope = serde_json::Map::new();
    for (key, value) in variables {
        scope.insert(key.clone(), value.clone());
    }
    scope.insert("input".to_string(), input.clone());
    Value::Object(scope)
}

async fn run_loop(
    kind: &LoopKind,
    max_iterations: usize,
    input: Value,
    variables: &HashMap<String, Value>,
    cancel: &CancellationToken,
) -> Result<HandlerOutput> {
    let mut results = Vec::new();
    match kind {
        LoopKind::For { count } => {
            for iteration in 0..(*count).min(max_iterations) {
                if cancel.is_cancelled() {
                    return Err(WeftError::Cancelled);
                }
                results.push(json!({"iteration": iteration, "input": input}));
            }
        }
        LoopKind::While { condition } => {
            for iteration in 0..max_iterations {
                if cancel.is_cancelled() {
                    return Err(WeftError::Cancelled);
                }
                let mut pass_scope = scope(&input, variables);
                pass_scope["iteration"] = json!(iteration);
                if !condition::evaluate_expression(condition, &pass_scope) {
                    break;
                }
                results.push(json!({"iteration": iteration, "input": input}));
            }
        }
        LoopKind::ForEach { source } => {
            let seq = if source.is_empty() {
                Some(&input)
            } else {
                condition::resolve_path(&input, source)
            };
            let items = match seq {
                Some(Value::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => vec![],
            };
            for (iteration, item) in items.into_iter().take(max_iterations).enumerate() {
                if cancel.is_cancelled() {
                    return Err(WeftError::Cancelled);
                }
                results.push(json!({"iteration": iteration, "item": item}));
            }
        }
    }
    Ok(HandlerOutput::plain(json!({
        "iterations": results.len(),
        "results": results,
    })))
}
