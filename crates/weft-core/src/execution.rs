use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ExecutionId, ExecutionStatus, StepStatus, TokenUsage};

/// Aggregate metrics for a workflow execution, folded in as nodes
/// complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionMetrics {
    pub duration_ms: u64,
    pub node_count: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub total_cost: f64,
    pub total_tokens: u64,
}

/// Per-node metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    pub duration_ms: u64,
    pub cost: f64,
    pub tokens: u64,
}

/// One run of a workflow. Created at submission, mutated only by the
/// executor driving it, terminal once status leaves Running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Appended strictly in dispatch order.
    pub node_executions: Vec<NodeExecution>,
    /// Mutable copy seeded from the workflow's variables, merged with
    /// caller overrides.
    pub variables: HashMap<String, serde_json::Value>,
    pub metrics: ExecutionMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, variables: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            node_executions: Vec::new(),
            variables,
            metrics: ExecutionMetrics::default(),
            error: None,
        }
    }

    /// Transition to a terminal status and stamp the end time. The first
    /// terminal transition wins; later calls are ignored.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error = error;
        let finished = Utc::now();
        self.metrics.duration_ms = (finished - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished);
    }

    /// Fold one completed node's metrics into the aggregates.
    pub fn record_node(&mut self, node: NodeExecution) {
        self.metrics.node_count += 1;
        match node.status {
            StepStatus::Completed => self.metrics.success_count += 1,
            StepStatus::Failed => self.metrics.failure_count += 1,
            StepStatus::Running => {}
        }
        self.metrics.total_cost += node.metrics.cost;
        self.metrics.total_tokens += node.metrics.tokens;
        self.node_executions.push(node);
    }
}

/// One node dispatch. Immutable once its end timestamp is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: String,
    pub node_id: String,
    pub status: StepStatus,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metrics: NodeMetrics,
}

impl NodeExecution {
    pub fn start(node_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            status: StepStatus::Running,
            input,
            output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            metrics: NodeMetrics::default(),
        }
    }

    pub fn succeed(&mut self, output: serde_json::Value, cost: f64, tokens: u64) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.metrics.cost = cost;
        self.metrics.tokens = tokens;
        self.stamp_end();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.stamp_end();
    }

    fn stamp_end(&mut self) {
        let finished = Utc::now();
        self.metrics.duration_ms = (finished - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished);
    }
}

/// Aggregate metrics for an agent execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentMetrics {
    pub duration_ms: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub api_calls: u32,
    pub error_count: u32,
}

/// One run of the agent execution loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub id: ExecutionId,
    pub agent_id: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub status: ExecutionStatus,
    pub steps: Vec<ExecutionStep>,
    pub metrics: AgentMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AgentExecution {
    pub fn new(agent_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: ExecutionId::new(),
            agent_id: agent_id.into(),
            input: input.into(),
            output: None,
            status: ExecutionStatus::Running,
            steps: Vec::new(),
            metrics: AgentMetrics::default(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_usage(&mut self, usage: TokenUsage, cost: f64) {
        self.metrics.api_calls += 1;
        self.metrics.total_tokens += usage.total();
        self.metrics.total_cost += cost;
    }

    pub fn complete(&mut self, output: impl Into<String>) {
        self.output = Some(output.into());
        self.finish(ExecutionStatus::Completed, None);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.metrics.error_count += 1;
        self.finish(ExecutionStatus::Failed, Some(error.into()));
    }

    fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        let finished = Utc::now();
        self.metrics.duration_ms = (finished - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished);
    }
}

/// Kind of a single agent execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Plain LLM call with no tool involvement.
    LlmCall,
    /// LLM call that requested one or more tool calls.
    LlmToolCall,
    /// Direct tool execution.
    ToolCall,
    /// One delegated sub-task in a multi-agent run.
    Subtask,
    /// Final synthesis of sub-task outputs.
    Synthesis,
}

/// A single step inside an agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Free-form metadata, e.g. a human-readable description.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionStep {
    pub fn start(kind: StepKind, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: StepStatus::Running,
            input,
            output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.metadata.insert(
            "description".into(),
            serde_json::Value::String(description.into()),
        );
        self
    }

    pub fn succeed(&mut self, output: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_execution_single_terminal_transition() {
        let mut exec = WorkflowExecution::new("wf1", HashMap::new());
        assert_eq!(exec.status, ExecutionStatus::Running);

        exec.finish(ExecutionStatus::Completed, None);
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.finished_at.is_some());

        // A second transition is ignored.
        exec.finish(ExecutionStatus::Failed, Some("late".into()));
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.error.is_none());
    }

    #[test]
    fn record_node_folds_metrics() {
        let mut exec = WorkflowExecution::new("wf1", HashMap::new());

        let mut ok = NodeExecution::start("a", serde_json::json!({}));
        ok.succeed(serde_json::json!("out"), 0.5, 100);
        exec.record_node(ok);

        let mut bad = NodeExecution::start("b", serde_json::json!({}));
        bad.fail("boom");
        exec.record_node(bad);

        assert_eq!(exec.metrics.node_count, 2);
        assert_eq!(exec.metrics.success_count, 1);
        assert_eq!(exec.metrics.failure_count, 1);
        assert!((exec.metrics.total_cost - 0.5).abs() < f64::EPSILON);
        assert_eq!(exec.metrics.total_tokens, 100);
    }

    #[test]
    fn agent_execution_usage_accumulates() {
        let mut exec = AgentExecution::new("a1", "hi");
        exec.record_usage(TokenUsage::new(100, 20), 0.01);
        exec.record_usage(TokenUsage::new(200, 40), 0.02);
        assert_eq!(exec.metrics.api_calls, 2);
        assert_eq!(exec.metrics.total_tokens, 360);
        assert!((exec.metrics.total_cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn workflow_execution_serde_roundtrip_preserves_records() {
        let mut exec = WorkflowExecution::new("wf1", HashMap::new());
        let mut node = NodeExecution::start("a", serde_json::json!({"x": 1}));
        node.succeed(serde_json::json!({"y": 2}), 0.25, 42);
        exec.record_node(node);
        exec.finish(ExecutionStatus::Completed, None);

        let json = serde_json::to_string(&exec).unwrap();
        let parsed: WorkflowExecution = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, exec.id);
        assert_eq!(parsed.status, ExecutionStatus::Completed);
        assert_eq!(parsed.node_executions.len(), 1);
        assert_eq!(parsed.node_executions[0].id, exec.node_executions[0].id);
        assert_eq!(parsed.node_executions[0].status, StepStatus::Completed);
        assert_eq!(parsed.metrics, exec.metrics);
    }

    #[test]
    fn step_kind_serde_names() {
        assert_eq!(
            serde_json::to_value(StepKind::LlmToolCall).unwrap(),
            "llm_tool_call"
        );
        assert_eq!(serde_json::to_value(StepKind::LlmCall).unwrap(), "llm_call");
    }
}
