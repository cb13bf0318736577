use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// A directed graph of typed nodes and conditioned edges plus shared
/// variables. Immutable once execution starts; executions work on copies
/// of the variable map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

impl Workflow {
    /// Check structural invariants: node ids unique, every edge endpoint
    /// references an existing node.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(WeftError::InvalidWorkflow(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }
        for edge in &self.edges {
            if !seen.contains(edge.source.as_str()) {
                return Err(WeftError::InvalidWorkflow(format!(
                    "edge '{}' references unknown source node '{}'",
                    edge.id, edge.source
                )));
            }
            if !seen.contains(edge.target.as_str()) {
                return Err(WeftError::InvalidWorkflow(format!(
                    "edge '{}' references unknown target node '{}'",
                    edge.id, edge.target
                )));
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes with no incoming edge; a workflow may have several.
    pub fn source_nodes(&self) -> Vec<&WorkflowNode> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .collect()
    }
}

/// 2D layout position. Display-only; has no effect on execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single vertex in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Position,
    pub config: NodeConfig,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            position: Position::default(),
            config,
        }
    }
}

/// Closed set of node kinds with their kind-specific configuration.
///
/// Dispatch over this enum is exhaustive; there is no unknown-kind
/// failure at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Delegates to the agent execution loop.
    Agent { agent_id: String },
    /// Entry-point passthrough; source nodes only.
    Trigger {
        #[serde(default = "default_trigger_type")]
        trigger_type: String,
    },
    /// Boolean evaluation; downstream gating is the executor's job.
    Condition {
        #[serde(flatten)]
        strategy: ConditionStrategy,
    },
    /// Side-effecting operation dispatched to an external collaborator.
    Action {
        #[serde(flatten)]
        action: ActionConfig,
    },
    /// Direct tool invocation, outside any agent loop.
    Tool {
        tool: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Identity passthrough for graph readability.
    Input,
    /// Identity passthrough for graph readability.
    Output,
    /// Suspends for `amount × unit` before passing its input through.
    Delay { amount: u64, unit: DelayUnit },
    /// Bounded iteration.
    Loop {
        #[serde(flatten)]
        loop_kind: LoopKind,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
    /// Join barrier: waits for every incoming branch, then combines their
    /// payloads.
    Merge,
    /// Fan-out: the payload is cloned to every outgoing branch.
    Split,
}

fn default_trigger_type() -> String {
    "manual".to_string()
}

fn default_max_iterations() -> usize {
    100
}

/// How a Condition node computes its boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConditionStrategy {
    /// A single boolean expression over input + variables, e.g.
    /// `status == "ok"` or `score > 5`.
    Expression { expression: String },
    /// Structured comparison against a dot-path field of the input.
    Comparison {
        field: String,
        operator: ConditionOperator,
        #[serde(default)]
        value: serde_json::Value,
    },
    /// Arbitrary predicate code, delegated to the configured ScriptHost.
    /// Sandboxing is the host's concern.
    Script { script: String },
}

/// Fixed set of side-effecting action operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    SendEmail {
        to: String,
        subject: String,
        #[serde(default)]
        body: String,
    },
    CallApi {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
    CreateFile {
        path: String,
        #[serde(default)]
        content: String,
    },
    SendNotification {
        channel: String,
        message: String,
    },
}

fn default_method() -> String {
    "POST".to_string()
}

/// Time unit for Delay nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    pub fn duration(&self, amount: u64) -> std::time::Duration {
        let per_unit_ms: u64 = match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
        };
        std::time::Duration::from_millis(amount.saturating_mul(per_unit_ms))
    }
}

/// Iteration strategies for Loop nodes. All are capped by the node's
/// `max_iterations` so termination is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "loop", rename_all = "snake_case")]
pub enum LoopKind {
    /// Fixed iteration count.
    For { count: usize },
    /// Re-evaluates an expression each pass against
    /// `{input, iteration}` + variables.
    While { condition: String },
    /// One element per pass from a sequence-typed field of the input
    /// (the whole input when `source` is empty).
    ForEach {
        #[serde(default)]
        source: String,
    },
}

/// A directed connection between two nodes, optionally gated by a
/// condition on the source node's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Named ports for multi-port nodes; unused by single-port nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
}

impl WorkflowEdge {
    /// Create an unconditional edge.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            condition: None,
        }
    }

    /// Create a conditionally gated edge.
    pub fn gated(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        condition: EdgeCondition,
    ) -> Self {
        Self {
            condition: Some(condition),
            ..Self::new(id, source, target)
        }
    }
}

/// Field-path comparison gating an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCondition {
    /// Dot-path into the source node's output (falls back to workflow
    /// variables when the root key is absent from the output).
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl EdgeCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Comparison operators for edge and node conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    Exists,
    NotExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_workflow() -> Workflow {
        Workflow {
            id: "wf1".into(),
            name: "test".into(),
            nodes: vec![
                WorkflowNode::new("a", NodeConfig::Input),
                WorkflowNode::new("b", NodeConfig::Output),
            ],
            edges: vec![WorkflowEdge::new("e1", "a", "b")],
            variables: HashMap::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_graph() {
        assert!(two_node_workflow().validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let mut wf = two_node_workflow();
        wf.nodes.push(WorkflowNode::new("a", NodeConfig::Input));
        assert!(matches!(wf.validate(), Err(WeftError::InvalidWorkflow(_))));
    }

    #[test]
    fn validate_rejects_dangling_edges() {
        let mut wf = two_node_workflow();
        wf.edges.push(WorkflowEdge::new("e2", "a", "missing"));
        assert!(matches!(wf.validate(), Err(WeftError::InvalidWorkflow(_))));
    }

    #[test]
    fn source_nodes_have_no_incoming_edge() {
        let wf = two_node_workflow();
        let sources = wf.source_nodes();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "a");
    }

    #[test]
    fn delay_unit_durations() {
        assert_eq!(
            DelayUnit::Seconds.duration(2),
            std::time::Duration::from_secs(2)
        );
        assert_eq!(
            DelayUnit::Minutes.duration(1),
            std::time::Duration::from_secs(60)
        );
        assert_eq!(
            DelayUnit::Days.duration(1),
            std::time::Duration::from_secs(86_400)
        );
    }

    #[test]
    fn delay_duration_saturates_on_huge_amounts() {
        assert_eq!(
            DelayUnit::Days.duration(u64::MAX),
            std::time::Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn node_config_serde_tagging() {
        let node = WorkflowNode::new(
            "d1",
            NodeConfig::Delay {
                amount: 5,
                unit: DelayUnit::Seconds,
            },
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["config"]["kind"], "delay");
        assert_eq!(json["config"]["unit"], "seconds");

        let parsed: WorkflowNode = serde_json::from_value(json).unwrap();
        assert!(matches!(
            parsed.config,
            NodeConfig::Delay { amount: 5, .. }
        ));
    }

    #[test]
    fn condition_strategy_flattens_into_config() {
        let json = serde_json::json!({
            "id": "c1",
            "config": {
                "kind": "condition",
                "strategy": "comparison",
                "field": "result",
                "operator": "equals",
                "value": true
            }
        });
        let node: WorkflowNode = serde_json::from_value(json).unwrap();
        match node.config {
            NodeConfig::Condition {
                strategy: ConditionStrategy::Comparison { field, operator, .. },
            } => {
                assert_eq!(field, "result");
                assert_eq!(operator, ConditionOperator::Equals);
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }
}
