//! Dataflow scheduling.
//!
//! In-degree per node is precomputed from the edge set; a node becomes
//! ready only when every incoming edge has resolved — fired with a
//! payload, or definitively not fired. No polling, and
//! multi-predecessor joins are correct by construction. Nodes whose
//! in-degree resolves without a single fired payload are skipped, and
//! the skip cascades downstream.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::workflow::Workflow;

/// A node whose dependencies have all resolved, with the payloads of the
/// edges that fired, in arrival order.
#[derive(Debug)]
pub struct ReadyNode {
    pub node_id: String,
    pub inputs: Vec<Value>,
}

/// Outcome of one completed node, as seen by one outgoing edge.
#[derive(Debug)]
pub struct EdgeOutcome {
    pub target: String,
    /// `Some` when the edge condition passed; the payload to deliver.
    pub payload: Option<Value>,
}

pub struct Scheduler {
    /// Unresolved incoming edges per node.
    remaining: HashMap<String, usize>,
    /// Fired payloads buffered until the target is ready.
    buffered: HashMap<String, Vec<Value>>,
    /// Outgoing adjacency, for cascading skips.
    targets: HashMap<String, Vec<String>>,
    /// Nodes already handed out or skipped. Each node runs at most once
    /// per execution; back-edges in a cyclic graph resolve here without
    /// re-enqueueing, so the run still terminates.
    resolved: HashSet<String>,
    ready: VecDeque<ReadyNode>,
}

impl Scheduler {
    /// Build the schedule for a workflow. With `start_node` given, only
    /// that node is seeded; otherwise every source node is, each with a
    /// clone of the initial input.
    pub fn new(
        workflow: &Workflow,
        start_node: Option<&str>,
        initial_input: &Value,
    ) -> Result<Self> {
        let mut remaining: HashMap<String, usize> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.clone(), 0))
            .collect();
        let mut targets: HashMap<String, Vec<String>> = HashMap::new();

        for edge in &workflow.edges {
            *remaining.entry(edge.target.clone()).or_default() += 1;
            targets
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }

        let mut ready = VecDeque::new();
        let mut resolved = HashSet::new();
        match start_node {
            Some(id) => {
                if workflow.node(id).is_none() {
                    return Err(WeftError::NodeNotFound(id.to_string()));
                }
                resolved.insert(id.to_string());
                ready.push_back(ReadyNode {
                    node_id: id.to_string(),
                    inputs: vec![initial_input.clone()],
                });
            }
            None => {
                for node in workflow.source_nodes() {
                    resolved.insert(node.id.clone());
                    ready.push_back(ReadyNode {
                        node_id: node.id.clone(),
                        inputs: vec![initial_input.clone()],
                    });
                }
            }
        }

        Ok(Self {
            remaining,
            buffered: HashMap::new(),
            targets,
            resolved,
            ready,
        })
    }

    /// Pull the next ready node, if any.
    pub fn next_ready(&mut self) -> Option<ReadyNode> {
        self.ready.pop_front()
    }

    /// Record a completed node's edge outcomes, releasing any targets
    /// whose dependencies are now fully resolved.
    pub fn record_outcomes(&mut self, outcomes: Vec<EdgeOutcome>) {
        for outcome in outcomes {
            self.resolve_edge(outcome.target, outcome.payload);
        }
    }

    fn resolve_edge(&mut self, target: String, payload: Option<Value>) {
        let remaining = match self.remaining.get_mut(&target) {
            Some(r) => r,
            None => return,
        };
        *remaining = remaining.saturating_sub(1);
        if let Some(payload) = payload {
            self.buffered.entry(target.clone()).or_default().push(payload);
        }
        if *remaining > 0 {
            return;
        }
        if !self.resolved.insert(target.clone()) {
            self.buffered.remove(&target);
            return;
        }

        let inputs = self.buffered.remove(&target).unwrap_or_default();
        if inputs.is_empty() {
            debug!(node_id = %target, "No incoming edge fired, skipping node");
            self.skip(target);
        } else {
            self.ready.push_back(ReadyNode {
                node_id: target,
                inputs,
            });
        }
    }

    /// Propagate a skip: every outgoing edge of a skipped node resolves
    /// without firing.
    fn skip(&mut self, node_id: String) {
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            for target in self.targets.get(&id).cloned().unwrap_or_default() {
                let remaining = match self.remaining.get_mut(&target) {
                    Some(r) => r,
                    None => continue,
                };
                *remaining = remaining.saturating_sub(1);
                if *remaining > 0 {
                    continue;
                }
                if !self.resolved.insert(target.clone()) {
                    self.buffered.remove(&target);
                    continue;
                }
                let inputs = self.buffered.remove(&target).unwrap_or_default();
                if inputs.is_empty() {
                    stack.push(target);
                } else {
                    self.ready.push_back(ReadyNode {
                        node_id: target,
                        inputs,
                    });
                }
            }
        }
    }
}
