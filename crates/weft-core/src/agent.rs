use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A configured LLM-backed actor following one of five execution
/// archetypes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub archetype: AgentArchetype,
    pub model: ModelConfig,
    #[serde(default)]
    pub prompts: Vec<PromptTemplate>,
    #[serde(default)]
    pub tools: Vec<ToolBinding>,
    #[serde(default)]
    pub limits: ExecutionLimits,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Agent {
    /// Render and join all prompt templates into a single system prompt.
    pub fn system_prompt(&self) -> String {
        self.prompts
            .iter()
            .map(PromptTemplate::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Resolve a tool binding by its declared name.
    pub fn tool_binding(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Execution archetype, selected by `agent.archetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentArchetype {
    /// Single LLM call, raw completion text out.
    PromptBased,
    /// Iterative tool-calling loop bounded by `max_steps`.
    ToolUsing,
    /// Fixed sub-task decomposition then synthesis, sequential.
    MultiAgent,
    /// Bridges embedded workflow execution results into a textual answer.
    Workflow,
    /// Single decide-then-execute step.
    Autonomous,
}

/// Model configuration passed to the LLM provider on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "echo".to_string()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}

/// A named prompt template with `{{variable}}` substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            variables: HashMap::new(),
        }
    }

    /// Substitute `{{name}}` placeholders from the template's variables.
    /// Unknown placeholders are left in place.
    pub fn render(&self) -> String {
        let mut out = self.content.clone();
        for (key, value) in &self.variables {
            out = out.replace(&format!("{{{{{}}}}}", key), value);
        }
        out
    }
}

/// A tool made available to an agent. `tool_type` is the implementation
/// key used to resolve a concrete executor in the tool registry; `name`
/// is what the model sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBinding {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub tool_type: String,
}

/// Execution limits for an agent run.
///
/// Only `max_steps` is enforced by the loop. `timeout_secs` and `retry`
/// are carried in the model for callers that want them; the engine itself
/// fails fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            timeout_secs: None,
            retry: RetryPolicy::default(),
        }
    }
}

fn default_max_steps() -> usize {
    10
}

/// Declared retry policy. Advisory only; see `ExecutionLimits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_backoff_ms() -> u64 {
    1000
}

/// Memory configuration for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    100
}
