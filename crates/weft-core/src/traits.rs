use futures::future::BoxFuture;

use crate::agent::ModelConfig;
use crate::error::Result;
use crate::types::{
    ChatMessage, ChatResponse, Completion, ToolContext, ToolDefinition, ToolResult,
};
use crate::workflow::{ActionConfig, Workflow};

/// LLM provider — uniform generate/chat contract across vendors.
pub trait LlmProvider: Send + Sync + 'static {
    /// Single-prompt completion.
    fn generate(&self, config: &ModelConfig, prompt: &str) -> BoxFuture<'_, Result<Completion>>;

    /// Chat with message history and tool schemas; the response carries
    /// either final content or requested tool calls.
    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatResponse>>;
}

/// Tool — extensible named capability.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls and node configs).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}

/// Sink for side-effecting Action nodes (email, API calls, files,
/// notifications). Returns the collaborator's acknowledgement payload.
pub trait ActionDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        action: ActionConfig,
        input: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Host for scripted condition predicates. Sandboxing is the host's
/// concern.
pub trait ScriptHost: Send + Sync + 'static {
    /// Evaluate a predicate against a scope object
    /// (`{input, variables}`).
    fn eval_predicate(&self, script: String, scope: serde_json::Value)
        -> BoxFuture<'_, Result<bool>>;
}

/// Workflow persistence — save/load contract. Durability is not
/// guaranteed; the default implementation is in-memory.
pub trait WorkflowStore: Send + Sync + 'static {
    fn save(&self, workflow: Workflow) -> BoxFuture<'_, Result<()>>;

    fn load(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>>;
}
