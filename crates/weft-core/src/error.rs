use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable categories for LLM provider failures.
///
/// Providers report all kinds of vendor-specific messages; callers only ever
/// see one of these codes plus the original message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    InvalidCredentials,
    QuotaExceeded,
    ContentFiltered,
    MalformedRequest,
    ServerError,
}

impl ProviderErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContentFiltered => "content_filtered",
            Self::MalformedRequest => "malformed_request",
            Self::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
pub enum WeftError {
    // LLM errors
    #[error("LLM provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    // Tool errors
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("tool input validation failed: {0}")]
    ToolValidation(String),

    // Agent errors
    #[error("maximum iterations ({0}) reached without completion")]
    MaxIterationsExceeded(usize),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    // Workflow errors
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("node '{0}' not found in workflow")]
    NodeNotFound(String),

    #[error("node '{node_id}' failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("condition evaluation failed: {0}")]
    Condition(String),

    #[error("script host not configured (scripted condition requires one)")]
    ScriptHostMissing,

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_codes_are_stable() {
        assert_eq!(ProviderErrorKind::InvalidCredentials.code(), "invalid_credentials");
        assert_eq!(ProviderErrorKind::QuotaExceeded.code(), "quota_exceeded");
        assert_eq!(ProviderErrorKind::ContentFiltered.code(), "content_filtered");
        assert_eq!(ProviderErrorKind::MalformedRequest.code(), "malformed_request");
        assert_eq!(ProviderErrorKind::ServerError.code(), "server_error");
    }

    #[test]
    fn max_iterations_message_names_the_limit() {
        let e = WeftError::MaxIterationsExceeded(5);
        let msg = e.to_string();
        assert!(msg.contains("maximum iterations"));
        assert!(msg.contains('5'));
    }
}
