pub mod classify;
pub mod pricing;
pub mod scripted;

use std::sync::Arc;

use weft_core::agent::ModelConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::LlmProvider;

pub use scripted::{EchoProvider, ScriptedProvider};

/// Create an LLM provider based on the provider name.
///
/// Vendor-backed providers implement [`LlmProvider`] and plug in at the
/// call sites; the factory only knows the built-in offline providers.
pub fn create_provider(config: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "echo" => Ok(Arc::new(EchoProvider::default())),
        "scripted" => Ok(Arc::new(ScriptedProvider::new())),
        other => Err(WeftError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.into(),
            model_id: "test".into(),
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[test]
    fn factory_knows_builtin_providers() {
        assert!(create_provider(&config("echo")).is_ok());
        assert!(create_provider(&config("scripted")).is_ok());
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        assert!(matches!(
            create_provider(&config("acme-cloud")),
            Err(WeftError::UnsupportedProvider(_))
        ));
    }
}
