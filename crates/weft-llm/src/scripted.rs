//! Offline providers: a deterministic scripted provider for tests and a
//! trivial echo provider for dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tracing::debug;

use weft_core::agent::ModelConfig;
use weft_core::error::Result;
use weft_core::traits::LlmProvider;
use weft_core::types::{ChatMessage, ChatResponse, Completion, TokenUsage, ToolDefinition};

use crate::classify::provider_error;

/// A provider that replays pre-scripted responses in order.
///
/// When a queue runs out, the corresponding fallback (if set) is repeated
/// indefinitely; otherwise the call fails with a provider error.
pub struct ScriptedProvider {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    chat: VecDeque<ChatResponse>,
    chat_fallback: Option<ChatResponse>,
    generate: VecDeque<Completion>,
    generate_fallback: Option<Completion>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn enqueue_chat(&self, response: ChatResponse) {
        self.inner.lock().unwrap().chat.push_back(response);
    }

    /// Repeated once the chat queue is exhausted.
    pub fn set_chat_fallback(&self, response: ChatResponse) {
        self.inner.lock().unwrap().chat_fallback = Some(response);
    }

    pub fn enqueue_generate(&self, completion: Completion) {
        self.inner.lock().unwrap().generate.push_back(completion);
    }

    /// Convenience: enqueue a plain-text completion with nominal usage.
    pub fn enqueue_text(&self, text: impl Into<String>) {
        self.enqueue_generate(Completion {
            content: text.into(),
            usage: TokenUsage::new(10, 10),
        });
    }

    /// Repeated once the generate queue is exhausted.
    pub fn set_generate_fallback(&self, completion: Completion) {
        self.inner.lock().unwrap().generate_fallback = Some(completion);
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for ScriptedProvider {
    fn generate(&self, _config: &ModelConfig, _prompt: &str) -> BoxFuture<'_, Result<Completion>> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .generate
                .pop_front()
                .or_else(|| inner.generate_fallback.clone())
        };
        Box::pin(async move {
            next.ok_or_else(|| provider_error(None, "scripted provider: generate script exhausted"))
        })
    }

    fn chat(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatResponse>> {
        debug!(history_len = messages.len(), "scripted chat call");
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .chat
                .pop_front()
                .or_else(|| inner.chat_fallback.clone())
        };
        Box::pin(async move {
            next.ok_or_else(|| provider_error(None, "scripted provider: chat script exhausted"))
        })
    }
}

/// A provider that echoes its input back. Never requests tools.
#[derive(Debug, Default)]
pub struct EchoProvider;

fn approx_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}

impl LlmProvider for EchoProvider {
    fn generate(&self, _config: &ModelConfig, prompt: &str) -> BoxFuture<'_, Result<Completion>> {
        let content = prompt.to_string();
        Box::pin(async move {
            let usage = TokenUsage::new(approx_tokens(&content), approx_tokens(&content));
            Ok(Completion { content, usage })
        })
    }

    fn chat(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatResponse>> {
        Box::pin(async move {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == weft_core::types::Role::User)
                .map(|m| m.text())
                .unwrap_or_default();
            let usage = TokenUsage::new(approx_tokens(&last_user), approx_tokens(&last_user));
            Ok(ChatResponse::text(last_user, usage))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::types::ToolCallRequest;

    fn config() -> ModelConfig {
        ModelConfig {
            provider: "scripted".into(),
            model_id: "test".into(),
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn scripted_replays_in_order() {
        let p = ScriptedProvider::new();
        p.enqueue_text("first");
        p.enqueue_text("second");

        let a = p.generate(&config(), "x").await.unwrap();
        let b = p.generate(&config(), "x").await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert!(p.generate(&config(), "x").await.is_err());
    }

    #[tokio::test]
    async fn chat_fallback_repeats() {
        let p = ScriptedProvider::new();
        p.set_chat_fallback(ChatResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "c1".into(),
                name: "search".into(),
                arguments: serde_json::json!({}),
            }],
            usage: TokenUsage::default(),
        });

        for _ in 0..3 {
            let r = p.chat(&config(), vec![], &[]).await.unwrap();
            assert!(r.requests_tools());
        }
    }

    #[tokio::test]
    async fn echo_returns_last_user_text() {
        let p = EchoProvider;
        let r = p
            .chat(
                &config(),
                vec![
                    ChatMessage::system("sys"),
                    ChatMessage::user("hello there"),
                ],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(r.content.as_deref(), Some("hello there"));
        assert!(!r.requests_tools());
    }
}
