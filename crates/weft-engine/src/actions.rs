//! Default action dispatcher.
//!
//! Action nodes are side-effecting operations handed to an external
//! collaborator. The default dispatcher logs the request and returns a
//! structured acknowledgement without performing the side effect, which
//! keeps workflow runs safe out of the box. Deployments with real
//! outbound integrations supply their own [`ActionDispatcher`].

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::info;

use weft_core::error::Result;
use weft_core::traits::ActionDispatcher;
use weft_core::workflow::ActionConfig;

/// Dispatcher that records each action and acknowledges it as sent.
#[derive(Default)]
pub struct LoggingDispatcher;

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl ActionDispatcher for LoggingDispatcher {
    fn dispatch(&self, action: ActionConfig, input: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let ack = match action {
                ActionConfig::SendEmail { to, subject, body } => {
                    info!(%to, %subject, "Dispatching email action");
                    json!({
                        "action": "send_email",
                        "to": to,
                        "subject": subject,
                        "body_length": body.len(),
                        "status": "sent",
                    })
                }
                ActionConfig::CallApi { url, method, body } => {
                    info!(%url, %method, "Dispatching API call action");
                    json!({
                        "action": "call_api",
                        "url": url,
                        "method": method,
                        "has_body": body.is_some(),
                        "status": "sent",
                    })
                }
                ActionConfig::CreateFile { path, content } => {
                    info!(%path, "Dispatching file creation action");
                    json!({
                        "action": "create_file",
                        "path": path,
                        "content_length": content.len(),
                        "status": "sent",
                    })
                }
                ActionConfig::SendNotification { channel, message } => {
                    info!(%channel, "Dispatching notification action");
                    json!({
                        "action": "send_notification",
                        "channel": channel,
                        "message": message,
                        "status": "sent",
                    })
                }
            };
            let mut ack = ack;
            ack["dispatched_at"] = json!(Utc::now().to_rfc3339());
            ack["input"] = input;
            Ok(ack)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn email_action_acknowledged() {
        let dispatcher = LoggingDispatcher::new();
        let ack = dispatcher
            .dispatch(
                ActionConfig::SendEmail {
                    to: "ops@example.com".into(),
                    subject: "alert".into(),
                    body: "disk full".into(),
                },
                json!({"severity": "high"}),
            )
            .await
            .unwrap();

        assert_eq!(ack["action"], "send_email");
        assert_eq!(ack["status"], "sent");
        assert_eq!(ack["input"]["severity"], "high");
    }

    #[tokio::test]
    async fn api_call_defaults_reported() {
        let dispatcher = LoggingDispatcher::new();
        let ack = dispatcher
            .dispatch(
                ActionConfig::CallApi {
                    url: "https://example.com/hook".into(),
                    method: "POST".into(),
                    body: None,
                },
                Value::Null,
            )
            .await
            .unwrap();

        assert_eq!(ack["action"], "call_api");
        assert_eq!(ack["has_body"], false);
    }
}
