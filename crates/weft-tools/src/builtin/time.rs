use chrono::Utc;
use futures::future::BoxFuture;

use weft_core::error::Result;
use weft_core::traits::Tool;
use weft_core::types::{ToolContext, ToolResult};

pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }
    fn description(&self) -> &str {
        "Get the current UTC time as an RFC 3339 timestamp."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async { Ok(ToolResult::success(Utc::now().to_rfc3339())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use weft_core::types::ExecutionId;

    #[tokio::test]
    async fn returns_parseable_timestamp() {
        let ctx = ToolContext::new(ExecutionId::new(), CancellationToken::new());
        let result = CurrentTimeTool
            .execute(serde_json::json!({}), ctx)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(chrono::DateTime::parse_from_rfc3339(&result.content).is_ok());
    }
}
