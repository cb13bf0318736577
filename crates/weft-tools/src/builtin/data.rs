use futures::future::BoxFuture;
use serde::Deserialize;

use weft_core::error::{Result, WeftError};
use weft_core::traits::Tool;
use weft_core::types::{ToolContext, ToolResult};

pub struct JsonQueryTool;

#[derive(Deserialize)]
struct JsonQueryInput {
    json: String,
    path: String,
}

impl Tool for JsonQueryTool {
    fn name(&self) -> &str {
        "json_query"
    }
    fn description(&self) -> &str {
        "Query a JSON value by dot-notation path (e.g. 'foo.bar[0].baz')."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "json": { "type": "string", "description": "JSON string to query" },
                "path": { "type": "string", "description": "Dot-notation path (e.g. 'items[0].name')" }
            },
            "required": ["json", "path"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: JsonQueryInput = serde_json::from_value(input)
                .map_err(|e| WeftError::ToolValidation(e.to_string()))?;
            let value: serde_json::Value = serde_json::from_str(&p.json)
                .map_err(|e| WeftError::ToolValidation(format!("invalid JSON: {}", e)))?;
            match query(&value, &p.path) {
                Some(found) => Ok(ToolResult::success(found.to_string())),
                None => Ok(ToolResult::error(format!("path '{}' not found", p.path))),
            }
        })
    }
}

/// Dot-path traversal with `[index]` array access.
fn query<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = parse_segment(segment);
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for idx in indices {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

fn parse_segment(segment: &str) -> (&str, Vec<usize>) {
    match segment.find('[') {
        None => (segment, vec![]),
        Some(pos) => {
            let key = &segment[..pos];
            let indices = segment[pos..]
                .split('[')
                .filter_map(|part| part.strip_suffix(']'))
                .filter_map(|n| n.parse().ok())
                .collect();
            (key, indices)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use weft_core::types::ExecutionId;

    fn ctx() -> ToolContext {
        ToolContext::new(ExecutionId::new(), CancellationToken::new())
    }

    #[test]
    fn query_nested_paths() {
        let value = serde_json::json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
        assert_eq!(query(&value, "a.b[1].c"), Some(&serde_json::json!(2)));
        assert_eq!(query(&value, "a.b[5].c"), None);
        assert_eq!(query(&value, "missing"), None);
    }

    #[tokio::test]
    async fn tool_returns_query_result() {
        let result = JsonQueryTool
            .execute(
                serde_json::json!({
                    "json": r#"{"items": [{"name": "alpha"}]}"#,
                    "path": "items[0].name"
                }),
                ctx(),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "\"alpha\"");
    }

    #[tokio::test]
    async fn missing_path_is_a_tool_error_result() {
        let result = JsonQueryTool
            .execute(
                serde_json::json!({"json": "{}", "path": "nope"}),
                ctx(),
            )
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
