//! Edge and node condition evaluation.
//!
//! Evaluation is deliberately forgiving: an absent condition, an
//! unparseable comparison, or a type mismatch all default to "pass" so
//! that unconditional and half-configured edges behave transparently.

use std::collections::HashMap;

use serde_json::Value;

use weft_core::workflow::{ConditionOperator, EdgeCondition};

/// Evaluate an edge condition against a node's output and the workflow
/// variables. `None` — an unconditional edge — always passes.
pub fn evaluate_edge(
    condition: Option<&EdgeCondition>,
    output: &Value,
    variables: &HashMap<String, Value>,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let resolved = resolve_field(&condition.field, output, variables);
    compare(condition.operator, resolved, &condition.value)
}

/// Resolve a dot-path field against the output, falling back to the
/// workflow variables when the root key is absent from the output.
pub fn resolve_field<'a>(
    field: &str,
    output: &'a Value,
    variables: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    if let Some(found) = resolve_path(output, field) {
        return Some(found);
    }
    let first_segment = field.split('.').next().unwrap_or(field);
    let (root, _) = split_indices(first_segment);
    let var = variables.get(root)?;
    let rest = field[root.len()..].trim_start_matches('.');
    if rest.is_empty() {
        Some(var)
    } else {
        resolve_path(var, rest)
    }
}

/// Dot-path traversal with `[index]` array access.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(segment);
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for idx in indices {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    match segment.find('[') {
        None => (segment, vec![]),
        Some(pos) => {
            let indices = segment[pos..]
                .split('[')
                .filter_map(|part| part.strip_suffix(']'))
                .filter_map(|n| n.parse().ok())
                .collect();
            (&segment[..pos], indices)
        }
    }
}

/// Apply a comparison operator to a resolved field.
///
/// Comparisons that cannot be carried out (string compared as a number,
/// containment on a non-container) default to true — the
/// availability-over-correctness trade-off.
pub fn compare(operator: ConditionOperator, resolved: Option<&Value>, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => resolved.is_some_and(|v| v == expected),
        ConditionOperator::NotEquals => resolved.map_or(true, |v| v != expected),
        ConditionOperator::GreaterThan => match (resolved.and_then(Value::as_f64), expected.as_f64()) {
            (Some(actual), Some(threshold)) => actual > threshold,
            (None, _) if resolved.is_none() => false,
            _ => true,
        },
        ConditionOperator::LessThan => match (resolved.and_then(Value::as_f64), expected.as_f64()) {
            (Some(actual), Some(threshold)) => actual < threshold,
            (None, _) if resolved.is_none() => false,
            _ => true,
        },
        ConditionOperator::Contains => contains(resolved, expected).unwrap_or(true),
        ConditionOperator::NotContains => contains(resolved, expected).map(|c| !c).unwrap_or(true),
        ConditionOperator::Exists => resolved.is_some_and(|v| !v.is_null()),
        ConditionOperator::NotExists => resolved.map_or(true, Value::is_null),
    }
}

/// `None` means the containment check could not be carried out.
fn contains(resolved: Option<&Value>, expected: &Value) -> Option<bool> {
    match resolved? {
        Value::String(s) => {
            let needle = match expected {
                Value::String(n) => n.clone(),
                other => other.to_string(),
            };
            Some(s.contains(&needle))
        }
        Value::Array(items) => Some(items.contains(expected)),
        _ => None,
    }
}

/// Evaluate a single boolean expression against a scope object.
///
/// Supported forms, mirroring the edge operators:
/// - `true` / `false` literals
/// - `path == literal`, `path != literal`
/// - `path > literal`, `path < literal`
/// - `path contains literal`
///
/// The left side is resolved as a dot-path into the scope; when that
/// fails it is parsed as a literal. Unparseable expressions are false.
pub fn evaluate_expression(expr: &str, scope: &Value) -> bool {
    let expr = expr.trim();
    match expr {
        "true" => return true,
        "false" => return false,
        _ => {}
    }

    for (op_text, operator) in [
        ("==", ConditionOperator::Equals),
        ("!=", ConditionOperator::NotEquals),
        (">", ConditionOperator::GreaterThan),
        ("<", ConditionOperator::LessThan),
        (" contains ", ConditionOperator::Contains),
    ] {
        if let Some((left, right)) = split_operator(expr, op_text) {
            let expected = parse_literal(right);
            let resolved_owned;
            let resolved = match resolve_path(scope, left) {
                Some(v) => Some(v),
                None => {
                    resolved_owned = parse_literal(left);
                    Some(&resolved_owned)
                }
            };
            return compare(operator, resolved, &expected);
        }
    }

    false
}

fn split_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let (left, right) = expr.split_once(op)?;
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

/// Parse a literal: JSON first, then a bare or quoted string.
fn parse_literal(text: &str) -> Value {
    let trimmed = text.trim().trim_matches('"');
    serde_json::from_str(text.trim())
        .unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_vars() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[test]
    fn missing_condition_passes() {
        assert!(evaluate_edge(None, &json!({}), &no_vars()));
    }

    #[test]
    fn equals_and_not_equals() {
        let output = json!({"status": "ok", "count": 3});
        let eq = EdgeCondition::new("status", ConditionOperator::Equals, json!("ok"));
        assert!(evaluate_edge(Some(&eq), &output, &no_vars()));

        let eq = EdgeCondition::new("status", ConditionOperator::Equals, json!("bad"));
        assert!(!evaluate_edge(Some(&eq), &output, &no_vars()));

        let ne = EdgeCondition::new("count", ConditionOperator::NotEquals, json!(4));
        assert!(evaluate_edge(Some(&ne), &output, &no_vars()));
    }

    #[test]
    fn numeric_comparisons() {
        let output = json!({"score": 7.5});
        let gt = EdgeCondition::new("score", ConditionOperator::GreaterThan, json!(5));
        assert!(evaluate_edge(Some(&gt), &output, &no_vars()));

        let lt = EdgeCondition::new("score", ConditionOperator::LessThan, json!(5));
        assert!(!evaluate_edge(Some(&lt), &output, &no_vars()));
    }

    #[test]
    fn type_mismatch_defaults_to_pass() {
        let output = json!({"score": "not a number"});
        let gt = EdgeCondition::new("score", ConditionOperator::GreaterThan, json!(5));
        assert!(evaluate_edge(Some(&gt), &output, &no_vars()));
    }

    #[test]
    fn contains_on_strings_and_arrays() {
        let output = json!({"text": "hello world", "tags": ["a", "b"]});
        let c = EdgeCondition::new("text", ConditionOperator::Contains, json!("world"));
        assert!(evaluate_edge(Some(&c), &output, &no_vars()));

        let c = EdgeCondition::new("tags", ConditionOperator::Contains, json!("b"));
        assert!(evaluate_edge(Some(&c), &output, &no_vars()));

        let c = EdgeCondition::new("tags", ConditionOperator::NotContains, json!("z"));
        assert!(evaluate_edge(Some(&c), &output, &no_vars()));
    }

    #[test]
    fn exists_and_not_exists() {
        let output = json!({"present": 1, "nothing": null});
        let e = EdgeCondition::new("present", ConditionOperator::Exists, Value::Null);
        assert!(evaluate_edge(Some(&e), &output, &no_vars()));

        let e = EdgeCondition::new("missing", ConditionOperator::Exists, Value::Null);
        assert!(!evaluate_edge(Some(&e), &output, &no_vars()));

        let e = EdgeCondition::new("nothing", ConditionOperator::NotExists, Value::Null);
        assert!(evaluate_edge(Some(&e), &output, &no_vars()));
    }

    #[test]
    fn dot_paths_traverse_nested_output() {
        let output = json!({"data": {"items": [{"name": "first"}, {"name": "second"}]}});
        let c = EdgeCondition::new(
            "data.items[1].name",
            ConditionOperator::Equals,
            json!("second"),
        );
        assert!(evaluate_edge(Some(&c), &output, &no_vars()));
    }

    #[test]
    fn variables_fallback_when_output_lacks_the_root() {
        let mut vars = HashMap::new();
        vars.insert("threshold".to_string(), json!(10));
        let c = EdgeCondition::new("threshold", ConditionOperator::GreaterThan, json!(5));
        assert!(evaluate_edge(Some(&c), &json!({}), &vars));

        vars.insert("limits".to_string(), json!({"max": 3}));
        let c = EdgeCondition::new("limits.max", ConditionOperator::Equals, json!(3));
        assert!(evaluate_edge(Some(&c), &json!({}), &vars));
    }

    #[test]
    fn expression_literals_and_paths() {
        let scope = json!({"status": "ok", "score": 8});
        assert!(evaluate_expression(r#"status == "ok""#, &scope));
        assert!(evaluate_expression("score > 5", &scope));
        assert!(!evaluate_expression("score < 5", &scope));
        assert!(evaluate_expression("true", &scope));
        assert!(evaluate_expression("1 == 1", &scope));
        assert!(!evaluate_expression("this is not an expression", &scope));
    }

    #[test]
    fn expression_contains() {
        let scope = json!({"message": "all systems go"});
        assert!(evaluate_expression(r#"message contains "systems""#, &scope));
        assert!(!evaluate_expression(r#"message contains "halt""#, &scope));
    }
}
