//! Inter-step data flow.
//!
//! Planned step parameters may reference earlier results with
//! `{{step_N_output}}` or `{{step_N_output.path.to.field}}` (1-indexed).
//! A string that is exactly one placeholder takes the referenced value with
//! its JSON type; placeholders inside a longer string are interpolated as
//! text. Unresolvable references stay verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::warn;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*step_(\d+)_output((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}")
        .expect("placeholder pattern is a valid regex")
});

static FULL_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{\s*step_(\d+)_output((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}$")
        .expect("full placeholder pattern is a valid regex")
});

/// Parameters after substitution, plus the references that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub unresolved: Vec<String>,
}

/// Substitute placeholders throughout `value`.
///
/// `lookup` returns the result of step `N` (1-indexed).
pub fn resolve_placeholders<F>(value: &Value, lookup: F) -> Resolved
where
    F: Fn(usize) -> Option<Value>,
{
    let mut unresolved = Vec::new();
    let value = resolve_value(value, &lookup, &mut unresolved);
    for reference in &unresolved {
        warn!(placeholder = %reference, "Unresolved step output placeholder left verbatim");
    }
    Resolved { value, unresolved }
}

/// Whether `value` contains any placeholder.
pub fn has_placeholders(value: &Value) -> bool {
    match value {
        Value::String(s) => PLACEHOLDER.is_match(s),
        Value::Array(items) => items.iter().any(has_placeholders),
        Value::Object(object) => object.values().any(has_placeholders),
        _ => false,
    }
}

fn resolve_value<F>(value: &Value, lookup: &F, unresolved: &mut Vec<String>) -> Value
where
    F: Fn(usize) -> Option<Value>,
{
    match value {
        Value::String(text) => resolve_string(text, lookup, unresolved),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, lookup, unresolved))
                .collect(),
        ),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, lookup, unresolved)))
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}

fn resolve_string<F>(text: &str, lookup: &F, unresolved: &mut Vec<String>) -> Value
where
    F: Fn(usize) -> Option<Value>,
{
    if let Some(caps) = FULL_PLACEHOLDER.captures(text) {
        return match lookup_reference(&caps, lookup) {
            Some(found) => found,
            None => {
                unresolved.push(text.to_string());
                Value::String(text.to_string())
            }
        };
    }

    let interpolated = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        match lookup_reference(caps, lookup) {
            Some(found) => render(&found),
            None => {
                unresolved.push(caps[0].to_string());
                caps[0].to_string()
            }
        }
    });
    Value::String(interpolated.into_owned())
}

fn lookup_reference<F>(caps: &Captures<'_>, lookup: &F) -> Option<Value>
where
    F: Fn(usize) -> Option<Value>,
{
    let index: usize = caps.get(1)?.as_str().parse().ok()?;
    if index == 0 {
        return None;
    }
    let root = lookup(index)?;
    let path = caps.get(2).map_or("", |m| m.as_str());
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    navigate(root, &segments)
}

/// Walk a dotted path. Numeric segments index arrays; a string that still has
/// segments to walk is parsed as JSON first.
fn navigate(mut current: Value, segments: &[&str]) -> Option<Value> {
    for segment in segments {
        if let Value::String(text) = &current {
            current = serde_json::from_str(text).ok()?;
        }
        current = match current {
            Value::Object(mut object) => object.remove(*segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(current)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results(values: Vec<Value>) -> impl Fn(usize) -> Option<Value> {
        move |n| values.get(n.checked_sub(1)?).cloned()
    }

    #[test]
    fn test_full_placeholder_keeps_type() {
        let resolved = resolve_placeholders(
            &json!({"x": "{{step_1_output.sum}}"}),
            results(vec![json!({"sum": 5})]),
        );
        assert_eq!(resolved.value, json!({"x": 5}));
        assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn test_placeholder_patterns_detect_references() {
        assert!(has_placeholders(&json!({"a": ["{{ step_2_output }}"]})));
        assert!(has_placeholders(&json!("x {{step_1_output.a.0}} y")));
        assert!(!has_placeholders(&json!({"a": "{{step_output}}", "b": 3})));

        let resolved = resolve_placeholders(&json!("{{ step_2_output }}"), |n| {
            (n == 2).then(|| json!([1, 2]))
        });
        assert_eq!(resolved.value, json!([1, 2]));
    }

    #[test]
    fn test_embedded_placeholder_is_interpolated() {
        let resolved = resolve_placeholders(
            &json!({"msg": "sum is {{step_1_output.sum}}"}),
            results(vec![json!({"sum": 5})]),
        );
        assert_eq!(resolved.value, json!({"msg": "sum is 5"}));
    }

    #[test]
    fn test_string_results_interpolate_without_quotes() {
        let resolved = resolve_placeholders(
            &json!("Hello {{step_2_output}}!"),
            results(vec![json!(1), json!("world")]),
        );
        assert_eq!(resolved.value, json!("Hello world!"));
    }

    #[test]
    fn test_whole_result_and_nested_paths() {
        let step = json!({"items": [{"id": 7}, {"id": 9}]});
        let resolved = resolve_placeholders(
            &json!({
                "all": "{{step_1_output}}",
                "second": "{{ step_1_output.items.1.id }}",
                "list": ["{{step_1_output.items.0}}"]
            }),
            results(vec![step.clone()]),
        );
        assert_eq!(resolved.value["all"], step);
        assert_eq!(resolved.value["second"], json!(9));
        assert_eq!(resolved.value["list"], json!([{"id": 7}]));
    }

    #[test]
    fn test_json_string_results_are_walked() {
        let resolved = resolve_placeholders(
            &json!("{{step_1_output.total}}"),
            results(vec![json!(r#"{"total": 12.5}"#)]),
        );
        assert_eq!(resolved.value, json!(12.5));
    }

    #[test]
    fn test_unresolved_references_stay_verbatim() {
        let input = json!({
            "missing_step": "{{step_3_output}}",
            "missing_field": "value: {{step_1_output.nope}}",
            "zero": "{{step_0_output}}"
        });
        let resolved = resolve_placeholders(&input, results(vec![json!({"sum": 5})]));

        assert_eq!(resolved.value, input);
        assert_eq!(resolved.unresolved.len(), 3);
    }

    #[test]
    fn test_non_string_values_untouched() {
        let input = json!({"n": 1, "flag": true, "nothing": null});
        let resolved = resolve_placeholders(&input, results(vec![]));
        assert_eq!(resolved.value, input);
        assert!(!has_placeholders(&input));
        assert!(has_placeholders(&json!(["a", "{{step_1_output}}"])));
    }
}
