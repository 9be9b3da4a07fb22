//! Tool-selection wire protocol.
//!
//! The model answers with exactly one JSON object:
//!
//! ```text
//! {"tool_name": "<name>", "parameters": {...}}      // invoke a tool
//! {"tool_name": "none", "response": "<final text>"} // no tool needed
//! ```
//!
//! A markdown code fence around the object is tolerated. Anything else is an
//! `invalid JSON` validation error, which callers record as a failed step.

use cadence_core::{CadenceResult, RuntimeError, TOOL_NONE};
use serde_json::{Map, Value};

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDecision {
    /// Invoke `tool_name` with `parameters`.
    Invoke { tool_name: String, parameters: Value },
    /// `tool_name` was `"none"`: answer directly.
    Respond { response: String },
    /// Valid object without a usable `tool_name`.
    Unspecified { response: Option<String> },
}

impl ToolDecision {
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolDecision::Invoke { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }
}

/// Strip a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) if !body[..newline].trim().contains(['{', '[']) => body[newline + 1..].trim(),
        _ => body.trim(),
    }
}

/// Parse a model answer into a [`ToolDecision`].
pub fn parse_tool_decision(content: &str) -> CadenceResult<ToolDecision> {
    let object = parse_object(content)?;

    let response = object
        .get("response")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    let tool_name = match object.get("tool_name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Ok(ToolDecision::Unspecified { response }),
    };

    if tool_name.eq_ignore_ascii_case(TOOL_NONE) {
        return Ok(ToolDecision::Respond {
            response: response.unwrap_or_default(),
        });
    }

    let parameters = match object.get("parameters") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(params)) => Value::Object(params.clone()),
        Some(other) => {
            return Err(RuntimeError::Validation(format!(
                "invalid JSON: 'parameters' must be an object, got {}",
                type_name(other)
            )));
        }
    };

    Ok(ToolDecision::Invoke {
        tool_name,
        parameters,
    })
}

fn parse_object(content: &str) -> CadenceResult<Map<String, Value>> {
    let body = strip_code_fence(content);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(RuntimeError::Validation(format!(
            "invalid JSON: expected an object, got {}",
            type_name(&other)
        ))),
        Err(e) => Err(e.into()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
