// src/tools/coerce.rs — Argument coercion from raw marker text to declared types

use std::collections::BTreeMap;

use crate::core::types::{ParamType, ReturnSpec, ReturnType, Tool, ToolParameter};
use crate::infra::errors::EvoError;

/// A coerced argument, positional in parameter order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    /// Optional parameter with no value and no default.
    Unset,
}

/// Coerce every raw argument to the tool's declared parameter types.
///
/// Missing required parameters, unknown names and uncoercible values are all
/// reported together in one `Argument` error.
pub fn coerce_arguments(
    tool: &Tool,
    raw: &BTreeMap<String, String>,
) -> Result<Vec<ArgValue>, EvoError> {
    let mut problems = Vec::new();

    let missing: Vec<&str> = tool
        .parameters
        .iter()
        .filter(|p| p.required && !raw.contains_key(&p.name))
        .map(|p| p.name.as_str())
        .collect();
    if !missing.is_empty() {
        problems.push(format!("Missing required arguments: {}", missing.join(", ")));
    }

    let unknown: Vec<&str> = raw
        .keys()
        .filter(|k| tool.param(k).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        problems.push(format!("Unknown arguments: {}", unknown.join(", ")));
    }

    let mut values = Vec::with_capacity(tool.parameters.len());
    for param in &tool.parameters {
        let value = match raw.get(&param.name) {
            Some(text) => coerce_value(param.param_type, text),
            None => Ok(default_value(param)),
        };
        match value {
            Ok(v) => values.push(v),
            Err(msg) => problems.push(format!("Argument '{}' {}", param.name, msg)),
        }
    }

    if problems.is_empty() {
        Ok(values)
    } else {
        Err(EvoError::Argument {
            tool: tool.name.clone(),
            message: problems.join("; "),
        })
    }
}

/// Parse one raw text value as `ty`.
pub fn coerce_value(ty: ParamType, text: &str) -> Result<ArgValue, String> {
    let trimmed = text.trim();
    let expected = || format!("expects {}, got '{}'", ty, preview(trimmed));
    match ty {
        ParamType::String => Ok(ArgValue::Str(text.to_string())),
        ParamType::Integer => {
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(ArgValue::Int(i));
            }
            match trimmed.parse::<f64>() {
                // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
                Ok(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(ArgValue::Int(f as i64))
                }
                _ => Err(expected()),
            }
        }
        ParamType::Float => trimmed
            .parse::<f64>()
            .map(ArgValue::Float)
            .map_err(|_| expected()),
        ParamType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(ArgValue::Bool(true)),
            "false" | "no" | "0" => Ok(ArgValue::Bool(false)),
            _ => Err(expected()),
        },
        ParamType::StringList => parse_list(trimmed).ok_or_else(expected),
    }
}

fn parse_list(text: &str) -> Option<ArgValue> {
    if text.starts_with('[') {
        let items: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;
        let strings = items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        return Some(ArgValue::List(strings));
    }
    let sep = if text.contains('\n') { '\n' } else { ',' };
    let items = text
        .split(sep)
        .map(|s| s.trim().trim_start_matches("- ").trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(ArgValue::List(items))
}

fn default_value(param: &ToolParameter) -> ArgValue {
    let Some(default) = &param.default else {
        return ArgValue::Unset;
    };
    let text = match default {
        serde_json::Value::Null => return ArgValue::Unset,
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    coerce_value(param.param_type, &text).unwrap_or(ArgValue::Unset)
}

fn preview(s: &str) -> String {
    if s.chars().count() > 40 {
        let head: String = s.chars().take(40).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Render a tool's return value as text for the model, per its declared type.
pub fn render_output(value: &serde_json::Value, returns: &ReturnSpec) -> String {
    match (value, returns.return_type) {
        (serde_json::Value::Null, _) => String::new(),
        (serde_json::Value::String(s), _) => s.clone(),
        (serde_json::Value::Number(n), ReturnType::Integer) => n
            .as_f64()
            .map(|f| (f as i64).to_string())
            .unwrap_or_else(|| n.to_string()),
        (serde_json::Value::Array(_) | serde_json::Value::Object(_), _) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        (other, _) => other.to_string(),
    }
}
