use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::tools::ToolRegistry;

/// Evaluates one REPL line of the form `<tool-name> [json-args]`.
pub async fn eval(input: &str, registry: &ToolRegistry) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(String::new());
    }

    let (name, rest) = match input.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (input, ""),
    };

    let args: Value = if rest.is_empty() {
        json!({})
    } else {
        serde_json::from_str(rest).map_err(|e| anyhow!("Invalid JSON arguments: {}", e))?
    };

    let result = registry.dispatch(name, args).await?;

    // A lone string result reads better unquoted.
    match result {
        Value::String(s) => Ok(s),
        other => Ok(serde_json::to_string_pretty(&other)?),
    }
}

/// One line per registered tool, for the `/tools` command.
pub fn tool_listing(registry: &ToolRegistry) -> String {
    registry
        .iter()
        .map(|tool| format!("{:<32} {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}
