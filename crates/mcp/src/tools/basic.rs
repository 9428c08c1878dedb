// Stateless demo tools: echo, clock, calculator

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, parse_args, required, Tool};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use parley_core::calculator;
use serde::Deserialize;

/// Echoes its input back
pub struct EchoTool;

#[derive(Debug, Deserialize)]
struct EchoArgs {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".to_string(),
            description: Some("Echoes back the provided text".to_string()),
            input_schema: Some(json_schema_object(
                serde_json::json!({
                    "text": json_schema_string("Text to echo back")
                }),
                vec!["text"],
            )),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: EchoArgs = parse_args(arguments)?;
        Ok(CallToolResult::text(format!(
            "Echo: {}",
            args.text.unwrap_or_default()
        )))
    }
}

/// Reports the server clock
pub struct CurrentTimeTool;

#[async_trait::async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_current_time".to_string(),
            description: Some("Returns the current server time".to_string()),
            input_schema: Some(json_schema_object(serde_json::json!({}), vec![])),
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<CallToolResult> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Ok(CallToolResult::text(format!("Current server time: {}", now)))
    }
}

/// Restricted arithmetic
pub struct CalculateTool;

#[derive(Debug, Deserialize)]
struct CalculateArgs {
    #[serde(default)]
    expression: Option<String>,
}

#[async_trait::async_trait]
impl Tool for CalculateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculate".to_string(),
            description: Some("Performs basic arithmetic operations".to_string()),
            input_schema: Some(json_schema_object(
                serde_json::json!({
                    "expression": json_schema_string("Mathematical expression to evaluate (e.g., '2 + 2')")
                }),
                vec!["expression"],
            )),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: CalculateArgs = parse_args(arguments)?;
        let expression = required(args.expression, "expression")?;

        match calculator::evaluate(&expression) {
            Ok(value) => Ok(CallToolResult::text(format!(
                "Result: {}",
                calculator::format_result(value)
            ))),
            Err(e) => Ok(CallToolResult::error(e.to_string())),
        }
    }
}
