// Mock issue tracker tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_schema_enum, json_schema_object, json_schema_string, parse_args, required, Tool,
    ToolError,
};
use anyhow::Result;
use parley_core::tracker::IssueTracker;
use serde::Deserialize;
use std::sync::Arc;

const ACTIONS: &[&str] = &["get_open_tasks", "count_open_tasks", "get_task", "create_task"];
const DEFAULT_QUEUE: &str = "TEST";

/// Query and create tasks in the in-memory tracker
pub struct TrackerTool {
    tracker: Arc<IssueTracker>,
}

impl TrackerTool {
    pub fn new(tracker: Arc<IssueTracker>) -> Self {
        Self { tracker }
    }
}

#[derive(Debug, Deserialize)]
struct TrackerArgs {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    queue: Option<String>,
}

#[async_trait::async_trait]
impl Tool for TrackerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "yandex_tracker".to_string(),
            description: Some(
                "Work with issue tracker tasks: list and count open tasks, get a task by key, create a task"
                    .to_string(),
            ),
            input_schema: Some(json_schema_object(
                serde_json::json!({
                    "action": json_schema_enum(ACTIONS, "Action to perform"),
                    "task_id": json_schema_string("Task key (required for get_task)"),
                    "summary": json_schema_string("Task title (required for create_task)"),
                    "description": json_schema_string("Task description (optional, for create_task)"),
                    "queue": json_schema_string("Queue key (default: TEST)")
                }),
                vec!["action"],
            )),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: TrackerArgs = parse_args(arguments)?;
        let action = required(args.action, "action")?;
        let queue = args.queue.as_deref().unwrap_or(DEFAULT_QUEUE);

        let text = match action.as_str() {
            "get_open_tasks" => {
                let tasks = self.tracker.open_tasks(queue);
                let lines: Vec<_> = tasks
                    .iter()
                    .map(|t| format!("- {}: {}", t.key, t.summary))
                    .collect();
                format!(
                    "Open tasks in queue '{}':\n\n{}\n\nTotal: {} tasks",
                    queue,
                    lines.join("\n"),
                    tasks.len()
                )
            }
            "count_open_tasks" => {
                format!(
                    "Open tasks in queue '{}': {}",
                    queue,
                    self.tracker.count_open(queue)
                )
            }
            "get_task" => {
                let task_id = required(args.task_id, "task_id")?;
                match self.tracker.get(&task_id) {
                    Some(task) => format!(
                        "Task {}:\nStatus: {}\nSummary: {}\nDescription: {}",
                        task.key,
                        task.status,
                        task.summary,
                        task.description.as_deref().unwrap_or("No description")
                    ),
                    None => {
                        return Ok(CallToolResult::error(format!(
                            "Task '{}' not found",
                            task_id
                        )))
                    }
                }
            }
            "create_task" => {
                let summary = required(
                    args.summary.filter(|s| !s.trim().is_empty()),
                    "summary",
                )?;
                let task = self.tracker.create(summary, args.description, queue);

                let mut text = format!(
                    "Task created.\n\nKey: {}\nSummary: {}\nStatus: {}",
                    task.key, task.summary, task.status
                );
                if let Some(description) = &task.description {
                    text.push_str(&format!("\nDescription: {}", description));
                }
                text
            }
            other => {
                return Err(ToolError::UnknownAction {
                    action: other.to_string(),
                    available: "get_open_tasks, count_open_tasks, get_task, create_task",
                }
                .into())
            }
        };

        Ok(CallToolResult::text(text))
    }
}
