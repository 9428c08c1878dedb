// Reminder tool backed by the durable reminder store

use crate::notify::{NotificationHub, REMINDERS_CHANGED};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_schema_boolean, json_schema_enum, json_schema_number, json_schema_object,
    json_schema_string, parse_args, required, Tool, ToolError,
};
use anyhow::Result;
use parley_core::storage::ReminderStore;
use parley_core::{format_millis, now_millis, EpochMillis, NewReminder, Priority, Reminder, ReminderId};
use serde::Deserialize;
use std::sync::Arc;

const ACTIONS: &[&str] = &[
    "create",
    "list",
    "get",
    "delete",
    "complete",
    "get_due",
    "get_summary",
];

/// Create, query and complete reminders
pub struct ReminderTool {
    store: Arc<ReminderStore>,
    hub: NotificationHub,
}

impl ReminderTool {
    pub fn new(store: Arc<ReminderStore>, hub: NotificationHub) -> Self {
        Self { store, hub }
    }

    fn changed(&self, action: &str, id: &ReminderId) {
        self.hub.publish(
            REMINDERS_CHANGED,
            serde_json::json!({ "action": action, "reminderId": id }),
        );
    }
}

#[derive(Debug, Deserialize)]
struct ReminderArgs {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_date: Option<serde_json::Value>,
    #[serde(default)]
    due_in_minutes: Option<i64>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    reminder_id: Option<String>,
    #[serde(default)]
    include_completed: Option<bool>,
}

/// Accept epoch milliseconds (number or numeric string) or RFC3339
fn parse_due_date(value: &serde_json::Value) -> Result<EpochMillis, ToolError> {
    let invalid = || {
        ToolError::InvalidArguments(format!(
            "due_date must be epoch milliseconds or an RFC3339 timestamp, got {}",
            value
        ))
    };

    match value {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(invalid),
        serde_json::Value::String(s) => {
            if let Ok(millis) = s.trim().parse::<i64>() {
                return Ok(millis);
            }
            chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn describe(reminder: &Reminder) -> String {
    let mut text = format!("{} [{}]\nID: {}", reminder.title, reminder.priority, reminder.id);
    if let Some(description) = &reminder.description {
        text.push_str(&format!("\nDescription: {}", description));
    }
    if let Some(due) = reminder.due_date {
        text.push_str(&format!("\nDue: {}", format_millis(due)));
    }
    if let Some(category) = &reminder.category {
        text.push_str(&format!("\nCategory: {}", category));
    }
    text.push_str(&format!(
        "\nStatus: {}",
        if reminder.completed { "completed" } else { "pending" }
    ));
    text
}

fn one_line(reminder: &Reminder) -> String {
    let mark = if reminder.completed { "x" } else { " " };
    match reminder.due_date {
        Some(due) => format!(
            "[{}] {} - {} (due {}, {})",
            mark,
            reminder.id,
            reminder.title,
            format_millis(due),
            reminder.priority
        ),
        None => format!("[{}] {} - {} ({})", mark, reminder.id, reminder.title, reminder.priority),
    }
}

#[async_trait::async_trait]
impl Tool for ReminderTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "reminder".to_string(),
            description: Some(
                "Manage reminders: create, list, get, delete, complete, list due reminders, summarize"
                    .to_string(),
            ),
            input_schema: Some(json_schema_object(
                serde_json::json!({
                    "action": json_schema_enum(ACTIONS, "Action to perform"),
                    "title": json_schema_string("Reminder title (required for create)"),
                    "description": json_schema_string("Reminder details"),
                    "due_date": json_schema_string("Due date as epoch milliseconds or RFC3339"),
                    "due_in_minutes": json_schema_number("Due this many minutes from now"),
                    "priority": json_schema_enum(&["low", "normal", "high"], "Priority (default: normal)"),
                    "category": json_schema_string("Free-form category"),
                    "reminder_id": json_schema_string("Reminder id (for get, delete, complete)"),
                    "include_completed": json_schema_boolean("Include completed reminders in list (default: true)")
                }),
                vec!["action"],
            )),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ReminderArgs = parse_args(arguments)?;
        let action = required(args.action, "action")?;

        let text = match action.as_str() {
            "create" => {
                let title = required(args.title.filter(|t| !t.trim().is_empty()), "title")?;

                let priority = match args.priority.as_deref() {
                    Some(p) => p.parse::<Priority>()?,
                    None => Priority::Normal,
                };

                let due_date = match (&args.due_date, args.due_in_minutes) {
                    (Some(value), _) => Some(parse_due_date(value)?),
                    (None, Some(minutes)) => Some(
                        minutes
                            .checked_mul(60_000)
                            .and_then(|offset| now_millis().checked_add(offset))
                            .ok_or_else(|| {
                                ToolError::InvalidArguments(format!(
                                    "due_in_minutes {} is out of range",
                                    minutes
                                ))
                            })?,
                    ),
                    (None, None) => None,
                };

                let new = NewReminder {
                    title,
                    description: args.description,
                    due_date,
                    priority,
                    category: args.category,
                };

                let reminder = self.store.create(new).await?;
                self.changed("create", &reminder.id);
                format!("Reminder created.\n\n{}", describe(&reminder))
            }
            "list" => {
                let include_completed = args.include_completed.unwrap_or(true);
                let reminders = self.store.list(include_completed).await?;
                if reminders.is_empty() {
                    "No reminders.".to_string()
                } else {
                    let lines: Vec<_> = reminders.iter().map(one_line).collect();
                    format!("Reminders ({}):\n{}", reminders.len(), lines.join("\n"))
                }
            }
            "get" => {
                let id = ReminderId::new(required(args.reminder_id, "reminder_id")?);
                match self.store.get(&id).await? {
                    Some(reminder) => describe(&reminder),
                    None => {
                        return Ok(CallToolResult::error(format!("Reminder '{}' not found", id)))
                    }
                }
            }
            "delete" => {
                let id = ReminderId::new(required(args.reminder_id, "reminder_id")?);
                if !self.store.delete(&id).await? {
                    return Ok(CallToolResult::error(format!("Reminder '{}' not found", id)));
                }
                self.changed("delete", &id);
                format!("Reminder '{}' deleted.", id)
            }
            "complete" => {
                let id = ReminderId::new(required(args.reminder_id, "reminder_id")?);
                if !self.store.complete(&id).await? {
                    return Ok(CallToolResult::error(format!(
                        "Reminder '{}' not found or already completed",
                        id
                    )));
                }
                self.changed("complete", &id);
                format!("Reminder '{}' marked as completed.", id)
            }
            "get_due" => {
                let due = self.store.due().await?;
                if due.is_empty() {
                    "No reminders are due.".to_string()
                } else {
                    let lines: Vec<_> = due.iter().map(one_line).collect();
                    format!("Due reminders ({}):\n{}", due.len(), lines.join("\n"))
                }
            }
            "get_summary" => self.store.summary().await?,
            other => {
                return Err(ToolError::UnknownAction {
                    action: other.to_string(),
                    available: "create, list, get, delete, complete, get_due, get_summary",
                }
                .into())
            }
        };

        Ok(CallToolResult::text(text))
    }
}
