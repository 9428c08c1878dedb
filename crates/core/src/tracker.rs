use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Status of a tracker task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Open,
    InProgress,
    Resolved,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "inProgress",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task in the mock issue tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerTask {
    pub key: String,
    pub summary: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TrackerTask {
    fn seed(key: &str, summary: &str, status: TaskStatus, description: &str) -> Self {
        Self {
            key: key.to_string(),
            summary: summary.to_string(),
            status,
            description: Some(description.to_string()),
            assignee: None,
        }
    }

    /// Queue part of the key (`TEST` for `TEST-3`)
    pub fn queue(&self) -> &str {
        self.key.split_once('-').map_or(&self.key, |(queue, _)| queue)
    }
}

/// In-memory issue tracker seeded with demo tasks
pub struct IssueTracker {
    tasks: Mutex<Vec<TrackerTask>>,
}

impl Default for IssueTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueTracker {
    pub fn new() -> Self {
        use TaskStatus::*;

        let tasks = vec![
            TrackerTask::seed("TEST-1", "Fix login bug", Open, "Users cannot sign in"),
            TrackerTask::seed("TEST-2", "Add search feature", Open, "Implement full-text search"),
            TrackerTask::seed("TEST-3", "Update API docs", InProgress, "Refresh the OpenAPI reference"),
            TrackerTask::seed("TEST-4", "Optimize database queries", Open, "Improve query performance"),
            TrackerTask::seed("TEST-5", "Add payment module tests", Open, "Cover critical payment paths"),
            TrackerTask::seed("TEST-6", "Fix validation error", Resolved, "Email validation fixed"),
            TrackerTask::seed("TEST-7", "Set up CI/CD", Open, "Automate deployment"),
        ];

        Self {
            tasks: Mutex::new(tasks),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackerTask>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open tasks in `queue`
    pub fn open_tasks(&self, queue: &str) -> Vec<TrackerTask> {
        self.lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Open && t.queue() == queue)
            .cloned()
            .collect()
    }

    pub fn count_open(&self, queue: &str) -> usize {
        self.lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Open && t.queue() == queue)
            .count()
    }

    pub fn get(&self, key: &str) -> Option<TrackerTask> {
        self.lock().iter().find(|t| t.key == key).cloned()
    }

    /// Create an open task keyed `<queue>-<task count + 1>`
    pub fn create(
        &self,
        summary: impl Into<String>,
        description: Option<String>,
        queue: &str,
    ) -> TrackerTask {
        let mut tasks = self.lock();

        let task = TrackerTask {
            key: format!("{}-{}", queue, tasks.len() + 1),
            summary: summary.into(),
            status: TaskStatus::Open,
            description,
            assignee: None,
        };
        tasks.push(task.clone());

        tracing::info!("Created tracker task {} ({})", task.key, task.summary);
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_open_tasks() {
        let tracker = IssueTracker::new();
        assert_eq!(tracker.count_open("TEST"), 5);

        let keys: Vec<_> = tracker
            .open_tasks("TEST")
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, vec!["TEST-1", "TEST-2", "TEST-4", "TEST-5", "TEST-7"]);
    }

    #[test]
    fn test_other_queue_is_empty() {
        let tracker = IssueTracker::new();
        assert_eq!(tracker.count_open("OPS"), 0);
        assert!(tracker.open_tasks("OPS").is_empty());
    }

    #[test]
    fn test_get_task() {
        let tracker = IssueTracker::new();
        let task = tracker.get("TEST-3").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(tracker.get("TEST-99").is_none());
    }

    #[test]
    fn test_create_task() {
        let tracker = IssueTracker::new();
        let task = tracker.create("Write changelog", None, "TEST");

        assert_eq!(task.key, "TEST-8");
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(tracker.count_open("TEST"), 6);
        assert_eq!(tracker.get("TEST-8"), Some(task));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(json, "inProgress");
    }
}
