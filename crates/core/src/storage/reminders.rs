use crate::storage::JsonArrayFile;
use crate::types::{
    format_millis, now_millis, EpochMillis, NewReminder, Priority, Reminder, ReminderId,
};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
const SUMMARY_EXAMPLES: usize = 5;

/// File-backed reminder store.
///
/// Each operation holds `state` for its whole load → mutate → save cycle, so
/// concurrent callers never interleave and lose writes.
pub struct ReminderStore {
    file: JsonArrayFile<Reminder>,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    // Seeded lazily from the file on first create
    next_index: Option<u64>,
}

impl ReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: JsonArrayFile::open(path)?,
            state: Mutex::new(StoreState::default()),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Create a new reminder
    pub async fn create(&self, new: NewReminder) -> Result<Reminder> {
        let mut state = self.state.lock().await;
        let mut reminders = self.file.load().await?;

        let index = match state.next_index {
            Some(index) => index,
            None => reminders
                .iter()
                .filter_map(|r| r.id.index())
                .map(|i| i + 1)
                .max()
                .unwrap_or(0)
                .max(reminders.len() as u64),
        };
        state.next_index = Some(index + 1);

        let created_at = now_millis();
        let reminder = Reminder {
            id: ReminderId::generate(created_at, index),
            title: new.title,
            description: new.description,
            created_at,
            due_date: new.due_date,
            priority: new.priority,
            category: new.category,
            completed: false,
            completed_at: None,
        };

        reminders.push(reminder.clone());
        self.file.save(&reminders).await?;

        tracing::info!("Created reminder {} ({})", reminder.id, reminder.title);
        Ok(reminder)
    }

    /// List reminders, optionally hiding completed ones
    pub async fn list(&self, include_completed: bool) -> Result<Vec<Reminder>> {
        let _state = self.state.lock().await;
        let reminders = self.file.load().await?;

        Ok(if include_completed {
            reminders
        } else {
            reminders.into_iter().filter(|r| !r.completed).collect()
        })
    }

    /// Get a reminder by id
    pub async fn get(&self, id: &ReminderId) -> Result<Option<Reminder>> {
        let _state = self.state.lock().await;
        let reminders = self.file.load().await?;
        Ok(reminders.into_iter().find(|r| &r.id == id))
    }

    /// Delete a reminder. Returns false (file untouched) when it does not exist.
    pub async fn delete(&self, id: &ReminderId) -> Result<bool> {
        let _state = self.state.lock().await;
        let mut reminders = self.file.load().await?;

        let before = reminders.len();
        reminders.retain(|r| &r.id != id);
        if reminders.len() == before {
            return Ok(false);
        }

        self.file.save(&reminders).await?;
        tracing::info!("Deleted reminder {}", id);
        Ok(true)
    }

    /// Mark a reminder completed. Returns false when missing or already completed.
    pub async fn complete(&self, id: &ReminderId) -> Result<bool> {
        let _state = self.state.lock().await;
        let mut reminders = self.file.load().await?;

        let Some(reminder) = reminders.iter_mut().find(|r| &r.id == id) else {
            return Ok(false);
        };
        if reminder.completed {
            return Ok(false);
        }

        reminder.completed = true;
        reminder.completed_at = Some(now_millis());

        self.file.save(&reminders).await?;
        tracing::info!("Completed reminder {}", id);
        Ok(true)
    }

    /// Pending reminders whose due date has passed
    pub async fn due(&self) -> Result<Vec<Reminder>> {
        self.due_at(now_millis()).await
    }

    pub async fn due_at(&self, now: EpochMillis) -> Result<Vec<Reminder>> {
        let _state = self.state.lock().await;
        let reminders = self.file.load().await?;
        Ok(reminders.into_iter().filter(|r| r.is_due(now)).collect())
    }

    /// Aggregate counts and examples
    pub async fn stats(&self) -> Result<ReminderStats> {
        self.stats_at(now_millis()).await
    }

    pub async fn stats_at(&self, now: EpochMillis) -> Result<ReminderStats> {
        let _state = self.state.lock().await;
        let reminders = self.file.load().await?;
        Ok(ReminderStats::compute(&reminders, now))
    }

    /// Human-readable summary for display or prompt input
    pub async fn summary(&self) -> Result<String> {
        Ok(self.stats().await?.render())
    }
}

/// Aggregate view over the reminder set at a point in time
#[derive(Debug, Clone, Default)]
pub struct ReminderStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: Vec<Reminder>,
    pub due_soon: Vec<Reminder>,
    pub high_priority: Vec<Reminder>,
}

impl ReminderStats {
    pub fn compute(reminders: &[Reminder], now: EpochMillis) -> Self {
        let completed = reminders.iter().filter(|r| r.completed).count();

        Self {
            total: reminders.len(),
            completed,
            pending: reminders.len() - completed,
            overdue: reminders
                .iter()
                .filter(|r| r.is_overdue(now))
                .cloned()
                .collect(),
            due_soon: reminders
                .iter()
                .filter(|r| r.is_due_within(now, DAY_MILLIS))
                .cloned()
                .collect(),
            high_priority: reminders
                .iter()
                .filter(|r| !r.completed && r.priority == Priority::High)
                .cloned()
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "REMINDER SUMMARY");
        let _ = writeln!(out, "{}", "=".repeat(40));
        let _ = writeln!(out, "Total reminders: {}", self.total);
        let _ = writeln!(out, "Completed: {}", self.completed);
        let _ = writeln!(out, "Pending: {}", self.pending);
        let _ = writeln!(out, "Overdue: {}", self.overdue.len());
        let _ = writeln!(out, "Due in the next 24h: {}", self.due_soon.len());
        let _ = writeln!(out, "High priority: {}", self.high_priority.len());

        if !self.overdue.is_empty() {
            let _ = writeln!(out, "\nOVERDUE:");
            render_examples(&mut out, &self.overdue, Some("was due"));
        }
        if !self.due_soon.is_empty() {
            let _ = writeln!(out, "\nDUE IN THE NEXT 24H:");
            render_examples(&mut out, &self.due_soon, Some("due"));
        }
        if !self.high_priority.is_empty() {
            let _ = writeln!(out, "\nHIGH PRIORITY:");
            render_examples(&mut out, &self.high_priority, None);
        }

        out
    }
}

fn render_examples(out: &mut String, reminders: &[Reminder], due_label: Option<&str>) {
    for reminder in reminders.iter().take(SUMMARY_EXAMPLES) {
        match (due_label, reminder.due_date) {
            (Some(label), Some(due)) => {
                let _ = writeln!(out, "  - {} ({}: {})", reminder.title, label, format_millis(due));
            }
            _ => {
                let _ = writeln!(out, "  - {}", reminder.title);
            }
        }
        if let Some(description) = &reminder.description {
            let _ = writeln!(out, "    {}", description);
        }
    }
}
