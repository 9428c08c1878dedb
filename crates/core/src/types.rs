use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> EpochMillis {
    Utc::now().timestamp_millis()
}

/// Render epoch milliseconds as local `YYYY-MM-DD HH:MM`
pub fn format_millis(millis: EpochMillis) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

/// Convert epoch milliseconds to a UTC timestamp
pub fn millis_to_utc(millis: EpochMillis) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Unique identifier for a reminder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId(pub String);

impl ReminderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the `reminder_<millis>_<index>` form
    pub fn generate(created_at: EpochMillis, index: u64) -> Self {
        Self(format!("reminder_{}_{}", created_at, index))
    }

    /// Trailing sequence index, if the id was generated by this crate
    pub fn index(&self) -> Option<u64> {
        self.0
            .strip_prefix("reminder_")
            .and_then(|rest| rest.rsplit('_').next())
            .and_then(|idx| idx.parse().ok())
    }
}

impl std::fmt::Display for ReminderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stored piece of information
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InfoId(pub String);

impl InfoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("info_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl std::fmt::Display for InfoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reminder priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid priority '{0}', expected one of: low, normal, high")]
pub struct InvalidPriority(pub String);

impl FromStr for Priority {
    type Err = InvalidPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }
}

/// A durable reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<EpochMillis>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<EpochMillis>,
}

impl Reminder {
    /// Due at or before `now` and still pending
    pub fn is_due(&self, now: EpochMillis) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due <= now)
    }

    /// Strictly past its due date and still pending
    pub fn is_overdue(&self, now: EpochMillis) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Due inside `[now, now + window]` and still pending
    pub fn is_due_within(&self, now: EpochMillis, window_millis: i64) -> bool {
        !self.completed
            && self
                .due_date
                .is_some_and(|due| due >= now && due <= now + window_millis)
    }
}

/// Fields accepted when creating a reminder
#[derive(Debug, Clone, Default)]
pub struct NewReminder {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<EpochMillis>,
    pub priority: Priority,
    pub category: Option<String>,
}

impl NewReminder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn due_at(mut self, due_date: EpochMillis) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A saved piece of information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredInformation {
    pub id: InfoId,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: EpochMillis,
}

impl StoredInformation {
    /// Case-insensitive substring match over title, content and summary
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self
                .summary
                .as_ref()
                .is_some_and(|s| s.to_lowercase().contains(&needle))
    }

    /// True when every requested tag is present, ignoring case
    pub fn has_all_tags(&self, tags: &BTreeSet<String>) -> bool {
        let own = normalize_tags(&self.tags);
        normalize_tags(tags).iter().all(|t| own.contains(t))
    }
}

/// Fields accepted when saving information
#[derive(Debug, Clone, Default)]
pub struct NewInformation {
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NewInformation {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Comparison keys for tag matching: lower-cased, trimmed, empties dropped
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
