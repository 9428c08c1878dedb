//! Reminder agent: polls a Parley server for due reminders and summaries.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use parley_client::McpClientManager;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Server name used for the agent's single connection
pub const SERVER_NAME: &str = "parley";

/// One-shot jobs the agent can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentJob {
    CheckDue,
    Summary,
}

impl FromStr for AgentJob {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "check_due" => Ok(Self::CheckDue),
            "summary" => Ok(Self::Summary),
            other => Err(anyhow!("Unknown job '{}', expected check_due or summary", other)),
        }
    }
}

/// When the due check runs
#[derive(Debug, Clone)]
pub enum CheckSchedule {
    Every(Duration),
    Cron(Box<Schedule>),
}

impl CheckSchedule {
    /// Parse a cron expression (seconds field first)
    pub fn cron(expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("Invalid cron expression: {}", expression))?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// Time until the next due check after `now`
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Every(period) => Some(*period),
            Self::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::from_secs(1))),
        }
    }
}

pub struct ReminderAgent {
    manager: Arc<McpClientManager>,
}

impl ReminderAgent {
    pub fn new(manager: Arc<McpClientManager>) -> Self {
        Self { manager }
    }

    /// Connect to the server at `url`
    pub async fn connect(&self, url: &str) -> Result<()> {
        if self.manager.connect_server(SERVER_NAME, url).await {
            tracing::info!("Connected to {}", url);
            Ok(())
        } else {
            Err(anyhow!("Could not connect to MCP server at {}", url))
        }
    }

    async fn call_reminder(&self, action: &str) -> Result<String> {
        let result = self
            .manager
            .call_tool(SERVER_NAME, "reminder", Some(json!({ "action": action })))
            .await
            .ok_or_else(|| anyhow!("reminder {} call failed", action))?;

        let text = result.first_text().unwrap_or_default().to_string();
        if result.is_error {
            return Err(anyhow!("reminder {} returned an error: {}", action, text));
        }
        Ok(text)
    }

    /// Log reminders that are due now
    pub async fn check_due(&self) -> Result<String> {
        let text = self.call_reminder("get_due").await?;
        tracing::info!("Due reminder check:\n{}", text);
        Ok(text)
    }

    /// Log the reminder summary
    pub async fn summary(&self) -> Result<String> {
        let text = self.call_reminder("get_summary").await?;
        tracing::info!("Reminder summary:\n{}", text);
        Ok(text)
    }

    pub async fn run_job(&self, job: AgentJob) -> Result<String> {
        match job {
            AgentJob::CheckDue => self.check_due().await,
            AgentJob::Summary => self.summary().await,
        }
    }

    /// Run both loops until the process is stopped. Failed checks are logged
    /// and retried on the next tick.
    pub async fn run(self: Arc<Self>, checks: CheckSchedule, summary_every: Duration) -> Result<()> {
        let summaries = {
            let agent = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(summary_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = agent.summary().await {
                        tracing::warn!("Summary failed: {:#}", e);
                    }
                }
            })
        };

        loop {
            if let Err(e) = self.check_due().await {
                tracing::warn!("Due check failed: {:#}", e);
            }

            let Some(delay) = checks.next_delay(Utc::now()) else {
                tracing::info!("Schedule has no further runs");
                break;
            };
            tracing::debug!("Next due check in {}s", delay.as_secs());
            sleep(delay).await;
        }

        summaries.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::config::{AppState, ServerConfig};
    use parley_client::{ClientConfig, SseConfig};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    #[test]
    fn test_job_parsing() {
        assert_eq!("check_due".parse::<AgentJob>().unwrap(), AgentJob::CheckDue);
        assert_eq!("summary".parse::<AgentJob>().unwrap(), AgentJob::Summary);
        assert!("other".parse::<AgentJob>().is_err());
    }

    #[test]
    fn test_cron_schedule() {
        let schedule = CheckSchedule::cron("0 */15 * * * *").unwrap();
        let now = DateTime::parse_from_rfc3339("2024-01-01T10:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(schedule.next_delay(now), Some(Duration::from_secs(600)));

        assert!(CheckSchedule::cron("not cron").is_err());
    }

    #[test]
    fn test_interval_schedule() {
        let schedule = CheckSchedule::Every(Duration::from_secs(3600));
        assert_eq!(schedule.next_delay(Utc::now()), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_one_shot_jobs_against_server() {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(&ServerConfig::with_data_dir(dir.path())).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(api::serve_on(listener, state));

        let manager = McpClientManager::with_config(ClientConfig {
            sse: SseConfig::disabled(),
            ..Default::default()
        });
        let agent = ReminderAgent::new(Arc::new(manager));
        agent.connect(&format!("http://{}", addr)).await.unwrap();

        let due = agent.run_job(AgentJob::CheckDue).await.unwrap();
        assert_eq!(due, "No reminders are due.");

        let summary = agent.run_job(AgentJob::Summary).await.unwrap();
        assert!(summary.contains("Total reminders: 0"));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let agent = ReminderAgent::new(Arc::new(McpClientManager::new()));
        assert!(agent.connect("http://127.0.0.1:9").await.is_err());
    }
}
