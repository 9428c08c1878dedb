use anyhow::Result;
use clap::Parser;
use parley_client::McpClientManager;
use parley_server::agent::{AgentJob, CheckSchedule, ReminderAgent};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "parley-reminder-agent")]
#[command(about = "Periodically reports due reminders from a Parley server", long_about = None)]
struct Args {
    /// Base URL of the MCP server
    #[arg(long, env = "PARLEY_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,

    /// Minutes between due-reminder checks
    #[arg(long, default_value = "60")]
    check_interval_minutes: u64,

    /// Hours between summaries
    #[arg(long, default_value = "6")]
    summary_interval_hours: u64,

    /// Cron expression (seconds first) for due checks, replaces the interval
    #[arg(long)]
    schedule: Option<String>,

    /// Run a single job and exit: check_due or summary
    #[arg(long)]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let agent = Arc::new(ReminderAgent::new(Arc::new(McpClientManager::new())));
    agent.connect(&args.server_url).await?;

    if let Some(job) = args.once {
        let job: AgentJob = job.parse()?;
        agent.run_job(job).await?;
        return Ok(());
    }

    let checks = match args.schedule.as_deref() {
        Some(expression) => CheckSchedule::cron(expression)?,
        None => CheckSchedule::Every(Duration::from_secs(args.check_interval_minutes.max(1) * 60)),
    };
    let summary_every = Duration::from_secs(args.summary_interval_hours.max(1) * 3600);

    tracing::info!("Reminder agent started");
    agent.run(checks, summary_every).await
}
