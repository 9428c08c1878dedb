use anyhow::{Context, Result};
use parley_core::storage::{InformationStore, ReminderStore};
use parley_core::tracker::IssueTracker;
use parley_mcp::tools::{
    CalculateTool, CurrentTimeTool, EchoTool, PageFetcher, ReminderTool, SaveInfoTool,
    ToolRegistry, TrackerTool,
};
use parley_mcp::{McpServer, NotificationHub};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub sse: SseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_reminders_file")]
    pub reminders_file: String,

    #[serde(default = "default_information_file")]
    pub information_file: String,
}

fn default_reminders_file() -> String {
    "reminders.json".to_string()
}

fn default_information_file() -> String {
    "information.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reminders_file: default_reminders_file(),
            information_file: default_information_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Hosts `save_info` may fetch from; empty admits any host
    #[serde(default)]
    pub allowed_fetch_domains: Vec<String>,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allowed_fetch_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl ServerConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            storage: Default::default(),
            tools: Default::default(),
            sse: Default::default(),
        }
    }

    pub fn load(config_path: &Path, data_dir: PathBuf) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        // Load config file if it exists, otherwise use defaults
        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self::with_data_dir(&data_dir)
        };

        config.data_dir = data_dir;

        Ok(config)
    }

    /// Get the reminders file path
    pub fn reminders_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.reminders_file)
    }

    /// Get the information file path
    pub fn information_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.information_file)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.sse.keep_alive_secs.max(1))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub reminders: Arc<ReminderStore>,
    pub information: Arc<InformationStore>,
    pub tracker: Arc<IssueTracker>,
    pub hub: NotificationHub,
    pub server: Arc<McpServer>,
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let reminders = Arc::new(
            ReminderStore::new(config.reminders_path()).context("Failed to open reminder store")?,
        );

        let information = Arc::new(
            InformationStore::new(config.information_path())
                .context("Failed to open information store")?,
        );

        let fetcher = Arc::new(
            PageFetcher::new(
                Duration::from_secs(config.tools.fetch_timeout_secs),
                config.tools.allowed_fetch_domains.clone(),
            )
            .context("Failed to create page fetcher")?,
        );

        let tracker = Arc::new(IssueTracker::new());
        let hub = NotificationHub::new(config.sse.channel_capacity);

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(CurrentTimeTool));
        registry.register(Arc::new(CalculateTool));
        registry.register(Arc::new(TrackerTool::new(tracker.clone())));
        registry.register(Arc::new(ReminderTool::new(reminders.clone(), hub.clone())));
        registry.register(Arc::new(SaveInfoTool::new(
            information.clone(),
            fetcher,
            hub.clone(),
        )));

        tracing::info!("Registered {} tools", registry.len());

        Ok(Self {
            reminders,
            information,
            tracker,
            hub,
            server: Arc::new(McpServer::new(registry)),
            keep_alive: config.keep_alive(),
        })
    }
}
