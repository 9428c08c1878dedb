//! MCP client: one logical connection to one server.

use crate::config::{ClientConfig, RetryConfig, SseConfig};
use crate::endpoint::{normalize_base, sse_endpoint};
use crate::error::{ClientResult, McpClientError};
use crate::transport::{HttpTransport, SessionCell, SseHandle, SseListener};
use parley_mcp::protocol::{
    CallToolParams, CallToolResult, ClientInfo, InitializeParams, InitializeResult,
    JsonRpcRequest, ListResourcesResult, ListToolsResult, McpMethod, Notification,
    ReadResourceParams, Resource, ResourceContent, ServerInfo, ToolSchema,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Initializing,
    Connected,
    Disconnected,
}

/// Client for a single MCP server.
///
/// Facade methods (`list_tools`, `call_tool`, ...) collapse every failure to
/// an empty or `None` result; [`McpClient::request`] exposes the typed error.
pub struct McpClient {
    config: Arc<ClientConfig>,
    base_url: String,
    transport: HttpTransport,
    session: SessionCell,
    next_id: AtomicU64,
    state: RwLock<ConnectionState>,
    server_info: RwLock<Option<ServerInfo>>,
    notifications: broadcast::Sender<Notification>,
    sse_client: reqwest::Client,
    sse: Mutex<Option<SseHandle>>,
    sse_connected: Arc<AtomicBool>,
}

impl McpClient {
    /// Create a new client builder.
    pub fn builder() -> McpClientBuilder {
        McpClientBuilder::new()
    }

    /// Client with default configuration.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::builder().base_url(base_url).build()
    }

    fn from_config(base_url: String, config: ClientConfig) -> ClientResult<Self> {
        let config = Arc::new(config);
        let session = SessionCell::default();
        let transport = HttpTransport::new(&base_url, config.clone(), session.clone())?;

        // Streams stay open indefinitely; only the connect phase is bounded
        let sse_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let (notifications, _) = broadcast::channel(config.sse.channel_capacity.max(1));

        Ok(Self {
            config,
            base_url,
            transport,
            session,
            next_id: AtomicU64::new(1),
            state: RwLock::new(ConnectionState::Unconnected),
            server_info: RwLock::new(None),
            notifications,
            sse_client,
            sse: Mutex::new(None),
            sse_connected: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.get()
    }

    /// Identity reported by the server during `initialize`
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Health check, initialize, session capture, then start the SSE listener.
    ///
    /// Returns `false` when `initialize` fails on every endpoint.
    pub async fn connect(&self) -> bool {
        self.set_state(ConnectionState::Initializing);
        self.session.clear();

        if self.config.health_check && !self.transport.check_health().await {
            debug!(base_url = %self.base_url, "Continuing without a healthy health endpoint");
        }

        let params = InitializeParams {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: serde_json::json!({}),
            client_info: Some(self.config.client_info.clone()),
        };

        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "Failed to encode initialize params");
                self.set_state(ConnectionState::Unconnected);
                return false;
            }
        };

        let result: InitializeResult = match self.request(McpMethod::Initialize.as_str(), Some(params)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Failed to connect");
                self.set_state(ConnectionState::Unconnected);
                return false;
            }
        };

        match result.session_id.filter(|s| !s.is_empty()) {
            Some(session_id) => self.session.set(session_id),
            None if self.session.get().is_some() => {}
            None => self
                .session
                .set(format!("session_{}", chrono::Utc::now().timestamp_millis())),
        }

        *self.server_info.write().unwrap_or_else(|e| e.into_inner()) = result.server_info;
        self.set_state(ConnectionState::Connected);

        info!(
            base_url = %self.base_url,
            session_id = ?self.session.get(),
            protocol_version = %result.protocol_version,
            "Connected to MCP server"
        );

        if self.config.sse.enabled {
            self.restart_sse();
        }

        true
    }

    /// Stop the SSE listener and mark the connection closed.
    pub fn disconnect(&self) {
        if let Some(handle) = self.sse.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.stop();
        }
        self.sse_connected.store(false, Ordering::SeqCst);
        self.session.clear();
        self.set_state(ConnectionState::Disconnected);
        info!(base_url = %self.base_url, "Disconnected from MCP server");
    }

    /// Cancel any running listener and start a fresh one.
    pub fn restart_sse(&self) {
        let listener = SseListener::new(
            self.sse_client.clone(),
            sse_endpoint(&self.base_url),
            self.session.clone(),
            self.notifications.clone(),
            self.config.sse.retry.clone(),
            self.sse_connected.clone(),
        );

        let mut slot = self.sse.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        *slot = Some(listener.spawn());
    }

    /// Whether an SSE stream is currently open
    pub fn is_sse_connected(&self) -> bool {
        self.sse_connected.load(Ordering::SeqCst)
    }

    /// Receive every notification published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Send one JSON-RPC request and decode its result.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> ClientResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        self.transport.send(&request).await
    }

    /// Raw call; `None` on any failure
    pub async fn call(&self, method: &str, params: Option<Value>) -> Option<Value> {
        self.request::<Value>(method, params)
            .await
            .map_err(|e| warn!(method, error = %e, "MCP call failed"))
            .ok()
    }

    pub async fn list_tools(&self) -> Vec<ToolSchema> {
        match self.request::<ListToolsResult>(McpMethod::ToolsList.as_str(), None).await {
            Ok(result) => result.tools,
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Failed to list tools");
                Vec::new()
            }
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Option<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(params).ok()?;

        self.request::<CallToolResult>(McpMethod::ToolsCall.as_str(), Some(params))
            .await
            .map_err(|e| warn!(tool = name, error = %e, "Tool call failed"))
            .ok()
    }

    pub async fn list_resources(&self) -> Vec<Resource> {
        match self
            .request::<ListResourcesResult>(McpMethod::ResourcesList.as_str(), None)
            .await
        {
            Ok(result) => result.resources,
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Failed to list resources");
                Vec::new()
            }
        }
    }

    pub async fn get_resource(&self, uri: &str) -> Option<ResourceContent> {
        let params = serde_json::to_value(ReadResourceParams { uri: uri.to_string() }).ok()?;

        self.request::<ResourceContent>(McpMethod::ResourcesRead.as_str(), Some(params))
            .await
            .map_err(|e| warn!(uri, error = %e, "Failed to read resource"))
            .ok()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if let Some(handle) = self.sse.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            handle.stop();
        }
    }
}

/// Builder for creating an McpClient.
pub struct McpClientBuilder {
    base_url: Option<String>,
    config: ClientConfig,
}

impl McpClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            config: ClientConfig::default(),
        }
    }

    /// Set the base URL of the MCP server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-candidate request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Try the last successful endpoint first.
    pub fn cache_endpoint(mut self, enabled: bool) -> Self {
        self.config.cache_endpoint = enabled;
        self
    }

    pub fn health_check(mut self, enabled: bool) -> Self {
        self.config.health_check = enabled;
        self
    }

    /// Set the SSE listener configuration.
    pub fn sse(mut self, sse: SseConfig) -> Self {
        self.config.sse = sse;
        self
    }

    /// Set the SSE reconnect policy.
    pub fn sse_retry(mut self, retry: RetryConfig) -> Self {
        self.config.sse.retry = retry;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> ClientResult<McpClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| McpClientError::Config("base_url is required".to_string()))?;

        // Validate, but keep the caller's spelling (minus trailing slashes)
        Url::parse(base_url.trim())?;

        McpClient::from_config(normalize_base(&base_url), self.config)
    }
}

impl Default for McpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
