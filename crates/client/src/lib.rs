//! # Parley client
//!
//! Client for MCP servers that speak JSON-RPC 2.0 over HTTP POST and push
//! notifications over Server-Sent Events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_client::McpClientManager;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = McpClientManager::new();
//!
//!     if manager.connect_server("local", "http://127.0.0.1:8080").await {
//!         let result = manager
//!             .call_tool("local", "echo", Some(json!({"text": "hello"})))
//!             .await;
//!         println!("{:?}", result);
//!     }
//! }
//! ```
//!
//! ## Notifications
//!
//! ```rust,no_run
//! use parley_client::McpClient;
//!
//! # async fn example() -> parley_client::ClientResult<()> {
//! let client = McpClient::builder()
//!     .base_url("http://127.0.0.1:8080")
//!     .build()?;
//!
//! let mut notifications = client.subscribe();
//! client.connect().await;
//!
//! while let Ok(notification) = notifications.recv().await {
//!     println!("{:?}", notification.method);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod transport;

pub use client::{ConnectionState, McpClient, McpClientBuilder};
pub use config::{ClientConfig, RetryConfig, SseConfig};
pub use error::{ClientResult, McpClientError};
pub use manager::{parse_server_entry, McpClientManager};

// Re-export protocol types callers see in results
pub use parley_mcp::protocol::{
    CallToolResult, Notification, Resource, ResourceContent, ServerInfo, ToolContent, ToolSchema,
};
