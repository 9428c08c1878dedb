// MCP (Model Context Protocol) wire types, tools and JSON-RPC dispatcher

pub mod notify;
pub mod protocol;
pub mod server;
pub mod tools;

pub use notify::NotificationHub;
pub use server::{DispatchError, McpServer};
