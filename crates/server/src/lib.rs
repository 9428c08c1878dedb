// HTTP surface of the Parley MCP server and the reminder agent

pub mod agent;
pub mod api;
pub mod config;
