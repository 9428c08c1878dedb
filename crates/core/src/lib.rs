// Tool backends for the Parley MCP server

pub mod types;
pub mod storage;
pub mod tracker;
pub mod calculator;

pub use types::*;
