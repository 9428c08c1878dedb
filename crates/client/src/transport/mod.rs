//! Transport layer for the MCP client.

pub mod http;
pub mod sse;

pub use http::HttpTransport;
pub use sse::{SseHandle, SseLine, SseLineBuffer, SseListener};

use std::sync::{Arc, RwLock};

/// Session id shared between request calls and the SSE listener.
///
/// Last writer wins; the lock is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct SessionCell(Arc<RwLock<Option<String>>>);

impl SessionCell {
    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, session_id: impl Into<String>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = Some(session_id.into());
    }

    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
