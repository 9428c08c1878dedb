//! Server-Sent Events listener with supervised reconnects.

use crate::config::RetryConfig;
use crate::transport::SessionCell;
use futures_util::StreamExt;
use parley_mcp::protocol::{Notification, SESSION_HEADER};
use reqwest::{header, Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Splits a byte stream into lines. Chunk boundaries never split a line and
/// a trailing `\r` is dropped.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

/// One classified SSE line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Event boundary
    Blank,
    /// `data:` payload
    Data(String),
    /// `event:`, `id:` or `retry:` field
    Field { name: String, value: String },
    /// `:` comment (keep-alive)
    Comment,
    /// Anything else, handled as data
    Raw(String),
}

impl SseLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        if line.starts_with(':') {
            return Self::Comment;
        }
        if let Some(data) = line.strip_prefix("data:") {
            return Self::Data(data.trim_start().to_string());
        }
        for name in ["event", "id", "retry"] {
            if let Some(value) = line
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix(':'))
            {
                return Self::Field {
                    name: name.to_string(),
                    value: value.trim_start().to_string(),
                };
            }
        }
        Self::Raw(line.to_string())
    }

    /// The payload to decode as a notification, if any
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Data(data) | Self::Raw(data) => Some(data),
            _ => None,
        }
    }
}

/// Handle to a running listener
#[derive(Debug)]
pub struct SseHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SseHandle {
    /// Cancel the listener. It stops at its next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum StreamEnd {
    Closed,
    Failed(String),
    Unsupported(StatusCode),
}

/// Supervised SSE listener for one connection
pub struct SseListener {
    client: Client,
    url: String,
    session: SessionCell,
    sender: broadcast::Sender<Notification>,
    retry: RetryConfig,
    connected: Arc<AtomicBool>,
}

impl SseListener {
    pub fn new(
        client: Client,
        url: String,
        session: SessionCell,
        sender: broadcast::Sender<Notification>,
        retry: RetryConfig,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            url,
            session,
            sender,
            retry,
            connected,
        }
    }

    /// Run the listener in the background.
    pub fn spawn(self) -> SseHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        SseHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            let mut delivered = 0usize;
            let end = tokio::select! {
                _ = cancel.cancelled() => break,
                end = self.stream_once(&mut delivered) => end,
            };
            self.connected.store(false, Ordering::SeqCst);

            if delivered > 0 {
                attempt = 0;
            }

            match end {
                StreamEnd::Unsupported(status) => {
                    info!(url = %self.url, status = status.as_u16(), "Server has no push channel, SSE listener exiting");
                    break;
                }
                StreamEnd::Closed => debug!(url = %self.url, "SSE stream closed"),
                StreamEnd::Failed(reason) => warn!(url = %self.url, error = %reason, "SSE stream failed"),
            }

            if !self.retry.allows(attempt) {
                warn!(url = %self.url, attempts = attempt, "SSE reconnect attempts exhausted");
                break;
            }

            let backoff = self.retry.jittered_backoff(attempt);
            attempt += 1;
            debug!(url = %self.url, attempt, backoff_ms = backoff.as_millis() as u64, "Reconnecting SSE");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        debug!(url = %self.url, "SSE listener stopped");
    }

    async fn stream_once(&self, delivered: &mut usize) -> StreamEnd {
        let mut request = self
            .client
            .get(&self.url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache");

        if let Some(session_id) = self.session.get() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return StreamEnd::Failed(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            return StreamEnd::Unsupported(status);
        }
        if !status.is_success() {
            return StreamEnd::Failed(format!("HTTP {}", status.as_u16()));
        }

        info!(url = %self.url, "SSE stream connected");
        self.connected.store(true, Ordering::SeqCst);

        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return StreamEnd::Failed(e.to_string()),
            };

            for line in lines.push(&chunk) {
                *delivered += 1;
                self.handle_line(&line);
            }
        }

        if let Some(rest) = lines.finish() {
            *delivered += 1;
            self.handle_line(&rest);
        }

        StreamEnd::Closed
    }

    fn handle_line(&self, line: &str) {
        let parsed = SseLine::parse(line);

        if let SseLine::Field { name, value } = &parsed {
            debug!(field = %name, value = %value, "SSE field");
            return;
        }

        let Some(payload) = parsed.payload() else {
            return;
        };

        match serde_json::from_str::<Notification>(payload) {
            Ok(notification) => {
                debug!(method = ?notification.method, "SSE notification");
                // No subscribers is fine
                let _ = self.sender.send(notification);
            }
            Err(e) => debug!(error = %e, data = %payload, "Dropping undecodable SSE data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_line_buffer_joins_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"me").is_empty());
        let lines = buffer.push(b"thod\":\"x\"}\r\n\r\nda");
        assert_eq!(lines, vec!["data: {\"method\":\"x\"}", ""]);
        assert_eq!(buffer.finish().as_deref(), Some("da"));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_chars() {
        let mut buffer = SseLineBuffer::new();
        let bytes = "data: é\n".as_bytes();
        assert!(buffer.push(&bytes[..7]).is_empty());
        assert_eq!(buffer.push(&bytes[7..]), vec!["data: é"]);
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(SseLine::parse("   "), SseLine::Blank);
        assert_eq!(SseLine::parse("data: {}"), SseLine::Data("{}".to_string()));
        assert_eq!(SseLine::parse("data:{}"), SseLine::Data("{}".to_string()));
        assert_eq!(
            SseLine::parse("event: message"),
            SseLine::Field {
                name: "event".to_string(),
                value: "message".to_string()
            }
        );
        assert_eq!(SseLine::parse(": keep-alive"), SseLine::Comment);
        assert_eq!(SseLine::parse("{\"a\":1}"), SseLine::Raw("{\"a\":1}".to_string()));
        assert!(SseLine::parse("retry: 10").payload().is_none());
    }

    fn listener(url: String, sender: broadcast::Sender<Notification>, retry: RetryConfig) -> (SseListener, Arc<AtomicBool>) {
        let connected = Arc::new(AtomicBool::new(false));
        (
            SseListener::new(Client::new(), url, SessionCell::default(), sender, retry, connected.clone()),
            connected,
        )
    }

    #[tokio::test]
    async fn test_data_lines_reach_subscribers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(
                        "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/test\"}\n\ndata: not json\n\n",
                    ),
            )
            .mount(&server)
            .await;

        let (sender, mut rx) = broadcast::channel(16);
        let retry = RetryConfig {
            initial_backoff: Duration::from_secs(60),
            ..Default::default()
        };
        let (listener, _) = listener(format!("{}/sse", server.uri()), sender, retry);
        let handle = listener.spawn();

        let notification = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.method.as_deref(), Some("notifications/test"));

        handle.stop();
    }

    #[tokio::test]
    async fn test_listener_exits_on_404() {
        let server = MockServer::start().await;
        let (sender, _rx) = broadcast::channel(16);
        let (listener, connected) = listener(format!("{}/sse", server.uri()), sender, RetryConfig::default());

        let handle = listener.spawn();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_listener_stops_when_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let (sender, _rx) = broadcast::channel(16);
        let retry = RetryConfig {
            max_retries: Some(2),
            initial_backoff: Duration::from_millis(10),
            jitter: 0.0,
            ..Default::default()
        };
        let (listener, _) = listener(format!("{}/sse", server.uri()), sender, retry);

        let handle = listener.spawn();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_listener() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (sender, _rx) = broadcast::channel(16);
        let retry = RetryConfig {
            initial_backoff: Duration::from_secs(60),
            ..Default::default()
        };
        let (listener, _) = listener(format!("{}/sse", server.uri()), sender, retry);

        let handle = listener.spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
