use super::ApiResult;
use crate::config::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::Stream;
use parley_mcp::protocol::SESSION_HEADER;
use parley_mcp::server::SERVER_NAME;
use std::sync::Arc;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

/// Session id from the request header, or a fresh one
fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("session_{}", chrono::Utc::now().timestamp_millis()))
}

/// JSON-RPC over POST
pub async fn handle_jsonrpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let session = session_id(&headers);

    match state.server.handle_body(&body).await {
        None => (StatusCode::ACCEPTED, [(SESSION_HEADER, session)]).into_response(),
        Some(response) => {
            let status = match &response.error {
                Some(error) if error.is_parse_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::OK,
            };
            (status, [(SESSION_HEADER, session)], Json(response)).into_response()
        }
    }
}

/// Plain-text hint for GET on a JSON-RPC path
pub async fn usage_hint() -> &'static str {
    "MCP JSON-RPC endpoint. Send JSON-RPC 2.0 requests with POST (Content-Type: application/json)."
}

/// Notification stream
pub async fn sse_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::info!("SSE subscriber connected");

    let stream = BroadcastStream::new(state.hub.subscribe()).filter_map(|message| match message {
        Ok(notification) => Some(Event::default().json_data(notification)),
        Err(lagged) => {
            tracing::warn!("SSE subscriber fell behind: {}", lagged);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Plain-text server description
pub async fn describe(State(state): State<Arc<AppState>>) -> ApiResult<String> {
    let reminders = state.reminders.stats().await?;
    let information = state.information.stats().await?;
    let tools = state
        .server
        .registry()
        .list_schemas()
        .into_iter()
        .map(|schema| schema.name)
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "{} v{}\n\n\
         Endpoints:\n  \
         POST /mcp, /mcp/message, /message  JSON-RPC 2.0\n  \
         GET  /sse                          notifications\n  \
         GET  /health                       health check\n\n\
         Tools: {}\n\
         Reminders: {} ({} pending)\n\
         Saved information: {}\n",
        SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
        tools,
        reminders.total,
        reminders.pending,
        information.total,
    ))
}
