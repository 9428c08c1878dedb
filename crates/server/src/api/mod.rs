use crate::config::{AppState, ServerConfig};
use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the API server
pub async fn serve(addr: &str, config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config)?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("MCP server listening on {}", addr);

    serve_on(listener, state).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // JSON-RPC endpoints
        .route("/mcp", get(handlers::usage_hint).post(handlers::handle_jsonrpc))
        .route("/mcp/message", get(handlers::usage_hint).post(handlers::handle_jsonrpc))
        .route("/message", get(handlers::usage_hint).post(handlers::handle_jsonrpc))
        // Server push
        .route("/sse", get(handlers::sse_stream))
        // Informational routes
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::describe))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Error type for the non-JSON-RPC handlers
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_msg = self.0.to_string();
        let details = self.0.chain().skip(1).map(|e| e.to_string()).collect::<Vec<_>>().join(": ");

        tracing::warn!("Request failed: {}", error_msg);

        let response = if details.is_empty() {
            ErrorResponse::new(error_msg)
        } else {
            ErrorResponse::with_details(error_msg, details)
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use parley_mcp::protocol::SESSION_HEADER;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn router(dir: &TempDir) -> Router {
        let state = AppState::new(&ServerConfig::with_data_dir(dir.path())).unwrap();
        create_router(state)
    }

    fn post(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_all_post_paths_answer() {
        let dir = TempDir::new().unwrap();
        let request = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;

        for path in ["/mcp", "/mcp/message", "/message"] {
            let response = router(&dir).oneshot(post(path, request)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "path {path}");

            let body = body_json(response).await;
            assert_eq!(body["id"], 1);
            assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 6);
        }
    }

    #[tokio::test]
    async fn test_session_header_echoed() {
        let dir = TempDir::new().unwrap();
        let mut request = post("/mcp", r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#);
        request
            .headers_mut()
            .insert(SESSION_HEADER, "client-session".parse().unwrap());

        let response = router(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[SESSION_HEADER], "client-session");
    }

    #[tokio::test]
    async fn test_session_header_generated() {
        let dir = TempDir::new().unwrap();
        let response = router(&dir)
            .oneshot(post("/mcp", r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#))
            .await
            .unwrap();

        let session = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();
        assert!(session.starts_with("session_"));

        let body = body_json(response).await;
        assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(body["result"]["serverInfo"]["name"], "parley-mcp-server");
    }

    #[tokio::test]
    async fn test_parse_error_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let response = router(&dir).oneshot(post("/mcp", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_notification_accepted() {
        let dir = TempDir::new().unwrap();
        let response = router(&dir)
            .oneshot(post("/message", r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_result_not_error() {
        let dir = TempDir::new().unwrap();
        let request = json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "nope", "arguments": {}}
        });
        let response = router(&dir)
            .oneshot(post("/mcp", &request.to_string()))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert!(body.get("error").is_none());
        assert_eq!(body["result"]["isError"], true);
        assert!(body["result"]["content"][0]["text"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_informational_routes() {
        let dir = TempDir::new().unwrap();

        let response = router(&dir)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");

        let response = router(&dir)
            .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_text(response).await.contains("POST"));

        let response = router(&dir)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains("parley-mcp-server"));
        assert!(text.contains("Reminders: 0"));
    }

    #[tokio::test]
    async fn test_describe_reports_store_failure() {
        let dir = TempDir::new().unwrap();
        let app = router(&dir);
        std::fs::write(dir.path().join("reminders.json"), "{corrupt").unwrap();

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    async fn spawn_server(dir: &TempDir) -> (String, AppState) {
        let state = AppState::new(&ServerConfig::with_data_dir(dir.path())).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve_on(listener, state.clone()));
        (url, state)
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        use parley_client::{McpClientManager, SseConfig};

        let dir = TempDir::new().unwrap();
        let (url, _state) = spawn_server(&dir).await;

        let manager = McpClientManager::with_config(parley_client::ClientConfig {
            sse: SseConfig::disabled(),
            ..Default::default()
        });
        assert!(manager.connect_server("local", &url).await);

        let client = manager.get_client("local").await.unwrap();
        assert!(client.session_id().unwrap().starts_with("session_"));
        assert_eq!(client.server_info().unwrap().name, "parley-mcp-server");
        assert_eq!(client.list_tools().await.len(), 6);

        let result = manager
            .call_tool("local", "calculate", Some(json!({"expression": "2+3"})))
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("Result: 5.0"));

        let result = manager
            .call_tool("local", "calculate", Some(json!({"expression": "10/0"})))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("Division by zero"));

        let resource = client.get_resource("file:///example.txt").await.unwrap();
        assert!(resource.text.unwrap().starts_with("This is an example resource"));
        assert_eq!(client.list_resources().await.len(), 2);
    }

    #[tokio::test]
    async fn test_notifications_reach_client() {
        use parley_client::{McpClient, RetryConfig};
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let (url, state) = spawn_server(&dir).await;

        let client = McpClient::builder()
            .base_url(url)
            .sse_retry(RetryConfig {
                initial_backoff: Duration::from_millis(50),
                ..Default::default()
            })
            .build()
            .unwrap();
        let mut notifications = client.subscribe();
        assert!(client.connect().await);

        tokio::time::timeout(Duration::from_secs(5), async {
            while state.hub.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        let result = client
            .call_tool("reminder", Some(json!({"action": "create", "title": "Water plants"})))
            .await
            .unwrap();
        assert!(!result.is_error);

        let notification = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            notification.method.as_deref(),
            Some("notifications/reminders/changed")
        );
        assert!(client.is_sse_connected());

        client.disconnect();
    }

    #[tokio::test]
    async fn test_sse_content_type() {
        let dir = TempDir::new().unwrap();
        let response = router(&dir)
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
    }
}
