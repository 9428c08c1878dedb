// JSON-RPC dispatcher for the MCP server

use crate::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListResourcesResult, ListToolsResult, McpMethod, ReadResourceParams, Resource,
    ResourceContent, ServerCapabilities, ServerInfo, ToolsCapability, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use serde::Serialize;
use serde_json::Value;

pub const SERVER_NAME: &str = "parley-mcp-server";

/// Failures that surface as JSON-RPC error envelopes
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Method not found: {0}")]
    UnknownMethod(String),

    #[error("Invalid JSON-RPC version: {0}")]
    InvalidVersion(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownMethod(method) => JsonRpcError::method_not_found(&method),
            e @ DispatchError::InvalidVersion(_) => JsonRpcError::invalid_request(e.to_string()),
            DispatchError::InvalidParams(message) => JsonRpcError::invalid_params(message),
            e @ DispatchError::Internal(_) => JsonRpcError::internal_error(e.to_string()),
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| DispatchError::Internal(e.to_string()))
}

/// MCP server: owns the tool registry and answers JSON-RPC requests
pub struct McpServer {
    registry: ToolRegistry,
    version: String,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle a raw request body. Unparseable input yields a `-32700`
    /// envelope with a null id; notifications yield `None`.
    pub async fn handle_body(&self, body: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(body) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!("Rejected unparseable request: {}", e);
                Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
            }
        }
    }

    /// Handle a decoded request. Notifications (no id) get no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!("Notification received: {}", request.method);
            return None;
        };

        let response = match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::debug!("Request {} failed: {}", id, e);
                JsonRpcResponse::error(id, e.into())
            }
        };
        Some(response)
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, DispatchError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(DispatchError::InvalidVersion(request.jsonrpc));
        }

        let method: McpMethod = request
            .method
            .parse()
            .map_err(|_| DispatchError::UnknownMethod(request.method.clone()))?;

        tracing::debug!("Dispatching {}", method);

        match method {
            McpMethod::Initialize => to_value(self.initialize()),
            McpMethod::ToolsList => to_value(ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            McpMethod::ToolsCall => {
                let params: CallToolParams = request
                    .params
                    .and_then(|p| serde_json::from_value(p).ok())
                    .ok_or_else(|| {
                        DispatchError::InvalidParams("Missing required parameter 'name'".to_string())
                    })?;

                let arguments = params.arguments.unwrap_or(Value::Null);
                to_value(self.registry.call(&params.name, arguments).await)
            }
            McpMethod::ResourcesList => to_value(ListResourcesResult {
                resources: demo_resources(),
            }),
            McpMethod::ResourcesRead => {
                let uri = request
                    .params
                    .and_then(|p| serde_json::from_value::<ReadResourceParams>(p).ok())
                    .map(|p| p.uri)
                    .unwrap_or_default();
                to_value(self.read_resource(&uri))
            }
        }
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Some(ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                resources: Some(serde_json::json!({})),
            }),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: self.version.clone(),
            }),
            session_id: None,
        }
    }

    fn read_resource(&self, uri: &str) -> ResourceContent {
        let text = match uri {
            "file:///example.txt" => {
                "This is an example resource content.\nIt demonstrates how MCP resources work."
                    .to_string()
            }
            "file:///server-info.json" => serde_json::json!({
                "name": SERVER_NAME,
                "version": self.version,
                "status": "running",
                "tools": self.registry.len(),
            })
            .to_string(),
            other => format!("Resource not found: {}", other),
        };

        let mime_type = if uri.ends_with(".json") {
            "application/json"
        } else {
            "text/plain"
        };

        ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(mime_type.to_string()),
            text: Some(text),
            blob: None,
        }
    }
}

fn demo_resources() -> Vec<Resource> {
    vec![
        Resource {
            uri: "file:///example.txt".to_string(),
            name: "Example Resource".to_string(),
            description: Some("An example text resource".to_string()),
            mime_type: Some("text/plain".to_string()),
        },
        Resource {
            uri: "file:///server-info.json".to_string(),
            name: "Server Information".to_string(),
            description: Some("Information about this MCP server".to_string()),
            mime_type: Some("application/json".to_string()),
        },
    ]
}
