//! Named collection of MCP client connections.

use crate::client::{McpClient, McpClientBuilder};
use crate::config::ClientConfig;
use crate::endpoint::normalize_base;
use parley_mcp::protocol::{CallToolResult, ToolSchema};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Split a `name:url` or bare-URL entry into `(name, url)`.
///
/// Bare URLs are named after their host segment with every
/// character outside ASCII `[A-Za-z0-9]` replaced by `_`.
pub fn parse_server_entry(entry: &str) -> (String, String) {
    let entry = entry.trim();

    if !entry.starts_with("http") {
        if let Some((name, url)) = entry.split_once(':') {
            return (name.trim().to_string(), url.trim().to_string());
        }
    }

    let without_scheme = entry.split_once("://").map(|(_, rest)| rest).unwrap_or(entry);
    let host = without_scheme.split('/').next().unwrap_or_default();
    let name = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    (name, entry.to_string())
}

/// Manages connections to several MCP servers by name.
pub struct McpClientManager {
    config: ClientConfig,
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
}

impl McpClientManager {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Every client created by this manager uses `config`.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Connect `name` to `url`.
    ///
    /// Reconnecting a name to the URL it already uses is a no-op; a
    /// different URL tears the old connection down first. Failed connects
    /// are not stored.
    pub async fn connect_server(&self, name: &str, url: &str) -> bool {
        let url = normalize_base(url);

        let previous = {
            let clients = self.clients.read().await;
            clients.get(name).cloned()
        };

        if let Some(existing) = previous {
            if existing.base_url() == url && existing.is_connected() {
                return true;
            }
            info!(server = name, old_url = %existing.base_url(), new_url = %url, "Replacing connection");
            self.disconnect_server(name).await;
        }

        let client = match McpClientBuilder::new()
            .base_url(url.clone())
            .config(self.config.clone())
            .build()
        {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!(server = name, url = %url, error = %e, "Invalid server configuration");
                return false;
            }
        };

        if !client.connect().await {
            warn!(server = name, url = %url, "Failed to connect to server");
            return false;
        }

        self.clients.write().await.insert(name.to_string(), client);
        info!(server = name, url = %url, "Server connected");
        true
    }

    /// Connect every entry independently; returns success per server name.
    pub async fn connect_servers_from_list<I, S>(&self, entries: I) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = BTreeMap::new();

        for entry in entries {
            let entry = entry.as_ref();
            if entry.trim().is_empty() {
                continue;
            }
            let (name, url) = parse_server_entry(entry);
            let connected = self.connect_server(&name, &url).await;
            results.insert(name, connected);
        }

        results
    }

    pub async fn get_client(&self, name: &str) -> Option<Arc<McpClient>> {
        self.clients.read().await.get(name).cloned()
    }

    /// Names of servers with a live connection, sorted.
    pub async fn get_connected_servers(&self) -> Vec<String> {
        let clients = self.clients.read().await;
        let mut names: Vec<String> = clients
            .iter()
            .filter(|(_, client)| client.is_connected())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Server name to base URL.
    pub async fn get_all_servers_info(&self) -> BTreeMap<String, String> {
        self.clients
            .read()
            .await
            .iter()
            .map(|(name, client)| (name.clone(), client.base_url().to_string()))
            .collect()
    }

    pub async fn disconnect_server(&self, name: &str) -> bool {
        match self.clients.write().await.remove(name) {
            Some(client) => {
                client.disconnect();
                true
            }
            None => false,
        }
    }

    pub async fn disconnect_all(&self) {
        let drained: Vec<_> = self.clients.write().await.drain().collect();
        for (name, client) in drained {
            client.disconnect();
            info!(server = %name, "Server disconnected");
        }
    }

    /// Tools advertised by every connected server.
    pub async fn list_all_tools(&self) -> BTreeMap<String, Vec<ToolSchema>> {
        let clients: Vec<_> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(name, client)| (name.clone(), client.clone()))
            .collect();

        let mut tools = BTreeMap::new();
        for (name, client) in clients {
            tools.insert(name, client.list_tools().await);
        }
        tools
    }

    pub async fn call_tool(&self, server: &str, tool: &str, arguments: Option<Value>) -> Option<CallToolResult> {
        let Some(client) = self.get_client(server).await else {
            warn!(server, tool, "No such server");
            return None;
        };
        client.call_tool(tool, arguments).await
    }
}

impl Default for McpClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SseConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager() -> McpClientManager {
        McpClientManager::with_config(ClientConfig {
            health_check: false,
            sse: SseConfig::disabled(),
            ..Default::default()
        })
    }

    async fn mcp_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": {"protocolVersion": "2024-11-05", "sessionId": "s1"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 2,
                "result": {"tools": [{"name": "echo"}]}
            })))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_parse_named_entry() {
        assert_eq!(
            parse_server_entry(" local : http://localhost:8080 "),
            ("local".to_string(), "http://localhost:8080".to_string())
        );
    }

    #[test]
    fn test_parse_bare_url() {
        assert_eq!(
            parse_server_entry("http://localhost:8080/mcp"),
            ("localhost_8080".to_string(), "http://localhost:8080/mcp".to_string())
        );
        assert_eq!(
            parse_server_entry("https://tools.example.com"),
            ("tools_example_com".to_string(), "https://tools.example.com".to_string())
        );
    }

    #[test]
    fn test_bare_url_name_is_ascii() {
        assert_eq!(
            parse_server_entry("http://bücher.example:9000"),
            ("b_cher_example_9000".to_string(), "http://bücher.example:9000".to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_and_list() {
        let server = mcp_server().await;
        let manager = manager();

        assert!(manager.connect_server("main", &format!("{}/", server.uri())).await);
        assert_eq!(manager.get_connected_servers().await, vec!["main".to_string()]);
        assert_eq!(manager.get_all_servers_info().await["main"], server.uri());

        let tools = manager.list_all_tools().await;
        assert_eq!(tools["main"][0].name, "echo");
    }

    #[tokio::test]
    async fn test_connect_same_url_is_idempotent() {
        let server = mcp_server().await;
        let manager = manager();

        assert!(manager.connect_server("main", &server.uri()).await);
        let first = manager.get_client("main").await.unwrap();
        assert!(manager.connect_server("main", &server.uri()).await);
        let second = manager.get_client("main").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failed_connect_not_stored() {
        let server = MockServer::start().await;
        let manager = manager();

        assert!(!manager.connect_server("dead", &server.uri()).await);
        assert!(manager.get_client("dead").await.is_none());
        assert!(manager.call_tool("dead", "echo", None).await.is_none());
    }

    #[tokio::test]
    async fn test_connect_from_list() {
        let good = mcp_server().await;
        let bad = MockServer::start().await;
        let manager = manager();

        let entries = vec![format!("good:{}", good.uri()), format!("bad:{}", bad.uri())];
        let results = manager.connect_servers_from_list(&entries).await;

        assert_eq!(results.get("good"), Some(&true));
        assert_eq!(results.get("bad"), Some(&false));

        manager.disconnect_all().await;
        assert!(manager.get_connected_servers().await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_server() {
        let server = mcp_server().await;
        let manager = manager();

        assert!(manager.connect_server("main", &server.uri()).await);
        let client = manager.get_client("main").await.unwrap();
        assert!(manager.disconnect_server("main").await);
        assert!(!manager.disconnect_server("main").await);
        assert!(!client.is_connected());
    }
}
