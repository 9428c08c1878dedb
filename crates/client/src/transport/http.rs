//! HTTP transport: JSON-RPC over POST with endpoint fallback.

use crate::config::ClientConfig;
use crate::endpoint::{candidate_endpoints, health_endpoint};
use crate::error::{ClientResult, McpClientError};
use crate::transport::SessionCell;
use parley_mcp::protocol::{EnvelopeError, JsonRpcRequest, JsonRpcResponse, SESSION_HEADER};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};

/// HTTP transport for making JSON-RPC requests against one server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
    base_url: String,
    candidates: Arc<Vec<String>>,
    preferred: Arc<RwLock<Option<String>>>,
    session: SessionCell,
}

impl HttpTransport {
    /// Create a new HTTP transport for `base_url`.
    pub fn new(base_url: &str, config: Arc<ClientConfig>, session: SessionCell) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.to_string(),
            candidates: Arc::new(candidate_endpoints(base_url)),
            preferred: Arc::new(RwLock::new(None)),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Candidate endpoints in the order the next call will try them.
    pub fn endpoints(&self) -> Vec<String> {
        let preferred = self.preferred.read().unwrap_or_else(|e| e.into_inner()).clone();

        match preferred {
            Some(first) => std::iter::once(first.clone())
                .chain(self.candidates.iter().filter(|c| **c != first).cloned())
                .collect(),
            None => self.candidates.as_ref().clone(),
        }
    }

    fn remember(&self, endpoint: &str) {
        if self.config.cache_endpoint {
            *self.preferred.write().unwrap_or_else(|e| e.into_inner()) = Some(endpoint.to_string());
        }
    }

    fn forget(&self, endpoint: &str) {
        let mut preferred = self.preferred.write().unwrap_or_else(|e| e.into_inner());
        if preferred.as_deref() == Some(endpoint) {
            debug!(endpoint, "Evicting cached endpoint");
            *preferred = None;
        }
    }

    /// Non-fatal liveness check.
    pub async fn check_health(&self) -> bool {
        let url = health_endpoint(&self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %url, "Health check passed");
                true
            }
            Ok(response) => {
                warn!(url = %url, status = response.status().as_u16(), "Health check failed");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }

    /// Send one request, trying candidates until one yields a decodable result.
    pub async fn send<T: DeserializeOwned>(&self, request: &JsonRpcRequest) -> ClientResult<T> {
        let body = serde_json::to_string(request)?;
        let endpoints = self.endpoints();
        let mut last_error = None;

        for endpoint in &endpoints {
            match self.attempt::<T>(endpoint, &body).await {
                Ok(result) => {
                    debug!(endpoint = %endpoint, method = %request.method, "Request succeeded");
                    self.remember(endpoint);
                    return Ok(result);
                }
                Err(e) => {
                    debug!(endpoint = %endpoint, method = %request.method, error = %e, "Endpoint failed");
                    self.forget(endpoint);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no candidate endpoints".to_string());
        error!(base_url = %self.base_url, method = %request.method, "All endpoints failed");

        Err(McpClientError::ConnectionFailed {
            candidates: endpoints.len(),
            last,
        })
    }

    async fn attempt<T: DeserializeOwned>(&self, endpoint: &str, body: &str) -> ClientResult<T> {
        let mut request = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body.to_string());

        if let Some(session_id) = self.session.get() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| McpClientError::from_reqwest(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        self.capture_session(&response);

        let text = response
            .text()
            .await
            .map_err(|e| McpClientError::from_reqwest(endpoint, e))?;

        decode_response(endpoint, &text)
    }

    fn capture_session(&self, response: &Response) {
        let header_value = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        if let Some(session_id) = header_value {
            debug!(session_id, "Captured session id from header");
            self.session.set(session_id);
        }
    }
}

/// Decode a 2xx body into the typed result, treating anything else as a protocol failure.
fn decode_response<T: DeserializeOwned>(endpoint: &str, text: &str) -> ClientResult<T> {
    if text.trim().is_empty() {
        return Err(McpClientError::protocol(endpoint, "empty response body"));
    }

    let envelope: JsonRpcResponse = serde_json::from_str(text)
        .map_err(|e| McpClientError::protocol(endpoint, format!("invalid JSON-RPC body: {}", e)))?;

    let result = envelope.into_result().map_err(|e| match e {
        EnvelopeError::Rpc(rpc) => McpClientError::protocol(endpoint, rpc.to_string()),
        malformed => McpClientError::protocol(endpoint, malformed.to_string()),
    })?;

    serde_json::from_value(result)
        .map_err(|e| McpClientError::protocol(endpoint, format!("unexpected result shape: {}", e)))
}
