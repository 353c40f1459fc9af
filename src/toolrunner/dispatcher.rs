//! Request dispatch against the remote API.
//!
//! The [`Dispatcher`] executes a [`BuiltRequest`] and normalizes whatever
//! comes back — success, downstream error status, connection refused, garbage
//! body — into a [`ToolCallResult`]. It never returns `Err`: failures become
//! textual results so the orchestration loop can hand them to the LLM as
//! tool feedback and a direct atomic invocation can hand them to the caller,
//! through the exact same rendering.
//!
//! HTTP connections are pooled per base URL via a lazily-initialized global
//! client cache, so repeated calls against the same API reuse TCP/TLS state
//! instead of paying the handshake cost on every tool call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::toolrunner::config::AtomicTool;
use crate::toolrunner::request::{BuiltRequest, HttpVerb, RequestBuilder};

lazy_static! {
    /// Global cache of HTTP clients indexed by base URL.
    static ref CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> =
        Mutex::new(HashMap::new());
}

/// Get or create a pooled `reqwest::Client` for the given base URL.
///
/// Configured for persistent connections: 90s idle timeout, up to 10 idle
/// connections per host, TCP keepalive probes every 60 seconds.
fn pooled_client(base_url: &str) -> reqwest::Client {
    let mut pool = CLIENT_POOL.lock().unwrap();
    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client");

    pool.insert(base_url.to_string(), client.clone());
    client
}

/// Broad classification of a single atomic call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Downstream responded with a 2xx status.
    Success,
    /// Downstream responded with a non-2xx status. Recorded, never retried
    /// automatically.
    HttpError,
    /// The request never produced a response: connection refused, DNS
    /// failure, timeout, oversized body.
    TransportError,
    /// The endpoint mapping declared a verb outside the supported set.
    UnsupportedMethod,
}

/// Normalized outcome of one atomic call, whether invoked directly or from
/// inside an orchestration.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub status: CallStatus,
    /// HTTP status code, present for `Success` and `HttpError`.
    pub status_code: Option<u16>,
    /// Response body (pretty-printed JSON when parseable), or the error /
    /// method text for the non-HTTP variants.
    pub body: String,
}

impl ToolCallResult {
    pub fn success(status_code: u16, body: String) -> Self {
        ToolCallResult {
            status: CallStatus::Success,
            status_code: Some(status_code),
            body,
        }
    }

    pub fn http_error(status_code: u16, body: String) -> Self {
        ToolCallResult {
            status: CallStatus::HttpError,
            status_code: Some(status_code),
            body,
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        ToolCallResult {
            status: CallStatus::TransportError,
            status_code: None,
            body: message.into(),
        }
    }

    pub fn unsupported_method(method: impl Into<String>) -> Self {
        ToolCallResult {
            status: CallStatus::UnsupportedMethod,
            status_code: None,
            body: method.into(),
        }
    }

    /// Render the uniform text shape both direct invocation and
    /// orchestration feedback rely on: `"Status: <code>\n\n<body>"` for HTTP
    /// outcomes, `"Error: ..."` / `"Unsupported method: ..."` otherwise.
    pub fn render(&self) -> String {
        match self.status {
            CallStatus::Success | CallStatus::HttpError => {
                format!("Status: {}\n\n{}", self.status_code.unwrap_or(0), self.body)
            }
            CallStatus::TransportError => format!("Error: {}", self.body),
            CallStatus::UnsupportedMethod => format!("Unsupported method: {}", self.body),
        }
    }
}

/// Executes built requests with bounded time and size, folding every failure
/// mode into a [`ToolCallResult`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    timeout: Duration,
    max_response_size: usize,
}

impl Dispatcher {
    /// Create a dispatcher backed by the pooled client for `base_url`.
    ///
    /// Defaults: 30 second request timeout, 10MB response cap.
    pub fn new(base_url: &str) -> Self {
        Dispatcher {
            client: pooled_client(base_url),
            timeout: Duration::from_secs(30),
            max_response_size: 10 * 1024 * 1024,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the maximum response body size.
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Build and dispatch in one step: the convenience path used by both the
    /// façade (direct atomic invocation) and the orchestrator (LLM-requested
    /// calls). An unsupported verb becomes an `UnsupportedMethod` result
    /// here rather than an error.
    pub async fn call(
        &self,
        builder: &RequestBuilder,
        tool: &AtomicTool,
        arguments: &Map<String, Value>,
    ) -> ToolCallResult {
        match builder.build(tool, arguments) {
            Ok(built) => self.dispatch(built).await,
            Err(unsupported) => ToolCallResult::unsupported_method(unsupported.0),
        }
    }

    /// Execute a built request. Never returns `Err` — network and protocol
    /// failures come back as `TransportError` results.
    pub async fn dispatch(&self, request: BuiltRequest) -> ToolCallResult {
        let url = request.full_url();
        log::debug!("Dispatching {} {}", request.method, url);

        let mut req = match request.method {
            HttpVerb::Get => self.client.get(&url),
            HttpVerb::Post => self.client.post(&url),
            HttpVerb::Put => self.client.put(&url),
            HttpVerb::Delete => self.client.delete(&url),
            HttpVerb::Patch => self.client.patch(&url),
        };

        for (name, value) in &request.headers {
            req = req.header(name, value);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = match req.timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{} {} failed: {}", request.method, url, e);
                return ToolCallResult::transport_error(e.to_string());
            }
        };

        let status_code = response.status().as_u16();
        let raw_body = match self.read_body(response).await {
            Ok(body) => body,
            Err(message) => return ToolCallResult::transport_error(message),
        };

        // Pretty-print JSON bodies; fall back to the raw text otherwise.
        let body = match serde_json::from_str::<Value>(&raw_body) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw_body),
            Err(_) => raw_body,
        };

        if (200..300).contains(&status_code) {
            ToolCallResult::success(status_code, body)
        } else {
            log::warn!("{} {} returned status {}", request.method, url, status_code);
            ToolCallResult::http_error(status_code, body)
        }
    }

    /// Stream the body incrementally, aborting as soon as it exceeds
    /// `max_response_size` so an oversized response is never fully buffered.
    async fn read_body(&self, response: reqwest::Response) -> Result<String, String> {
        let mut stream = response.bytes_stream();
        let mut body_bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("Failed to read response body: {}", e))?;
            if body_bytes.len() + chunk.len() > self.max_response_size {
                return Err(format!(
                    "Response body exceeds maximum size of {} bytes",
                    self.max_response_size
                ));
            }
            body_bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body_bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_success_shape() {
        let result = ToolCallResult::success(200, "{\n  \"ok\": true\n}".to_string());
        assert_eq!(result.render(), "Status: 200\n\n{\n  \"ok\": true\n}");
    }

    #[test]
    fn test_render_http_error_keeps_status() {
        let result = ToolCallResult::http_error(404, "not found".to_string());
        assert_eq!(result.render(), "Status: 404\n\nnot found");
        assert_eq!(result.status, CallStatus::HttpError);
    }

    #[test]
    fn test_render_transport_error() {
        let result = ToolCallResult::transport_error("connection refused");
        assert_eq!(result.render(), "Error: connection refused");
        assert!(result.status_code.is_none());
    }

    #[test]
    fn test_render_unsupported_method() {
        let result = ToolCallResult::unsupported_method("TRACE");
        assert_eq!(result.render(), "Unsupported method: TRACE");
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_host_never_panics() {
        // Port 1 on localhost is essentially guaranteed closed; the failure
        // must come back as a TransportError result, not an Err or a panic.
        let dispatcher =
            Dispatcher::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2));
        let builder = RequestBuilder::new("http://127.0.0.1:1", "");
        let tool: AtomicTool = serde_json::from_value(json!({
            "name": "ping",
            "endpoint_mapping": {"method": "GET", "path": "/ping"}
        }))
        .unwrap();

        let result = dispatcher.call(&builder, &tool, &Map::new()).await;
        assert_eq!(result.status, CallStatus::TransportError);
        assert!(result.render().starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_unsupported_method_folds_into_result() {
        let dispatcher = Dispatcher::new("http://127.0.0.1:1");
        let builder = RequestBuilder::new("http://127.0.0.1:1", "");
        let tool: AtomicTool = serde_json::from_value(json!({
            "name": "opt",
            "endpoint_mapping": {"method": "OPTIONS", "path": "/x"}
        }))
        .unwrap();

        let result = dispatcher.call(&builder, &tool, &Map::new()).await;
        assert_eq!(result.status, CallStatus::UnsupportedMethod);
        assert_eq!(result.render(), "Unsupported method: OPTIONS");
    }

    #[test]
    fn test_client_pool_reuses_entries() {
        let _a = pooled_client("http://pool.test");
        let _b = pooled_client("http://pool.test");
        assert!(CLIENT_POOL.lock().unwrap().contains_key("http://pool.test"));
    }
}
