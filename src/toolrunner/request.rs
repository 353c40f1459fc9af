//! HTTP request construction for atomic tools.
//!
//! [`RequestBuilder`] turns one [`AtomicTool`] definition plus a map of call
//! arguments into a concrete [`BuiltRequest`]: method, URL with path
//! placeholders substituted, auth headers, and the verb-appropriate argument
//! placement. It performs no I/O — dispatching the built request is the
//! [`Dispatcher`](crate::dispatcher::Dispatcher)'s job — which keeps the
//! whole construction path unit-testable as plain string manipulation.
//!
//! # Placement rules
//!
//! - `GET` — arguments not consumed by path substitution become query
//!   parameters
//! - `POST` / `PUT` / `PATCH` — all arguments become a JSON body
//! - `DELETE` — arguments are ignored for body purposes (no body sent)
//! - anything else — rejected as [`UnsupportedMethod`], a per-call result
//!   rather than a fatal error

use std::fmt;

use serde_json::{Map, Value};

use crate::toolrunner::config::AtomicTool;

/// The HTTP verbs the runtime knows how to place arguments for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpVerb {
    /// Parse a verb case-insensitively. Returns `None` for anything outside
    /// the supported set (HEAD, OPTIONS, TRACE, typos, ...).
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpVerb::Get),
            "POST" => Some(HttpVerb::Post),
            "PUT" => Some(HttpVerb::Put),
            "DELETE" => Some(HttpVerb::Delete),
            "PATCH" => Some(HttpVerb::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An endpoint mapping declared a verb outside the supported set.
#[derive(Debug, Clone)]
pub struct UnsupportedMethod(pub String);

impl fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported method: {}", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

/// A fully constructed request, ready for dispatch.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub method: HttpVerb,
    /// Base URL + substituted path, without the query string.
    pub url: String,
    /// Headers to attach (auth and content negotiation).
    pub headers: Vec<(String, String)>,
    /// Query parameters (populated for GET only).
    pub query: Vec<(String, String)>,
    /// JSON body (populated for POST/PUT/PATCH only).
    pub body: Option<Value>,
}

impl BuiltRequest {
    /// The URL including the percent-encoded query string, if any.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { "&" } else { "?" };
        let params: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("{}{}{}", self.url, separator, params.join("&"))
    }
}

/// Builds [`BuiltRequest`]s for atomic tools against one configured API.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_key: String,
}

impl RequestBuilder {
    /// Create a builder for the given API base URL. `api_key` may be empty,
    /// in which case no `Authorization` header is injected.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        RequestBuilder {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Construct the concrete request for `tool` with the provided
    /// arguments.
    ///
    /// Every `{name}` placeholder in the endpoint path whose name matches an
    /// argument is substituted with the argument's string form. Placeholders
    /// with no matching argument are left verbatim in the URL — a documented
    /// limitation carried over from the configuration format, chosen over
    /// silently dropping them or failing the call.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedMethod`] when the endpoint mapping names a verb
    /// outside GET/POST/PUT/DELETE/PATCH. Callers fold this into a per-call
    /// result; it is never fatal.
    pub fn build(
        &self,
        tool: &AtomicTool,
        arguments: &Map<String, Value>,
    ) -> Result<BuiltRequest, UnsupportedMethod> {
        let method = HttpVerb::parse(&tool.endpoint_mapping.method)
            .ok_or_else(|| UnsupportedMethod(tool.endpoint_mapping.method.clone()))?;

        let mut path = tool.endpoint_mapping.path.clone();
        let mut consumed: Vec<&str> = Vec::new();
        for (key, value) in arguments {
            let placeholder = format!("{{{}}}", key);
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, &scalar_string(value));
                consumed.push(key.as_str());
            }
        }

        let url = format!("{}{}", self.base_url, path);

        let mut headers = Vec::new();
        if !self.api_key.is_empty() {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ));
        }

        let (query, body) = match method {
            // Arguments consumed by path substitution do not reappear as
            // query parameters.
            HttpVerb::Get => {
                let query = arguments
                    .iter()
                    .filter(|(k, _)| !consumed.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), scalar_string(v)))
                    .collect();
                (query, None)
            }
            HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch => {
                (Vec::new(), Some(Value::Object(arguments.clone())))
            }
            // DELETE sends no body; arguments only matter for path substitution.
            HttpVerb::Delete => (Vec::new(), None),
        };

        Ok(BuiltRequest {
            method,
            url,
            headers,
            query,
            body,
        })
    }
}

/// The string form of an argument as it appears in paths and query strings:
/// plain strings are used as-is (no JSON quoting), everything else is its
/// compact JSON rendering.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
