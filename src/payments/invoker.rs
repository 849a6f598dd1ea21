//! Outbound service call abstraction.
//!
//! The orchestrator never talks HTTP directly; it hands a fully built
//! [`OutboundCall`] to a [`ServiceInvoker`]. Production uses
//! [`HttpServiceInvoker`]; tests swap in a recording mock to assert that
//! failed payments make zero downstream calls.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Hard ceiling on one downstream provider call. A stuck provider must
/// never hang the request indefinitely.
pub const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// One fully prepared outbound request.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub url: String,
    /// Upper-case HTTP method; anything unrecognized falls back to POST.
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// What came back from the provider on success.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: u16,
    /// Parsed JSON when the provider returned JSON, otherwise the raw body
    /// as a string value.
    pub body: Value,
}

#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    /// Execute the call. Non-2xx responses and timeouts are errors; the
    /// error string is what ends up in the composite execution result.
    async fn invoke(&self, call: &OutboundCall) -> Result<DownstreamResponse, String>;
}

pub struct HttpServiceInvoker {
    client: reqwest::Client,
}

impl HttpServiceInvoker {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(DOWNSTREAM_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ServiceInvoker for HttpServiceInvoker {
    async fn invoke(&self, call: &OutboundCall) -> Result<DownstreamResponse, String> {
        let method = match call.method.as_str() {
            "GET" => reqwest::Method::GET,
            "PUT" => reqwest::Method::PUT,
            "DELETE" => reqwest::Method::DELETE,
            "PATCH" => reqwest::Method::PATCH,
            _ => reqwest::Method::POST,
        };

        log::info!("[invoker] {} {}", method, call.url);

        let mut request = self.client.request(method.clone(), &call.url);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if method != reqwest::Method::GET {
            request = request.json(&call.body);
        }

        // The 30s limit covers the whole call including body download.
        let response = tokio::time::timeout(DOWNSTREAM_TIMEOUT, request.send())
            .await
            .map_err(|_| format!("Service call timed out after {}s", DOWNSTREAM_TIMEOUT.as_secs()))?
            .map_err(|e| format!("Service call failed: {}", e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read service response: {}", e))?;

        if !status.is_success() {
            return Err(format!(
                "Service returned {}: {}",
                status,
                if text.is_empty() { "empty response" } else { &text }
            ));
        }

        let body = if content_type.contains("application/json") {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        Ok(DownstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}
