//! sw_fetch tool implementation.
//!
//! Delivers a fetch event and reports what the worker did with it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{RequestMode, Response};
use shellcache_engine::{Classification, FetchEvent, FetchOutcome, ReactorHandle, ResponseSource};

use super::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    /// Request mode: "navigate", "same-origin", "cors" or "no-cors" (default).
    #[serde(default)]
    pub mode: Option<RequestMode>,
    /// Page that issued the request.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// The response the worker handed back to the page.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// "basic", "cors" or "opaque".
    pub kind: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
    pub body_bytes: usize,
}

impl From<&Response> for SwFetchResponse {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            kind: response.kind.as_str().to_string(),
            headers: response.headers.clone(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
        }
    }
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// "passthrough" or "responded".
    pub disposition: String,
    /// Set for passthrough: how the request was classified.
    pub classification: Option<Classification>,
    /// Set for responded: where the response came from.
    pub source: Option<ResponseSource>,
    /// A background refresh of the cached copy was started.
    pub revalidating: bool,
    pub response: Option<SwFetchResponse>,
}

/// Deliver a fetch event to the worker.
///
/// A background refresh keeps running after this returns.
pub async fn fetch_impl(reactor: &ReactorHandle, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let event = FetchEvent {
        method: params.method,
        url: params.url,
        mode: params.mode.unwrap_or_default(),
        client_id: params.client_id,
    };

    let output = match reactor.fetch(event).await? {
        FetchOutcome::Passthrough(classification) => SwFetchOutput {
            disposition: "passthrough".to_string(),
            classification: Some(classification),
            source: None,
            revalidating: false,
            response: None,
        },
        FetchOutcome::Responded(served) => SwFetchOutput {
            disposition: "responded".to_string(),
            classification: None,
            source: Some(served.source),
            revalidating: served.revalidation.is_some(),
            response: Some(SwFetchResponse::from(&served.response)),
        },
    };

    json_result(&output)
}
