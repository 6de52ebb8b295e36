//! sw_client_closed tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_engine::ReactorHandle;

use super::json_result;

/// Parameters for the sw_client_closed tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientClosedParams {
    /// Page that went away.
    pub client_id: String,
}

/// Output from the sw_client_closed tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientClosedOutput {
    pub client_id: String,
    /// False when the page was never seen or had already been forgotten.
    pub removed: bool,
}

/// Tell the worker a page has closed so it stops tracking it.
pub async fn client_closed_impl(
    reactor: &ReactorHandle, params: SwClientClosedParams,
) -> Result<CallToolResult, McpError> {
    let removed = reactor.client_closed(params.client_id.clone()).await?;
    json_result(&SwClientClosedOutput { client_id: params.client_id, removed })
}
