//! sw_message tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_engine::ReactorHandle;

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message payload as posted by the page. Commands carry a `type` field.
    pub data: serde_json::Value,
}

/// Post a control message to the worker.
pub async fn message_impl(reactor: &ReactorHandle, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let outcome = reactor.message(params.data).await?;
    json_result(&outcome)
}
