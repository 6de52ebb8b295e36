//! sw_install and sw_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use shellcache_engine::ReactorHandle;

use super::json_result;

/// Deliver the install event and report what was precached.
pub async fn install_impl(reactor: &ReactorHandle) -> Result<CallToolResult, McpError> {
    let report = reactor.install().await?;
    json_result(&report)
}

/// Deliver the activate event and report evicted generations.
pub async fn activate_impl(reactor: &ReactorHandle) -> Result<CallToolResult, McpError> {
    let report = reactor.activate().await?;
    json_result(&report)
}
