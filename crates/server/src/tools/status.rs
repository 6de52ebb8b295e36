//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_engine::{ReactorHandle, WorkerState};

use super::json_result;

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub version: String,
    pub state: WorkerState,
    pub shell_cache: String,
    pub cdn_cache: String,
    /// Every generation in the store, oldest first.
    pub generations: Vec<String>,
    pub clients: usize,
    pub controlled_clients: usize,
}

/// Report lifecycle state, pages and cache generations.
pub async fn status_impl(reactor: &ReactorHandle) -> Result<CallToolResult, McpError> {
    let worker = reactor.worker();
    let policy = worker.policy();

    let output = SwStatusOutput {
        version: policy.version.clone(),
        state: worker.state().await,
        shell_cache: policy.shell_cache.clone(),
        cdn_cache: policy.cdn_cache.clone(),
        generations: worker.db().generation_names().await?,
        clients: worker.clients().len().await,
        controlled_clients: worker.clients().controlled_count().await,
    };

    json_result(&output)
}
