//! MCP server handler implementation.
//!
//! Each tool delivers one host event to the worker's reactor, or reads
//! its status.
use crate::tools::{
    client::{SwClientClosedParams, client_closed_impl},
    fetch::{SwFetchParams, fetch_impl},
    lifecycle::{activate_impl, install_impl},
    message::{SwMessageParams, message_impl},
    status::status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_engine::ReactorHandle;

/// The MCP server handler for the shellcache worker.
#[derive(Clone)]
pub struct WorkerServer {
    tool_router: ToolRouter<Self>,
    reactor: ReactorHandle,
}

#[tool_router]
impl WorkerServer {
    /// Create a new server handler delivering events to `reactor`.
    pub fn new(reactor: ReactorHandle) -> Self {
        Self { tool_router: Self::tool_router(), reactor }
    }

    #[tool(description = "Deliver the install event: precache the app shell, then skip waiting and activate.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.reactor).await
    }

    #[tool(description = "Deliver the activate event: delete cache generations from earlier versions and claim open pages.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.reactor).await
    }

    /// Deliver a fetch event.
    ///
    /// Returns either a passthrough disposition (the host performs the request
    /// itself) or the response the worker produced.
    #[tool(description = "Deliver a fetch event. Returns passthrough, or the response served from cache, network or offline fallback.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.reactor, params.0).await
    }

    #[tool(description = "Post a control message from a page, e.g. {\"type\":\"SKIP_WAITING\"} or {\"type\":\"CLEAR_CACHE\"}.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.reactor, params.0).await
    }

    #[tool(description = "Tell the worker a page has closed so it stops tracking it.")]
    async fn sw_client_closed(&self, params: Parameters<SwClientClosedParams>) -> Result<CallToolResult, McpError> {
        client_closed_impl(&self.reactor, params.0).await
    }

    #[tool(description = "Report lifecycle state, controlled pages and cache generation names.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.reactor).await
    }
}

impl ServerHandler for WorkerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
