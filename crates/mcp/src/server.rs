// JSON-RPC 2.0 server over stdio

use crate::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Read newline-delimited JSON-RPC requests from stdin and write
    /// responses to stdout until EOF.
    pub async fn start(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        tracing::info!(tools = self.registry.list_schemas().len(), "MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("failed to parse request: {}", e);
                    let response =
                        JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::parse_error());
                    Self::write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            // Notifications never get a response
            if request.is_notification() {
                tracing::debug!(method = %request.method, "notification received");
                continue;
            }

            let response = self.handle_request(request).await;
            Self::write_response(&mut stdout, &response).await?;
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Serialize one response as a single line and flush it
    async fn write_response<W: AsyncWrite + Unpin>(
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let body = serde_json::to_string(response)?;
        writer.write_all(body.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(serde_json::Value::Null);

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: ServerInfo {
                        name: "scout-mcp".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                },
            ),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.registry.list_schemas(),
                },
            ),
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        }
    }

    async fn handle_tool_call(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("missing params for tools/call"),
                )
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("invalid params: {}", e)),
                )
            }
        };

        let Some(tool) = self.registry.get(&params.name) else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            );
        };

        match tool.execute(params.arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::error!(tool = %params.name, "tool execution failed: {}", e);
                JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
            }
        }
    }
}
