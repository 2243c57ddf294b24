// get_server_metrics tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{error_result, json_schema_object, json_schema_string, json_schema_string_enum, Tool};
use anyhow::Result;
use scout_core::metrics::MetricsReporter;
use scout_core::GetMetricsInput;
use std::sync::Arc;

pub struct ServerMetricsTool {
    reporter: Arc<MetricsReporter>,
}

impl ServerMetricsTool {
    pub fn new(reporter: Arc<MetricsReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait::async_trait]
impl Tool for ServerMetricsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_server_metrics".to_string(),
            description: "Get detailed performance metrics for a specific MCP server \
                          including latency, success rate, and uptime history."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "server_id": json_schema_string(
                        "Server slug (e.g., \"supabase-mcp-server\") or UUID"
                    ),
                    "time_range": json_schema_string_enum(
                        &["1h", "24h", "7d", "30d"],
                        "Time range for historical metrics (default: 24h)"
                    )
                }),
                vec!["server_id"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let input: GetMetricsInput = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(e) => {
                return Ok(CallToolResult::error(format!(
                    "Invalid arguments for get_server_metrics: {}",
                    e
                )))
            }
        };

        tracing::info!(server_id = %input.server_id, "handling get_server_metrics");

        match self.reporter.server_metrics(&input).await {
            Ok(output) => {
                tracing::info!(
                    server = %output.server.slug,
                    history_points = output.metrics.history.len(),
                    "metrics retrieved"
                );
                Ok(CallToolResult::text(serde_json::to_string_pretty(&output)?))
            }
            Err(err) => {
                tracing::error!("failed to get metrics: {}", err);
                Ok(error_result(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::catalog::InMemoryCatalog;

    #[tokio::test]
    async fn test_unknown_server_reports_not_found() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let tool = ServerMetricsTool::new(Arc::new(MetricsReporter::new(catalog)));

        let result = tool
            .execute(serde_json::json!({ "server_id": "ghost" }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        let crate::protocol::ToolContent::Text { text } = &result.content[0];
        assert!(text.contains("ghost"));
    }

    #[tokio::test]
    async fn test_invalid_time_range_is_tool_error() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let tool = ServerMetricsTool::new(Arc::new(MetricsReporter::new(catalog)));

        let result = tool
            .execute(serde_json::json!({ "server_id": "s", "time_range": "90d" }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
    }
}
