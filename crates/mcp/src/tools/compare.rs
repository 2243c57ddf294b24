// compare_servers tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{error_result, json_schema_array, json_schema_object, Tool};
use anyhow::Result;
use scout_core::compare::ComparisonEngine;
use scout_core::CompareInput;
use std::sync::Arc;

pub struct CompareServersTool {
    engine: Arc<ComparisonEngine>,
}

impl CompareServersTool {
    pub fn new(engine: Arc<ComparisonEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Tool for CompareServersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "compare_servers".to_string(),
            description: "Compare multiple MCP servers side-by-side on latency, uptime, \
                          and features. Returns rankings for each dimension."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "server_ids": json_schema_array(
                        serde_json::json!({ "type": "string" }),
                        "Array of server slugs or UUIDs to compare (2-10 servers)"
                    ),
                    "compare_by": json_schema_array(
                        serde_json::json!({
                            "type": "string",
                            "enum": ["latency", "uptime", "features"]
                        }),
                        "Dimensions to compare (default: all)"
                    )
                }),
                vec!["server_ids"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let input: CompareInput = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(e) => {
                return Ok(CallToolResult::error(format!(
                    "Invalid arguments for compare_servers: {}",
                    e
                )))
            }
        };

        tracing::info!(count = input.server_ids.len(), "handling compare_servers");

        match self.engine.compare(&input).await {
            Ok(output) => {
                tracing::info!(servers_compared = output.servers.len(), "comparison complete");
                Ok(CallToolResult::text(serde_json::to_string_pretty(&output)?))
            }
            Err(err) => {
                tracing::error!("comparison failed: {}", err);
                Ok(error_result(err))
            }
        }
    }
}
