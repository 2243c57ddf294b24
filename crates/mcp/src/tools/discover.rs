// discover_mcp_server tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    error_result, json_schema_array, json_schema_number, json_schema_object, json_schema_string,
    Tool,
};
use anyhow::Result;
use scout_core::search::RecommendationEngine;
use scout_core::DiscoverInput;
use std::sync::Arc;

pub struct DiscoverServerTool {
    engine: Arc<RecommendationEngine>,
}

impl DiscoverServerTool {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Tool for DiscoverServerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "discover_mcp_server".to_string(),
            description: "Find MCP servers matching a natural language requirement. \
                          Returns ranked recommendations with capabilities, metrics, \
                          and installation commands."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "need": json_schema_string(
                        "Natural language description of what you need \
                         (e.g., \"database with authentication\" or \"send emails\")"
                    ),
                    "constraints": {
                        "type": "object",
                        "description": "Optional constraints to filter results",
                        "properties": {
                            "max_latency_ms": json_schema_number(
                                "Maximum acceptable average latency in milliseconds"
                            ),
                            "required_features": json_schema_array(
                                serde_json::json!({ "type": "string" }),
                                "Features that must be present (e.g., [\"auth\", \"realtime\"])"
                            ),
                            "exclude_servers": json_schema_array(
                                serde_json::json!({ "type": "string" }),
                                "Server slugs or IDs to exclude from results"
                            )
                        }
                    },
                    "limit": json_schema_number(
                        "Maximum number of results to return (default: 5, max: 20)"
                    )
                }),
                vec!["need"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let input: DiscoverInput = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(e) => {
                return Ok(CallToolResult::error(format!(
                    "Invalid arguments for discover_mcp_server: {}",
                    e
                )))
            }
        };

        tracing::info!(need = %input.need, "handling discover_mcp_server");

        match self.engine.discover(&input).await {
            Ok(output) => {
                tracing::info!(
                    found = output.total_found,
                    query_time_ms = output.query_time_ms,
                    "discovery complete"
                );
                Ok(CallToolResult::text(serde_json::to_string_pretty(&output)?))
            }
            Err(err) => {
                tracing::error!("discovery failed: {}", err);
                Ok(error_result(err))
            }
        }
    }
}
