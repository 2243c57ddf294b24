pub mod compare;
pub mod discover;
pub mod metrics;
mod registry;

pub use compare::CompareServersTool;
pub use discover::DiscoverServerTool;
pub use metrics::ServerMetricsTool;
pub use registry::{
    json_schema_array, json_schema_number, json_schema_object, json_schema_string,
    json_schema_string_enum, Tool, ToolRegistry,
};

use crate::protocol::CallToolResult;
use scout_core::DiscoveryError;

/// Domain errors become tool-level error content, not protocol failures,
/// so MCP clients can show them to the model.
pub(crate) fn error_result(err: DiscoveryError) -> CallToolResult {
    CallToolResult::error(err.to_string())
}
