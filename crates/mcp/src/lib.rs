// MCP (Model Context Protocol) adapter for Scout discovery

pub mod protocol;
pub mod server;
pub mod tools;
