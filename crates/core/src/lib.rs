// Core types and functionality for Scout MCP discovery

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod compare;
pub mod embeddings;
pub mod error;
pub mod metrics;
pub mod search;
pub mod seed;
pub mod types;
pub mod validation;

pub use error::{DiscoveryError, Result};
pub use types::*;
