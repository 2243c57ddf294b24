// Standalone MCP server binary

use anyhow::Result;
use scout_core::catalog::InMemoryCatalog;
use scout_core::compare::ComparisonEngine;
use scout_core::embeddings::{
    CachedEmbeddings, DisabledEmbeddings, EmbeddingProvider, OpenAiEmbeddings,
};
use scout_core::metrics::MetricsReporter;
use scout_core::search::RecommendationEngine;
use scout_core::seed;
use scout_mcp::server::McpServer;
use scout_mcp::tools::{CompareServersTool, DiscoverServerTool, ServerMetricsTool, ToolRegistry};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Scout MCP Server starting...");

    let catalog = Arc::new(InMemoryCatalog::new());

    if let Ok(seed_path) = std::env::var("SCOUT_SEED") {
        let loaded = seed::load_file(&catalog, Path::new(&seed_path))?;
        tracing::info!(servers = loaded, "seeded catalog from {}", seed_path);
    }

    let provider: Arc<dyn EmbeddingProvider> = match OpenAiEmbeddings::from_env()? {
        Some(provider) => Arc::new(provider),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, semantic search disabled (text fallback only)");
            Arc::new(DisabledEmbeddings)
        }
    };
    let embeddings = Arc::new(CachedEmbeddings::new(provider));

    let discovery = Arc::new(RecommendationEngine::new(catalog.clone(), embeddings));
    let comparisons = Arc::new(ComparisonEngine::new(catalog.clone()));
    let reporter = Arc::new(MetricsReporter::new(catalog));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DiscoverServerTool::new(discovery)));
    registry.register(Arc::new(CompareServersTool::new(comparisons)));
    registry.register(Arc::new(ServerMetricsTool::new(reporter)));

    tracing::info!("Registered {} tools", registry.list_schemas().len());

    let server = McpServer::new(registry);
    server.start().await?;

    Ok(())
}
