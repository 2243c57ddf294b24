use anyhow::{Context, Result};
use scout_core::auth::{InMemoryQuotaStore, RateLimiter};
use scout_core::catalog::InMemoryCatalog;
use scout_core::compare::ComparisonEngine;
use scout_core::embeddings::{
    CachedEmbeddings, DisabledEmbeddings, EmbeddingProvider, OpenAiEmbeddings,
};
use scout_core::metrics::MetricsReporter;
use scout_core::search::RecommendationEngine;
use scout_core::seed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub search: SearchSection,

    #[serde(default)]
    pub catalog: CatalogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Seconds between cache prune sweeps
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Optional JSON file of servers loaded at startup
    #[serde(default)]
    pub seed_file: Option<String>,
}

fn default_prune_interval_secs() -> u64 {
    300
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &PathBuf) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self {
                search: Default::default(),
                catalog: Default::default(),
            })
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<InMemoryCatalog>,
    pub discovery: Arc<RecommendationEngine>,
    pub comparisons: Arc<ComparisonEngine>,
    pub reporter: Arc<MetricsReporter>,
    pub limiter: Arc<RateLimiter>,
    pub quota_store: Arc<InMemoryQuotaStore>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let catalog = Arc::new(InMemoryCatalog::new());

        if let Some(seed_file) = &config.catalog.seed_file {
            let loaded = seed::load_file(&catalog, Path::new(seed_file))?;
            tracing::info!(servers = loaded, "seeded catalog from {}", seed_file);
        }

        let provider: Arc<dyn EmbeddingProvider> = match OpenAiEmbeddings::from_env()? {
            Some(provider) => Arc::new(provider),
            None => {
                tracing::warn!(
                    "OPENAI_API_KEY not set, semantic search disabled (text fallback only)"
                );
                Arc::new(DisabledEmbeddings)
            }
        };
        let embeddings = Arc::new(CachedEmbeddings::new(provider));

        let discovery = Arc::new(RecommendationEngine::new(catalog.clone(), embeddings));
        let comparisons = Arc::new(ComparisonEngine::new(catalog.clone()));
        let reporter = Arc::new(MetricsReporter::new(catalog.clone()));

        let quota_store = Arc::new(InMemoryQuotaStore::new());
        let limiter = Arc::new(RateLimiter::new(quota_store.clone()));

        Ok(Self {
            catalog,
            discovery,
            comparisons,
            reporter,
            limiter,
            quota_store,
        })
    }
}
